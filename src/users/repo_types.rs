use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Closed set of roles, fixed at bootstrap. Codes are what permission checks
/// match on; names are for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleCode {
    Admin,
    Manager,
    Envoy,
}

impl RoleCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RoleCode::Admin => "admin",
            RoleCode::Manager => "manager",
            RoleCode::Envoy => "envoy",
        }
    }

    pub const fn display_name(&self) -> &'static str {
        match self {
            RoleCode::Admin => "Administrator",
            RoleCode::Manager => "Manager",
            RoleCode::Envoy => "Envoy",
        }
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(RoleCode::Admin),
            "manager" => Ok(RoleCode::Manager),
            "envoy" => Ok(RoleCode::Envoy),
            other => Err(anyhow::anyhow!("unknown role code: {other}")),
        }
    }
}

/// Role row in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub code: String,
}

/// Raw user row as selected from the database (role code joined in).
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub alternative_id: String,
    pub email: String,
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub activated: bool,
    pub created_at: OffsetDateTime,
    pub verified_at: Option<OffsetDateTime>,
    pub role_code: String,
}

/// User record with the role code decoded into the closed enum.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub alternative_id: String,
    pub email: String,
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub activated: bool,
    pub created_at: OffsetDateTime,
    pub verified_at: Option<OffsetDateTime>,
    pub role: RoleCode,
}

impl User {
    pub fn full_name(&self) -> String {
        match (&self.last_name, &self.first_name) {
            (Some(last), Some(first)) => format!("{last} {first}"),
            (Some(last), None) => last.clone(),
            (None, Some(first)) => first.clone(),
            (None, None) => String::new(),
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role_code.parse::<RoleCode>()?;
        Ok(User {
            id: row.id,
            alternative_id: row.alternative_id,
            email: row.email,
            phone_number: row.phone_number,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            avatar_url: row.avatar_url,
            activated: row.activated,
            created_at: row.created_at,
            verified_at: row.verified_at,
            role,
        })
    }
}
