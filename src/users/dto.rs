use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::repo_types::{Role, RoleCode, User};

/// Administrative view of a user. Management operations address users by the
/// opaque alternative id; the numeric primary key never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub alternative_id: String,
    pub email: String,
    pub phone_number: String,
    pub full_name: String,
    pub activated: bool,
    pub role: RoleCode,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub verified_at: Option<OffsetDateTime>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            alternative_id: user.alternative_id.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            full_name: user.full_name(),
            activated: user.activated,
            role: user.role,
            created_at: user.created_at,
            verified_at: user.verified_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleSummary {
    pub id: i64,
    pub name: String,
    pub code: String,
}

impl From<&Role> for RoleSummary {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            code: role.code.clone(),
        }
    }
}

/// Response to a login-identifier rotation: the fresh identifier. Every
/// session issued against the old one is dead from the next request on.
#[derive(Debug, Serialize)]
pub struct RotatedLogin {
    pub alternative_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> UserSummary {
        UserSummary {
            alternative_id: "b".repeat(32),
            email: "m@example.com".into(),
            phone_number: "0333000222".into(),
            full_name: "Pham Chi".into(),
            activated: true,
            role: RoleCode::Manager,
            created_at: OffsetDateTime::UNIX_EPOCH,
            verified_at: None,
        }
    }

    #[test]
    fn summary_serializes_role_code() {
        let json = serde_json::to_string(&sample_summary()).unwrap();
        assert!(json.contains("\"role\":\"manager\""));
        assert!(json.contains("\"verified_at\":null"));
    }

    #[test]
    fn summary_keeps_numeric_id_server_side() {
        let json = serde_json::to_string(&sample_summary()).unwrap();
        assert!(json.contains("\"alternative_id\""));
        assert!(!json.contains("\"id\":"), "numeric primary id serialized: {json}");
    }
}
