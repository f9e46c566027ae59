use serde::{Deserialize, Serialize};

use crate::users::repo_types::{RoleCode, User};

/// Request body for user registration. The password is optional: an account
/// may be created pending an invite and receive its password later.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub address: Option<String>,
    pub citizen_id: Option<String>,
    pub organization_name: Option<String>,
    pub organization_representer_name: Option<String>,
    pub organization_tax_id: Option<String>,
    pub organization_email: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client. The internal numeric id is
/// deliberately absent; the password hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub email: String,
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub activated: bool,
    pub role: RoleCode,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            avatar_url: user.avatar_url.clone(),
            activated: user.activated,
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_exposes_neither_id_nor_hash() {
        let public = PublicUser {
            email: "test@example.com".into(),
            phone_number: "0333000111".into(),
            first_name: None,
            last_name: None,
            avatar_url: None,
            activated: true,
            role: RoleCode::Envoy,
        };
        let json = serde_json::to_string(&public).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"role\":\"envoy\""));
        assert!(!json.contains("\"id\""));
        assert!(!json.contains("password"));
    }
}
