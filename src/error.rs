use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Request-scoped error taxonomy. Everything here is recoverable per request;
/// the only fatal class (missing configuration) lives in `AppConfig::from_env`
/// and aborts startup instead.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A field is missing or malformed.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    /// A unique business field is already taken.
    #[error("{field} already exists")]
    AlreadyExists { field: &'static str },
    /// No identity on a route that requires one.
    #[error("authentication required")]
    Unauthenticated,
    /// Deliberately generic: never distinguishes unknown email from wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("access denied")]
    AccessDenied,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Maps a unique-index name back to the business field it protects, so a
/// storage constraint violation surfaces as a field-level validation message.
fn field_for_constraint(constraint: &str) -> Option<&'static str> {
    match constraint {
        "users_email_key" => Some("email"),
        "users_phone_number_key" => Some("phone_number"),
        "users_alternative_id_key" => Some("alternative_id"),
        "users_address_key" => Some("address"),
        "users_citizen_id_key" => Some("citizen_id"),
        "users_organization_name_key" => Some("organization_name"),
        "users_organization_representer_name_key" => Some("organization_representer_name"),
        "users_organization_tax_id_key" => Some("organization_tax_id"),
        "users_organization_email_key" => Some("organization_email"),
        "roles_name_key" => Some("role_name"),
        "roles_code_key" => Some("role_code"),
        _ => None,
    }
}

/// Constraint-violation translation, applied at the boundary nearest the
/// write. Returns None for anything that is not a recognized violation.
fn translate_db_error(db_err: &dyn sqlx::error::DatabaseError) -> Option<AppError> {
    if db_err.is_unique_violation() {
        let field = db_err
            .constraint()
            .and_then(field_for_constraint)
            .unwrap_or("record");
        return Some(AppError::AlreadyExists { field });
    }
    if db_err.is_foreign_key_violation() {
        return Some(AppError::validation("role", "role does not exist"));
    }
    None
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if let Some(translated) = translate_db_error(db_err.as_ref()) {
                return translated;
            }
        }
        AppError::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, field) = match &self {
            AppError::Validation { field, .. } => (StatusCode::BAD_REQUEST, Some(*field)),
            AppError::AlreadyExists { field } => (StatusCode::CONFLICT, Some(*field)),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, None),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, None),
            AppError::AccessDenied => (StatusCode::FORBIDDEN, None),
            AppError::NotFound => (StatusCode::NOT_FOUND, None),
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                // raw storage/internal detail never reaches the client
                let body = Json(json!({ "error": "internal server error" }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };
        let body = match field {
            Some(field) => Json(json!({ "error": self.to_string(), "field": field })),
            None => Json(json!({ "error": self.to_string() })),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::fmt;

    #[derive(Debug)]
    struct StubDbError {
        unique: bool,
        constraint: &'static str,
    }

    impl fmt::Display for StubDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "constraint violation on {}", self.constraint)
        }
    }

    impl std::error::Error for StubDbError {}

    impl DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "constraint violation"
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::ForeignKeyViolation
            }
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn unique_violation_on_email_becomes_already_exists() {
        // what the losing side of a duplicate-registration race sees
        let err = translate_db_error(&StubDbError {
            unique: true,
            constraint: "users_email_key",
        })
        .expect("unique violation must translate");
        match err {
            AppError::AlreadyExists { field } => assert_eq!(field, "email"),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[test]
    fn unique_violation_on_unknown_constraint_still_translates() {
        let err = translate_db_error(&StubDbError {
            unique: true,
            constraint: "users_pkey",
        })
        .expect("unique violation must translate");
        match err {
            AppError::AlreadyExists { field } => assert_eq!(field, "record"),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[test]
    fn foreign_key_violation_becomes_validation() {
        let err = translate_db_error(&StubDbError {
            unique: false,
            constraint: "users_role_id_fkey",
        })
        .expect("fk violation must translate");
        assert!(matches!(err, AppError::Validation { field: "role", .. }));
    }

    #[test]
    fn every_unique_column_has_a_field_mapping() {
        for (constraint, field) in [
            ("users_email_key", "email"),
            ("users_phone_number_key", "phone_number"),
            ("users_alternative_id_key", "alternative_id"),
            ("users_address_key", "address"),
            ("users_citizen_id_key", "citizen_id"),
            ("users_organization_name_key", "organization_name"),
            (
                "users_organization_representer_name_key",
                "organization_representer_name",
            ),
            ("users_organization_tax_id_key", "organization_tax_id"),
            ("users_organization_email_key", "organization_email"),
        ] {
            assert_eq!(field_for_constraint(constraint), Some(field));
        }
    }

    #[test]
    fn unknown_constraint_has_no_mapping() {
        assert_eq!(field_for_constraint("users_pkey"), None);
    }

    #[test]
    fn already_exists_message_names_the_field() {
        let err = AppError::AlreadyExists { field: "email" };
        assert_eq!(err.to_string(), "email already exists");
    }

    #[test]
    fn invalid_credentials_is_generic() {
        assert_eq!(AppError::InvalidCredentials.to_string(), "invalid credentials");
    }
}
