use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::{
    dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
    extractors::CurrentIdentity,
    password::{hash_password, verify_password},
    tokens::JwtKeys,
};
use crate::error::AppError;
use crate::state::AppState;
use crate::users::repo::{NewUser, UniqueField};
use crate::users::repo_types::User;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

// 10 or 11 digits, leading zero
pub(crate) fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^0\d{9,10}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.phone_number = payload.phone_number.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!("register rejected: invalid email format");
        return Err(AppError::validation("email", "invalid email address"));
    }
    if !is_valid_phone(&payload.phone_number) {
        warn!("register rejected: invalid phone format");
        return Err(AppError::validation(
            "phone_number",
            "phone number must be 10 or 11 digits",
        ));
    }

    // Hash before any insert; the plaintext goes no further than this frame.
    let password_hash = match payload.password.as_deref() {
        Some(plain) if plain.len() < 8 => {
            return Err(AppError::validation(
                "password",
                "password must be at least 8 characters",
            ));
        }
        Some(plain) => Some(hash_password(plain)?),
        None => None,
    };

    // Pre-insert probes are a UX nicety; the unique indexes remain the
    // authority when two registrations race.
    let probes: [(UniqueField, Option<&str>); 8] = [
        (UniqueField::Email, Some(payload.email.as_str())),
        (UniqueField::PhoneNumber, Some(payload.phone_number.as_str())),
        (UniqueField::Address, payload.address.as_deref()),
        (UniqueField::CitizenId, payload.citizen_id.as_deref()),
        (
            UniqueField::OrganizationName,
            payload.organization_name.as_deref(),
        ),
        (
            UniqueField::OrganizationRepresenterName,
            payload.organization_representer_name.as_deref(),
        ),
        (
            UniqueField::OrganizationTaxId,
            payload.organization_tax_id.as_deref(),
        ),
        (
            UniqueField::OrganizationEmail,
            payload.organization_email.as_deref(),
        ),
    ];
    for (field, value) in probes {
        let Some(value) = value else { continue };
        if User::exists(&state.db, field, value).await? {
            warn!(field = field.column(), "register rejected: field taken");
            return Err(AppError::AlreadyExists {
                field: field.column(),
            });
        }
    }

    let user = User::create(
        &state.db,
        NewUser {
            email: payload.email,
            phone_number: payload.phone_number,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password_hash,
            address: payload.address,
            citizen_id: payload.citizen_id,
            organization_name: payload.organization_name,
            organization_representer_name: payload.organization_representer_name,
            organization_tax_id: payload.organization_tax_id,
            organization_email: payload.organization_email,
            ..NewUser::default()
        },
    )
    .await?;

    info!(email = %user.email, "user registered, awaiting activation");
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(AppError::validation("email", "invalid email address"));
    }

    // Unknown email, absent password hash, and wrong password all collapse
    // into the same generic failure to prevent account enumeration.
    let user = User::find_by_email(&state.db, &payload.email).await?;
    let Some(user) = user else {
        warn!("login failed: unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(&payload.password, user.password_hash.as_deref()) {
        warn!(email = %user.email, "login failed: password rejected");
        return Err(AppError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(&user.alternative_id)?;
    let refresh_token = keys.sign_refresh(&user.alternative_id)?;

    info!(email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| AppError::InvalidCredentials)?;

    // A rotated alternative id makes the old subject miss here, killing the
    // refresh chain along with the access tokens.
    let user = User::find_by_alternative_id(&state.db, &claims.sub)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let access_token = keys.sign_access(&user.alternative_id)?;
    let refresh_token = keys.sign_refresh(&user.alternative_id)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(identity))]
pub async fn get_me(
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<PublicUser>, AppError> {
    let user = identity.user().ok_or(AppError::Unauthenticated)?;
    Ok(Json(PublicUser::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format_check() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("not an email"));
    }

    #[test]
    fn phone_format_check() {
        assert!(is_valid_phone("0333326585"));
        assert!(is_valid_phone("03333265850"));
        assert!(!is_valid_phone("333326585"));
        assert!(!is_valid_phone("0333-326-585"));
        assert!(!is_valid_phone("033332658"));
    }
}
