use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::debug;

use crate::auth::tokens::{JwtKeys, TokenKind};
use crate::error::AppError;
use crate::identity::{self, Identity};
use crate::state::AppState;
use crate::users::repo_types::User;

/// Resolves the per-request identity from the bearer token, once, before the
/// handler runs. A missing, invalid, or expired token yields an anonymous
/// identity rather than a rejection; handlers decide what anonymity means for
/// their route. Only a storage failure rejects.
///
/// The lookup goes through the alternative id, so a rotated identifier or a
/// flipped activation flag takes effect on the very next request.
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(CurrentIdentity(Identity::anonymous()));
        };

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify(token) {
            Ok(claims) if claims.kind == TokenKind::Access => claims,
            Ok(_) => {
                debug!("non-access token presented");
                return Ok(CurrentIdentity(Identity::anonymous()));
            }
            Err(_) => {
                debug!("invalid or expired token");
                return Ok(CurrentIdentity(Identity::anonymous()));
            }
        };

        let user = User::find_by_alternative_id(&state.db, &claims.sub).await?;
        let identity = identity::resolve(user);
        debug!(
            authenticated = identity.is_authenticated(),
            needs = identity.needs().len(),
            "identity resolved"
        );
        Ok(CurrentIdentity(identity))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
}
