//! Admin-only routes.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use qbrack::auth::parse_basic_authorization;
use tracing::warn;

/// Extracting this succeeds only for requests carrying the admin's Basic
/// credentials; anything else is answered with a 401 challenge.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[async_trait]
impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        if !state.admin.is_enabled() {
            warn!("admin route requested but ADMIN_PASS_HASH is not configured");
            return Err(AppError::Unauthorized);
        }

        let credentials = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic_authorization);
        let Some((username, password)) = credentials else {
            return Err(AppError::Unauthorized);
        };

        // Argon2 verification is CPU-bound
        let admin = state.admin.clone();
        let verified = tokio::task::spawn_blocking(move || admin.verify(&username, &password))
            .await
            .unwrap_or(false);

        if verified {
            Ok(AdminAccess)
        } else {
            warn!("admin authentication failed");
            Err(AppError::Unauthorized)
        }
    }
}
