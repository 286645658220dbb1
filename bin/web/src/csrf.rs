//! CSRF protection for state-changing forms.
//!
//! Each session gets one random token, stored in the session record itself;
//! every POST form carries it back in a `csrf_token` field.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

/// Session key holding the token
const CSRF_SESSION_KEY: &str = "csrf_token";

/// Get or create a CSRF token for the current session
pub async fn get_csrf_token(session: &Session) -> Result<String, AppError> {
    if let Some(token) = session.get::<String>(CSRF_SESSION_KEY).await? {
        return Ok(token);
    }

    debug!("Generating new CSRF token");
    let token = Uuid::new_v4().to_string();
    session.insert(CSRF_SESSION_KEY, &token).await?;
    Ok(token)
}

/// Check a submitted token against the session
pub async fn validate_csrf_token(session: &Session, token: &str) -> Result<bool, AppError> {
    if token.is_empty() {
        return Ok(false);
    }
    let stored = session.get::<String>(CSRF_SESSION_KEY).await?;
    Ok(stored.is_some_and(|stored| stored == token))
}

/// Form data wrapper that includes CSRF token validation
#[derive(Debug, Deserialize, Serialize)]
pub struct CsrfProtectedForm<T> {
    pub csrf_token: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> CsrfProtectedForm<T> {
    /// Unwraps the form data when the token matches the session
    pub async fn verify(self, session: &Session) -> Result<T, AppError> {
        if validate_csrf_token(session, &self.csrf_token).await? {
            Ok(self.data)
        } else {
            warn!("CSRF validation failed");
            Err(AppError::Csrf)
        }
    }
}
