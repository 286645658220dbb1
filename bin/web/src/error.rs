//! Error responses for the web front end.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use qbrack::QbrackError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("CSRF token missing or invalid")]
    Csrf,

    #[error("{1}")]
    Status(StatusCode, String),

    #[error(transparent)]
    Cms(#[from] QbrackError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Csrf => StatusCode::FORBIDDEN,
            AppError::Status(status, _) => *status,
            AppError::Cms(err) => cms_status(err),
            AppError::Template(_) | AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn cms_status(err: &QbrackError) -> StatusCode {
    match err {
        QbrackError::Validation(code) if code == "FILE_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
        QbrackError::Validation(_) | QbrackError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        QbrackError::NotFound(_) => StatusCode::NOT_FOUND,
        QbrackError::Conflict(_) => StatusCode::CONFLICT,
        QbrackError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        QbrackError::Storage(_)
        | QbrackError::Io(_)
        | QbrackError::Config(_)
        | QbrackError::Password(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Cms(QbrackError::Validation(code)) => code.clone(),
            _ if status.is_server_error() => {
                error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({ "error": message }));
        match self {
            AppError::Unauthorized => (
                status,
                [(header::WWW_AUTHENTICATE, r#"Basic realm="Restricted""#)],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
