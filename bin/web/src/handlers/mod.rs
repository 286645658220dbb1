//! Request handlers.

pub mod comments;
pub mod media;
pub mod pages;

use crate::error::AppError;
use askama::Template;
use axum::response::Html;
use qbrack::QbrackError;

/// Session key for one-shot messages shown on the next page view
pub const FLASH_KEY: &str = "flash";

pub fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

/// Errors a form should show to the user instead of failing the request
pub fn user_facing(err: &QbrackError) -> Option<String> {
    match err {
        QbrackError::Validation(code) => Some(code.clone()),
        QbrackError::Conflict(msg) | QbrackError::NotFound(msg) => Some(msg.clone()),
        _ => None,
    }
}
