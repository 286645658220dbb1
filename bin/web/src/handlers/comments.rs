//! Visitor comments.

use super::{user_facing, FLASH_KEY};
use crate::client_ip::ClientIp;
use crate::csrf::CsrfProtectedForm;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Form, State},
    response::Redirect,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub user: String,
    pub comment: String,
}

/// `POST /add_comment`: always lands back on the home page; a rejected
/// comment leaves its reason in the session for the next view.
pub async fn add_comment(
    State(state): State<AppState>,
    session: Session,
    ClientIp(ip): ClientIp,
    Form(form): Form<CsrfProtectedForm<CommentForm>>,
) -> Result<Redirect, AppError> {
    let form = form.verify(&session).await?;

    if let Err(e) = state.comment_limiter.check_rate_limit(&ip) {
        warn!(ip = %ip, "comment rate limit hit");
        return Err(e.into());
    }

    match state.cms.comments.add(&ip, &form.user, &form.comment) {
        Ok(id) => info!(comment_id = id, "comment accepted"),
        Err(e) => {
            let message = user_facing(&e).ok_or(e)?;
            info!(reason = %message, "comment rejected");
            session.insert(FLASH_KEY, message).await?;
        }
    }
    Ok(Redirect::to("/"))
}

/// `GET /get_comments`
pub async fn get_comments(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({ "comments": state.cms.comments.all()? })))
}
