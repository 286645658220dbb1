//! Image upload and the media library page.

use super::render;
use crate::auth::AdminAccess;
use crate::csrf::{get_csrf_token, validate_csrf_token, CsrfProtectedForm};
use crate::error::AppError;
use crate::state::AppState;
use crate::templates::{Chrome, MediaTemplate};
use axum::{
    extract::{multipart::MultipartError, Form, Multipart, State},
    http::StatusCode,
    response::{Html, Redirect},
    Json,
};
use qbrack::media::PendingUpload;
use qbrack::{QbrackError, StoredMedia};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

/// JSON answer of `/upload_media`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    /// Public URL to reference from block content
    pub location: String,
    pub rel_path: String,
    pub sha256: String,
    pub mime: String,
    pub deduplicated: bool,
}

impl From<StoredMedia> for UploadResponse {
    fn from(stored: StoredMedia) -> Self {
        Self {
            location: stored.url(),
            rel_path: stored.record.rel_path,
            sha256: stored.record.sha256,
            mime: stored.record.mime,
            deduplicated: stored.deduplicated,
        }
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    warn!(error = %err, "failed to read multipart body");
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        QbrackError::validation("FILE_TOO_LARGE").into()
    } else {
        AppError::Status(status, err.body_text())
    }
}

/// `POST /upload_media`: multipart with a `file` part and a `csrf_token` part.
///
/// The file is hashed and spooled as it streams in; nothing is stored until
/// the whole body has been read and the CSRF token checked.
#[instrument(skip_all)]
pub async fn upload_media(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut csrf_token = String::new();
    let mut upload: Option<PendingUpload> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "csrf_token" => {
                csrf_token = field.text().await.map_err(multipart_error)?;
            }
            "file" if upload.is_none() => {
                let filename = field.file_name().unwrap_or("").to_string();
                let mut pending = state.cms.media.begin_upload(&filename)?;
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    pending.write_chunk(&chunk)?;
                }
                upload = Some(pending);
            }
            _ => continue,
        }
    }

    if !validate_csrf_token(&session, &csrf_token).await? {
        warn!("CSRF validation failed for media upload");
        return Err(AppError::Csrf);
    }
    let upload = upload.ok_or_else(|| QbrackError::validation("NO_FILE"))?;

    let stored = upload.finish()?;
    info!(
        sha256 = %stored.record.sha256,
        deduplicated = stored.deduplicated,
        "media upload complete"
    );
    Ok(Json(stored.into()))
}

/// `GET /admin/media`
pub async fn media_page(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
) -> Result<Html<String>, AppError> {
    let template = MediaTemplate {
        chrome: Chrome::load(&state.cms)?,
        media: state.cms.media.recent()?,
        max_upload_bytes: state.cms.media.max_upload_bytes(),
        csrf_token: get_csrf_token(&session).await?,
    };
    render(&template)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteMediaForm {
    pub path: String,
}

/// `POST /admin/media/delete`
pub async fn delete_media(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
    Form(form): Form<CsrfProtectedForm<DeleteMediaForm>>,
) -> Result<Redirect, AppError> {
    let form = form.verify(&session).await?;
    let record = state.cms.media.delete(&form.path)?;
    info!(rel_path = %record.rel_path, "media deleted from web");
    Ok(Redirect::to("/admin/media"))
}
