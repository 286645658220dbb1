//! Uploaded images, stored once per distinct content.
//!
//! ## Layout
//!
//! Files live under the static root (served at `/static`) at a path derived
//! from their SHA-256, see [`storage_path`]. The `media` table maps digest to
//! path; both columns are unique.
//!
//! ## Upload flow
//!
//! 1. [`MediaLibrary::begin_upload`] opens a temp file next to the final
//!    location.
//! 2. [`PendingUpload::write_chunk`] spools and hashes each chunk, enforcing
//!    the size limit as bytes arrive.
//! 3. [`PendingUpload::finish`] sniffs the type, then either returns the
//!    record that already holds these bytes (discarding the temp file) or
//!    moves the temp file into place and records it.

pub mod hash;
pub mod sniff;
pub mod upload;

use crate::error::{QbrackError, Result};
use crate::storage::SqliteHandle;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub use hash::{storage_path, ContentHash, ContentHasher, UPLOADS_DIR};
pub use sniff::{sniff_image, ImageKind};
pub use upload::PendingUpload;

/// URL prefix under which the static root is served.
pub const STATIC_URL_PREFIX: &str = "/static/";

/// How many uploads the media overview lists.
pub const RECENT_LIMIT: usize = 25;

/// A row of the `media` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    pub id: i64,
    pub sha256: String,
    pub rel_path: String,
    pub mime: String,
    pub size: u64,
    pub uploaded_at: String,
}

impl MediaRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            sha256: row.get("sha256")?,
            rel_path: row.get("rel_path")?,
            mime: row.get("mime")?,
            size: row.get("size")?,
            uploaded_at: row.get("uploaded_at")?,
        })
    }

    /// Public URL of the file.
    pub fn url(&self) -> String {
        format!("{STATIC_URL_PREFIX}{}", self.rel_path)
    }
}

/// Outcome of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub record: MediaRecord,
    /// True when the bytes were already stored and nothing new was written.
    pub deduplicated: bool,
}

impl StoredMedia {
    pub fn url(&self) -> String {
        self.record.url()
    }
}

const SELECT_MEDIA: &str = "SELECT id, sha256, rel_path, mime, size, uploaded_at FROM media";

/// Media files on disk plus their index in the database.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    db: SqliteHandle,
    static_root: PathBuf,
    max_upload_bytes: u64,
}

impl MediaLibrary {
    pub fn new(db: SqliteHandle, static_root: impl Into<PathBuf>, max_upload_bytes: u64) -> Self {
        Self {
            db,
            static_root: static_root.into(),
            max_upload_bytes,
        }
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Absolute location of a path relative to the static root.
    pub fn absolute_path(&self, rel_path: &str) -> PathBuf {
        self.static_root.join(rel_path)
    }

    /// Starts a streaming upload of a file the client called `original_name`.
    pub fn begin_upload(&self, original_name: &str) -> Result<PendingUpload> {
        PendingUpload::new(self.clone(), original_name)
    }

    /// Stores a complete buffer; same rules as a streamed upload.
    pub fn store_bytes(&self, original_name: &str, bytes: &[u8]) -> Result<StoredMedia> {
        let mut upload = self.begin_upload(original_name)?;
        upload.write_chunk(bytes)?;
        upload.finish()
    }

    pub fn get_by_hash(&self, sha256: &str) -> Result<Option<MediaRecord>> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("{SELECT_MEDIA} WHERE sha256=?1"),
                    [sha256],
                    MediaRecord::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_by_path(&self, rel_path: &str) -> Result<Option<MediaRecord>> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("{SELECT_MEDIA} WHERE rel_path=?1"),
                    [rel_path],
                    MediaRecord::from_row,
                )
                .optional()?)
        })
    }

    /// The most recent uploads, newest first.
    pub fn recent(&self) -> Result<Vec<MediaRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "{SELECT_MEDIA} ORDER BY uploaded_at DESC, id DESC LIMIT ?1"
            ))?;
            let records = stmt
                .query_map([RECENT_LIMIT as i64], MediaRecord::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// Removes an upload given its relative path or its `/static/...` URL.
    ///
    /// Only paths recorded in the `media` table are touched. A file that is
    /// already gone from disk does not fail the delete; any other failure to
    /// remove it keeps the row.
    #[instrument(skip(self))]
    pub fn delete(&self, path: &str) -> Result<MediaRecord> {
        let rel_path = normalize_media_path(path)?;
        let record = self
            .get_by_path(&rel_path)?
            .ok_or_else(|| QbrackError::not_found(format!("media {rel_path}")))?;

        // The row is only removed once the file is gone
        let abs_path = self.absolute_path(&record.rel_path);
        self.db.with_tx(|tx| {
            tx.execute("DELETE FROM media WHERE id=?1", [record.id])?;
            match fs::remove_file(&abs_path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(rel_path = %record.rel_path, "media file was already missing");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        })?;

        info!(sha256 = %record.sha256, rel_path = %record.rel_path, "media deleted");
        Ok(record)
    }

    fn insert(&self, sha256: &str, rel_path: &str, mime: &str, size: u64) -> Result<MediaRecord> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO media(sha256, rel_path, mime, size) VALUES(?1, ?2, ?3, ?4)",
                params![sha256, rel_path, mime, size],
            )?;
            let id = conn.last_insert_rowid();
            Ok(conn.query_row(
                &format!("{SELECT_MEDIA} WHERE id=?1"),
                [id],
                MediaRecord::from_row,
            )?)
        })
    }
}

/// Turns a submitted media reference into a path relative to the static root.
///
/// Accepts `uploads/...`, `static/uploads/...` and `/static/uploads/...`.
/// Anything that could leave the uploads directory is refused.
pub fn normalize_media_path(path: &str) -> Result<String> {
    let path = path.trim();
    let rel = path
        .strip_prefix(STATIC_URL_PREFIX)
        .or_else(|| path.strip_prefix("static/"))
        .unwrap_or(path);

    let inside_uploads = rel
        .strip_prefix(UPLOADS_DIR)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1);
    let escapes = rel
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if !inside_uploads || escapes || rel.contains('\\') {
        return Err(QbrackError::validation("MEDIA_PATH_INVALID"));
    }
    Ok(rel.to_string())
}
