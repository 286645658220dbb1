//! A media upload in progress.

use super::hash::{storage_path, ContentHasher, UPLOADS_DIR};
use super::sniff::{sniff_image, SNIFF_LEN};
use super::{MediaLibrary, MediaRecord, StoredMedia};
use crate::error::{QbrackError, Result};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Spool directory under `uploads/`; on the same filesystem as the final
/// location so finishing an upload is a rename.
pub const INCOMING_DIR: &str = ".incoming";

/// Bytes received so far for one file. Dropping it discards the spool file.
pub struct PendingUpload {
    library: MediaLibrary,
    original_name: String,
    spool: NamedTempFile,
    hasher: ContentHasher,
    head: Vec<u8>,
}

impl std::fmt::Debug for PendingUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingUpload")
            .field("original_name", &self.original_name)
            .field("received", &self.hasher.len())
            .finish()
    }
}

impl PendingUpload {
    pub(super) fn new(library: MediaLibrary, original_name: &str) -> Result<Self> {
        let incoming = library.static_root().join(UPLOADS_DIR).join(INCOMING_DIR);
        fs::create_dir_all(&incoming)?;
        let spool = NamedTempFile::new_in(&incoming)?;
        debug!(original_name, spool = %spool.path().display(), "upload started");

        Ok(Self {
            library,
            original_name: original_name.to_string(),
            spool,
            hasher: ContentHasher::new(),
            head: Vec::with_capacity(SNIFF_LEN),
        })
    }

    /// Bytes received so far.
    pub fn received(&self) -> u64 {
        self.hasher.len()
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Appends a chunk, failing once the library's size limit is passed.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if self.hasher.len() + chunk.len() as u64 > self.library.max_upload_bytes() {
            warn!(
                original_name = %self.original_name,
                limit = self.library.max_upload_bytes(),
                "upload exceeds size limit"
            );
            return Err(QbrackError::validation("FILE_TOO_LARGE"));
        }

        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }
        self.spool.write_all(chunk)?;
        self.hasher.update(chunk);
        Ok(())
    }

    /// Completes the upload, deduplicating against stored content.
    pub fn finish(self) -> Result<StoredMedia> {
        self.finish_with_lookup(MediaLibrary::get_by_hash)
    }

    /// `finish` with the existing-content lookup supplied by the caller.
    fn finish_with_lookup<F>(self, lookup: F) -> Result<StoredMedia>
    where
        F: FnOnce(&MediaLibrary, &str) -> Result<Option<MediaRecord>>,
    {
        let PendingUpload {
            library,
            original_name,
            mut spool,
            hasher,
            head,
        } = self;

        if hasher.is_empty() {
            return Err(QbrackError::validation("EMPTY_FILE"));
        }
        let kind =
            sniff_image(&head).ok_or_else(|| QbrackError::validation("UNSUPPORTED_MEDIA_TYPE"))?;
        spool.flush()?;

        let size = hasher.len();
        let hash = hasher.finalize();
        let sha256 = hash.to_hex();

        if let Some(record) = lookup(&library, &sha256)? {
            info!(sha256 = %hash.short(), rel_path = %record.rel_path, "duplicate upload skipped");
            return Ok(StoredMedia {
                record,
                deduplicated: true,
            });
        }

        let rel_path = storage_path(&hash, &original_name, kind.extension());
        let abs_path = library.absolute_path(&rel_path);
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent)?;
        }
        spool.persist(&abs_path).map_err(|e| QbrackError::Io(e.error))?;

        match library.insert(&sha256, &rel_path, kind.mime(), size) {
            Ok(record) => {
                info!(sha256 = %hash.short(), rel_path = %rel_path, size, mime = kind.mime(), "media stored");
                Ok(StoredMedia {
                    record,
                    deduplicated: false,
                })
            }
            Err(QbrackError::Conflict(_)) => {
                // The same bytes were recorded between our lookup and insert
                let record = library.get_by_hash(&sha256)?.ok_or_else(|| {
                    QbrackError::conflict(format!("path {rel_path} is taken by other content"))
                })?;
                if record.rel_path != rel_path {
                    let _ = fs::remove_file(&abs_path);
                }
                info!(sha256 = %hash.short(), "concurrent duplicate upload resolved");
                Ok(StoredMedia {
                    record,
                    deduplicated: true,
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&abs_path);
                Err(e)
            }
        }
    }
}
