//! The stores of one site, opened together.

use crate::comments::CommentStore;
use crate::config::CmsConfig;
use crate::error::Result;
use crate::media::MediaLibrary;
use crate::pages::PageStore;
use crate::site::SiteParams;
use crate::storage::{SqliteConfig, SqliteHandle};
use std::fs;
use std::path::Path;
use tracing::info;

/// Pages, comments, parameters and media sharing one database.
#[derive(Debug, Clone)]
pub struct Cms {
    pub pages: PageStore,
    pub comments: CommentStore,
    pub params: SiteParams,
    pub media: MediaLibrary,
    locale: String,
}

impl Cms {
    /// Opens (creating if needed) the database and static root named by `config`.
    pub fn open(config: &CmsConfig) -> Result<Self> {
        fs::create_dir_all(&config.static_root)?;
        let db = SqliteHandle::open(&config.db_path, &SqliteConfig::default())?;
        info!(
            db = %config.db_path.display(),
            static_root = %config.static_root.display(),
            locale = %config.locale,
            "site opened"
        );
        Ok(Self::with_handle(db, config))
    }

    /// An in-memory database with media under `static_root`.
    pub fn in_memory(static_root: impl AsRef<Path>) -> Result<Self> {
        let config = CmsConfig {
            static_root: static_root.as_ref().to_path_buf(),
            ..CmsConfig::default()
        };
        Ok(Self::with_handle(SqliteHandle::open_in_memory()?, &config))
    }

    fn with_handle(db: SqliteHandle, config: &CmsConfig) -> Self {
        Self {
            pages: PageStore::new(db.clone()),
            comments: CommentStore::new(db.clone()),
            params: SiteParams::new(db.clone()),
            media: MediaLibrary::new(db, &config.static_root, config.max_upload_bytes),
            locale: config.locale.clone(),
        }
    }

    /// The one locale this site renders.
    pub fn locale(&self) -> &str {
        &self.locale
    }
}
