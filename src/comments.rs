//! Visitor comments.

use crate::error::{QbrackError, Result};
use crate::storage::SqliteHandle;
use crate::validation::{Validator, MAX_COMMENT_LENGTH, MAX_COMMENT_USER_LENGTH};
use rusqlite::params;
use serde::Serialize;
use tracing::{info, instrument};

/// A stored comment, as shown on pages and returned by `/get_comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: i64,
    pub ip: String,
    pub user: String,
    pub comment: String,
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub creation_date: String,
}

/// Comment persistence and acceptance rules.
#[derive(Debug, Clone)]
pub struct CommentStore {
    db: SqliteHandle,
}

impl CommentStore {
    pub fn new(db: SqliteHandle) -> Self {
        Self { db }
    }

    /// Stores a comment and returns its id.
    ///
    /// Fields are checked in a fixed order so the first failing one decides
    /// the code: user, then ip, then comment.
    #[instrument(skip(self, comment), fields(comment_len = comment.len()))]
    pub fn add(&self, ip: &str, user: &str, comment: &str) -> Result<i64> {
        let user = user.trim();
        let ip = ip.trim();
        let comment = comment.trim();

        if user.is_empty() {
            return Err(QbrackError::validation("USER_CANT_BE_EMPTY"));
        }
        if ip.is_empty() {
            return Err(QbrackError::validation("IP_CANT_BE_EMPTY"));
        }
        if comment.is_empty() {
            return Err(QbrackError::validation("COMMENT_CANT_BE_EMPTY"));
        }
        if user.chars().count() > MAX_COMMENT_USER_LENGTH {
            return Err(QbrackError::validation("USER_TOO_LONG"));
        }
        if comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(QbrackError::validation("COMMENT_TOO_LONG"));
        }
        Validator::validate_text(user)?;
        Validator::validate_text(comment)?;

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments(ip, user, comment) VALUES(?1, ?2, ?3)",
                params![ip, user, comment],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        info!(comment_id = id, "comment stored");
        Ok(id)
    }

    /// All comments, oldest first.
    pub fn all(&self) -> Result<Vec<Comment>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, ip, user, comment, datetime(creation_date, 'localtime')
                 FROM comments
                 ORDER BY id ASC",
            )?;
            let comments = stmt
                .query_map([], |row| {
                    Ok(Comment {
                        id: row.get(0)?,
                        ip: row.get(1)?,
                        user: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        comment: row.get(3)?,
                        creation_date: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }
}
