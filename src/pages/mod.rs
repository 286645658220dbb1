//! Pages composed from ordered content blocks.
//!
//! A page has no row of its own: it exists while at least one block names
//! it. Blocks are unique per `(page, locale, position)` and a page renders
//! as its blocks for one locale in ascending `position`.
//!
//! Pages are listed in navigation by `page_order`. Every block of a page
//! normally carries the same order; when a block is added with order `0`
//! the store reuses the page's existing order or, for a new page, appends
//! it after every other page.

pub mod markup;

use crate::error::{QbrackError, Result};
use crate::storage::{schema, SqliteHandle};
use crate::validation::{Validator, MAX_PAGE_ORDER};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info, instrument};

pub use markup::render_block;

/// Name of the page served at `/`.
pub const HOME_PAGE: &str = "home";

/// A stored block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub id: i64,
    pub page: String,
    pub locale: String,
    pub position: u32,
    pub page_order: u32,
    pub content: String,
}

impl Block {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            page: row.get("page")?,
            locale: row.get("locale")?,
            position: row.get("position")?,
            page_order: row.get("page_order")?,
            content: row.get("content")?,
        })
    }
}

/// A block about to be inserted.
#[derive(Debug, Clone)]
pub struct NewBlock {
    pub page: String,
    pub locale: String,
    pub position: u32,
    /// `0` asks the store to pick the order.
    pub page_order: u32,
    pub content: String,
}

/// Result of deleting a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedBlock {
    pub deleted_id: i64,
    #[serde(skip)]
    pub removed: bool,
}

/// Block persistence.
#[derive(Debug, Clone)]
pub struct PageStore {
    db: SqliteHandle,
}

impl PageStore {
    pub fn new(db: SqliteHandle) -> Self {
        Self { db }
    }

    /// Inserts a block and returns its id.
    #[instrument(skip(self, block), fields(page = %block.page, locale = %block.locale, position = block.position))]
    pub fn add_block(&self, block: &NewBlock) -> Result<i64> {
        Validator::validate_page_name(&block.page)?;
        Validator::validate_locale(&block.locale)?;
        Validator::validate_page_order(block.page_order)?;
        Validator::validate_block_content(&block.content)?;

        let id = self.db.with_tx(|tx| {
            let page_order = if block.page_order == 0 {
                resolve_page_order(tx, &block.page)?
            } else {
                block.page_order
            };

            tx.execute(
                "INSERT INTO pages(page, page_order, locale, content, position)
                 VALUES(?1, ?2, ?3, ?4, ?5)",
                params![
                    block.page,
                    page_order,
                    block.locale,
                    block.content,
                    block.position
                ],
            )
            .map_err(|e| position_conflict(e, &block.page, block.position))?;
            schema::touch_modified(tx)?;
            Ok(tx.last_insert_rowid())
        })?;

        info!(block_id = id, "block added");
        Ok(id)
    }

    /// Block bodies of `page` in display order.
    pub fn page_contents(&self, page: &str, locale: &str) -> Result<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT content FROM pages WHERE page=?1 AND locale=?2 ORDER BY position",
            )?;
            let contents = stmt
                .query_map(params![page, locale], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(contents)
        })
    }

    /// Every block of `page` for editing, ordered by position then id.
    pub fn blocks_for_page(&self, page: &str, locale: &str) -> Result<Vec<Block>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, page, locale, position, page_order, content
                 FROM pages
                 WHERE page=?1 AND locale=?2
                 ORDER BY position ASC, id ASC",
            )?;
            let blocks = stmt
                .query_map(params![page, locale], Block::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(blocks)
        })
    }

    /// Loads a single block.
    pub fn block(&self, block_id: i64) -> Result<Option<Block>> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, page, locale, position, page_order, content FROM pages WHERE id=?1",
                    [block_id],
                    Block::from_row,
                )
                .optional()?)
        })
    }

    /// Moves and/or rewrites a block.
    #[instrument(skip(self, content))]
    pub fn update_block(&self, block_id: i64, position: u32, content: &str) -> Result<()> {
        Validator::validate_block_content(content)?;

        self.db.with_tx(|tx| {
            let updated = tx
                .execute(
                    "UPDATE pages SET position=?1, content=?2 WHERE id=?3",
                    params![position, content, block_id],
                )
                .map_err(|e| match QbrackError::from(e) {
                    QbrackError::Conflict(_) => {
                        QbrackError::conflict(format!("position {position} is already taken"))
                    }
                    other => other,
                })?;
            if updated == 0 {
                return Err(QbrackError::not_found(format!("block {block_id}")));
            }
            schema::touch_modified(tx)?;
            Ok(())
        })?;

        info!("block updated");
        Ok(())
    }

    /// Deletes one block by id.
    #[instrument(skip(self))]
    pub fn delete_block(&self, block_id: i64) -> Result<DeletedBlock> {
        let removed = self.db.with_tx(|tx| {
            let removed = tx.execute("DELETE FROM pages WHERE id=?1", [block_id])? > 0;
            if removed {
                schema::touch_modified(tx)?;
            }
            Ok(removed)
        })?;

        debug!(removed, "delete_block finished");
        Ok(DeletedBlock {
            deleted_id: block_id,
            removed,
        })
    }

    /// Deletes every block of a page, in all locales.
    #[instrument(skip(self))]
    pub fn delete_page(&self, page: &str) -> Result<usize> {
        let removed = self.db.with_tx(|tx| {
            let removed = tx.execute("DELETE FROM pages WHERE page=?1", [page])?;
            if removed > 0 {
                schema::touch_modified(tx)?;
            }
            Ok(removed)
        })?;

        info!(blocks_removed = removed, "page deleted");
        Ok(removed)
    }

    /// Distinct page names in navigation order.
    pub fn pages_list(&self) -> Result<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT page, MIN(page_order) AS ord
                 FROM pages
                 GROUP BY page
                 ORDER BY ord ASC, page ASC",
            )?;
            let pages = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(pages)
        })
    }
}

/// The page's existing order, or one past the highest order in use.
///
/// Orders are read as `i64` and clamped to `MAX_PAGE_ORDER`, so rows written
/// before the cap existed cannot push a new page out of range.
fn resolve_page_order(conn: &Connection, page: &str) -> Result<u32> {
    let existing: Option<i64> = conn.query_row(
        "SELECT MIN(page_order) FROM pages WHERE page=?1",
        [page],
        |row| row.get(0),
    )?;
    if let Some(order) = existing {
        return Ok(clamp_page_order(order));
    }

    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(page_order), -1) + 1 FROM pages",
        [],
        |row| row.get(0),
    )?;
    let next = clamp_page_order(next);
    debug!(page, page_order = next, "assigned order to new page");
    Ok(next)
}

fn clamp_page_order(order: i64) -> u32 {
    order.clamp(0, i64::from(MAX_PAGE_ORDER)) as u32
}

fn position_conflict(err: rusqlite::Error, page: &str, position: u32) -> QbrackError {
    match QbrackError::from(err) {
        QbrackError::Conflict(_) => QbrackError::conflict(format!(
            "page '{page}' already has a block at position {position}"
        )),
        other => other,
    }
}
