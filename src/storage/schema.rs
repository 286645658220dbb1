//! Table definitions and first-run seeding.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

/// Recorded in `PRAGMA user_version` after bootstrap.
pub const SCHEMA_VERSION: i64 = 1;

/// Format used for the `creation_date` and `modification_date` parameters.
pub const PARAM_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

const TABLES: &str = "
    CREATE TABLE IF NOT EXISTS pages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        page        TEXT    NOT NULL,
        page_order  INTEGER NOT NULL,
        locale      TEXT    NOT NULL DEFAULT 'en',
        content     TEXT    NOT NULL,
        position    INTEGER NOT NULL DEFAULT 0,
        UNIQUE(page, locale, position)
    );
    CREATE INDEX IF NOT EXISTS idx_pages_order ON pages(page_order);

    CREATE TABLE IF NOT EXISTS comments (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        ip            TEXT NOT NULL,
        creation_date TEXT DEFAULT CURRENT_TIMESTAMP,
        user          TEXT,
        comment       TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS media (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        sha256      TEXT    NOT NULL UNIQUE,
        rel_path    TEXT    NOT NULL UNIQUE,
        mime        TEXT    NOT NULL,
        size        INTEGER NOT NULL,
        uploaded_at TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_media_sha256 ON media(sha256);
    CREATE INDEX IF NOT EXISTS idx_media_uploaded_at ON media(uploaded_at);
";

/// Creates every table and seeds `params` the first time it is created.
pub fn bootstrap(conn: &Connection) -> Result<()> {
    let params_exists = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='params'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    conn.execute_batch(TABLES)?;

    if !params_exists {
        conn.execute_batch(
            "CREATE TABLE params (
                id    INTEGER PRIMARY KEY AUTOINCREMENT,
                name  TEXT NOT NULL UNIQUE,
                value TEXT
            );",
        )?;
        let now = format!("strftime('{PARAM_DATE_FORMAT}', 'now', 'localtime')");
        conn.execute(
            &format!("INSERT INTO params(name, value) VALUES('creation_date', {now})"),
            [],
        )?;
        conn.execute(
            &format!("INSERT INTO params(name, value) VALUES('modification_date', {now})"),
            [],
        )?;
        conn.execute(
            "INSERT INTO params(name, value) VALUES('version', ?1)",
            [crate::VERSION],
        )?;
        info!(version = crate::VERSION, "seeded site parameters");
    }

    conn.execute_batch(&format!("PRAGMA user_version={SCHEMA_VERSION};"))?;
    Ok(())
}

/// Sets `modification_date` to the current local time.
pub fn touch_modified(conn: &Connection) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO params(name, value) \
             VALUES('modification_date', strftime('{PARAM_DATE_FORMAT}', 'now', 'localtime')) \
             ON CONFLICT(name) DO UPDATE SET value=excluded.value"
        ),
        [],
    )?;
    Ok(())
}
