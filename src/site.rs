//! Site-wide key/value parameters: title, version and the footer dates.

use crate::error::Result;
use crate::storage::{schema, SqliteHandle};
use crate::validation::Validator;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

pub const PARAM_TITLE: &str = "title";
pub const PARAM_VERSION: &str = "version";
pub const PARAM_CREATION_DATE: &str = "creation_date";
pub const PARAM_MODIFICATION_DATE: &str = "modification_date";

/// What the page footer shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FooterData {
    pub version: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SiteParams {
    db: SqliteHandle,
}

impl SiteParams {
    pub fn new(db: SqliteHandle) -> Self {
        Self { db }
    }

    pub fn get_param(&self, name: &str) -> Result<Option<String>> {
        self.db.with_conn(|conn| read_param(conn, name))
    }

    /// Inserts or replaces a parameter.
    pub fn set_param(&self, name: &str, value: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO params(name, value) VALUES(?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET value=excluded.value",
                params![name, value],
            )?;
            Ok(())
        })
    }

    /// The site title; `None` until the first-run setup stored one.
    pub fn title(&self) -> Result<Option<String>> {
        Ok(self
            .get_param(PARAM_TITLE)?
            .filter(|title| !title.trim().is_empty()))
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        let title = title.trim();
        Validator::validate_title(title)?;
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO params(name, value) VALUES(?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET value=excluded.value",
                params![PARAM_TITLE, title],
            )?;
            schema::touch_modified(tx)
        })?;
        info!(title, "site title set");
        Ok(())
    }

    pub fn footer(&self) -> Result<FooterData> {
        self.db.with_conn(|conn| {
            Ok(FooterData {
                version: read_param(conn, PARAM_VERSION)?,
                creation_date: read_param(conn, PARAM_CREATION_DATE)?,
                modification_date: read_param(conn, PARAM_MODIFICATION_DATE)?,
            })
        })
    }
}

fn read_param(conn: &Connection, name: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM params WHERE name=?1", [name], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?;
    Ok(value.flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_store() -> SiteParams {
        SiteParams::new(SqliteHandle::open_in_memory().unwrap())
    }

    #[test]
    fn test_untitled_until_set() {
        let site = params_store();
        assert_eq!(site.title().unwrap(), None);

        site.set_title("  My Site  ").unwrap();
        assert_eq!(site.title().unwrap().as_deref(), Some("My Site"));

        let err = site.set_title("   ").unwrap_err();
        assert_eq!(err.validation_code(), Some("TITLE_CANT_BE_EMPTY"));
        assert_eq!(site.title().unwrap().as_deref(), Some("My Site"));
    }

    #[test]
    fn test_set_param_upserts() {
        let site = params_store();
        site.set_param("tagline", "one").unwrap();
        site.set_param("tagline", "two").unwrap();
        assert_eq!(site.get_param("tagline").unwrap().as_deref(), Some("two"));
        assert_eq!(site.get_param("missing").unwrap(), None);
    }

    #[test]
    fn test_footer_reads_seeded_values() {
        let site = params_store();
        let footer = site.footer().unwrap();
        assert_eq!(footer.version.as_deref(), Some(crate::VERSION));
        assert!(footer.creation_date.is_some());
        assert!(footer.modification_date.is_some());
    }

    #[test]
    fn test_footer_tolerates_missing_rows() {
        let site = params_store();
        site.db
            .with_conn(|conn| {
                conn.execute("DELETE FROM params", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(site.footer().unwrap(), FooterData::default());
    }
}
