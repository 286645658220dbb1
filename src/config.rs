//! Runtime configuration read from the environment.

use crate::error::{QbrackError, Result};
use crate::validation::{Validator, DEFAULT_MAX_UPLOAD_BYTES};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

pub const ENV_DB: &str = "QBRACK_DB";
pub const ENV_STATIC_ROOT: &str = "QBRACK_STATIC_ROOT";
pub const ENV_LOCALE: &str = "QBRACK_LOCALE";
pub const ENV_MAX_UPLOAD_BYTES: &str = "QBRACK_MAX_UPLOAD_BYTES";

/// Where the site's data lives and which locale it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmsConfig {
    pub db_path: PathBuf,
    pub static_root: PathBuf,
    pub locale: String,
    pub max_upload_bytes: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("qcms.db"),
            static_root: PathBuf::from("static"),
            locale: "en".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl CmsConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            db_path: lookup(ENV_DB).map(PathBuf::from).unwrap_or(defaults.db_path),
            static_root: lookup(ENV_STATIC_ROOT)
                .map(PathBuf::from)
                .unwrap_or(defaults.static_root),
            locale: lookup(ENV_LOCALE).unwrap_or(defaults.locale),
            max_upload_bytes: try_load(&lookup, ENV_MAX_UPLOAD_BYTES, defaults.max_upload_bytes)?,
        };

        Validator::validate_locale(&config.locale)
            .map_err(|_| QbrackError::config(format!("Invalid {ENV_LOCALE}: {}", config.locale)))?;
        if config.max_upload_bytes == 0 {
            return Err(QbrackError::config(format!(
                "{ENV_MAX_UPLOAD_BYTES} must be greater than zero"
            )));
        }
        Ok(config)
    }
}

/// Parses `key` if set, falling back to `default`.
pub fn try_load<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| QbrackError::config(format!("Invalid {key} value: {e}"))),
        None => {
            debug!("{key} not set, using default");
            Ok(default)
        }
    }
}

/// Reads a boolean flag: `1`, `true`, `yes` and `on` are true.
pub fn flag<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
