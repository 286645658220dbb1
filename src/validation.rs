//! Input validation and abuse limits for qbrack
//!
//! Every value a visitor or administrator can submit passes through one of
//! the checks here before it reaches the database or the filesystem.
//! Rejections use stable upper-case codes so that handlers and templates
//! can match on them.

use crate::error::{QbrackError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a page name
pub const MAX_PAGE_NAME_LENGTH: usize = 64;

/// Maximum length of a block body (256KB)
pub const MAX_BLOCK_CONTENT_SIZE: usize = 256 * 1024;

/// Highest navigation order a page can be given
pub const MAX_PAGE_ORDER: u32 = 1_000_000;

/// Maximum length of a locale tag (`en`, `pt-BR`, ...)
pub const MAX_LOCALE_LENGTH: usize = 16;

/// Maximum length of the name a commenter gives, in characters
pub const MAX_COMMENT_USER_LENGTH: usize = 100;

/// Maximum length of a comment, in characters
pub const MAX_COMMENT_LENGTH: usize = 4000;

/// Maximum length of the site title, in characters
pub const MAX_TITLE_LENGTH: usize = 200;

/// Default maximum size of an uploaded media file (10MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum length of a normalized upload file name (stem and extension)
pub const MAX_FILENAME_LENGTH: usize = 80;

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimit {
    /// Maximum operations per time window
    pub max_operations: usize,
    /// Time window for rate limiting
    pub time_window: Duration,
}

impl RateLimit {
    /// Create a new rate limit configuration
    pub fn new(max_operations: usize, time_window: Duration) -> Self {
        Self {
            max_operations,
            time_window,
        }
    }

    /// Default rate limit for comment posting (5 comments per minute)
    pub fn comments_default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

/// Sliding-window limiter keyed by client identifier (usually an IP address)
#[derive(Debug, Clone)]
pub struct RateLimiter {
    operations: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    config: RateLimit,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration
    pub fn new(config: RateLimit) -> Self {
        Self {
            operations: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Records an operation for `identifier`, failing if its window is full
    pub fn check_rate_limit(&self, identifier: &str) -> Result<()> {
        let mut operations = self
            .operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        let window = self.config.time_window;

        // Forget clients whose whole history has aged out
        operations.retain(|_, history| {
            history.retain(|&time| now.duration_since(time) < window);
            !history.is_empty()
        });

        let history = operations.entry(identifier.to_string()).or_default();
        if history.len() >= self.config.max_operations {
            return Err(QbrackError::rate_limited(format!(
                "{} operations in {:?}",
                self.config.max_operations, self.config.time_window
            )));
        }

        history.push(now);
        Ok(())
    }
}

/// Validation functions for submitted data
pub struct Validator;

impl Validator {
    /// Page names appear in URLs, so they are kept to a URL-safe alphabet
    pub fn validate_page_name(page: &str) -> Result<()> {
        if page.is_empty() {
            return Err(QbrackError::validation("PAGE_CANT_BE_EMPTY"));
        }
        if page.len() > MAX_PAGE_NAME_LENGTH {
            return Err(QbrackError::validation("PAGE_NAME_TOO_LONG"));
        }
        if !page
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(QbrackError::validation("PAGE_NAME_INVALID"));
        }
        Ok(())
    }

    /// Explicit page orders stay well inside the integer range
    pub fn validate_page_order(page_order: u32) -> Result<()> {
        if page_order > MAX_PAGE_ORDER {
            return Err(QbrackError::validation("PAGE_ORDER_INVALID"));
        }
        Ok(())
    }

    /// Validate a block body
    pub fn validate_block_content(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(QbrackError::validation("CONTENT_CANT_BE_EMPTY"));
        }
        if content.len() > MAX_BLOCK_CONTENT_SIZE {
            return Err(QbrackError::validation("CONTENT_TOO_LARGE"));
        }
        Ok(())
    }

    /// Validate a locale tag: letters, digits and `-`
    pub fn validate_locale(locale: &str) -> Result<()> {
        if locale.is_empty()
            || locale.len() > MAX_LOCALE_LENGTH
            || !locale.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(QbrackError::validation("LOCALE_INVALID"));
        }
        Ok(())
    }

    /// Validate the site title
    pub fn validate_title(title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(QbrackError::validation("TITLE_CANT_BE_EMPTY"));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(QbrackError::validation("TITLE_TOO_LONG"));
        }
        Ok(())
    }

    /// Rejects NUL and control characters other than whitespace
    pub fn validate_text(value: &str) -> Result<()> {
        if value
            .chars()
            .any(|c| c.is_control() && c != '\t' && c != '\n' && c != '\r')
        {
            return Err(QbrackError::validation("CONTROL_CHARACTERS"));
        }
        Ok(())
    }
}

/// Reduces an uploaded file name to something safe to put on disk.
///
/// The name is NFKD-folded to ASCII and path separators count as
/// whitespace, so `a/b.png` becomes `a_b.png`. Runs of whitespace become a
/// single `_`, only ASCII alphanumerics, `.`, `-` and `_` survive, the result
/// is lower-cased, and leading or trailing dots and underscores are stripped
/// (again after truncation). Never empty.
pub fn normalize_filename(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let kept: String = ascii
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let truncated: String = trim_name(&kept).chars().take(MAX_FILENAME_LENGTH).collect();
    let normalized = trim_name(&truncated);
    if normalized.is_empty() {
        "file".to_string()
    } else {
        normalized.to_string()
    }
}

fn trim_name(name: &str) -> &str {
    name.trim_matches(|c| c == '.' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_page_name_validation() {
        assert!(Validator::validate_page_name("home").is_ok());
        assert!(Validator::validate_page_name("about-us_2").is_ok());

        let err = Validator::validate_page_name("").unwrap_err();
        assert_eq!(err.validation_code(), Some("PAGE_CANT_BE_EMPTY"));
        assert!(Validator::validate_page_name("a/b").is_err());
        assert!(Validator::validate_page_name("with space").is_err());
        assert!(Validator::validate_page_name(&"p".repeat(MAX_PAGE_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_block_content_validation() {
        assert!(Validator::validate_block_content("# Hello").is_ok());
        assert!(Validator::validate_block_content("  \n ").is_err());
        let huge = "x".repeat(MAX_BLOCK_CONTENT_SIZE + 1);
        assert_eq!(
            Validator::validate_block_content(&huge)
                .unwrap_err()
                .validation_code(),
            Some("CONTENT_TOO_LARGE")
        );
    }

    #[test]
    fn test_locale_validation() {
        assert!(Validator::validate_locale("en").is_ok());
        assert!(Validator::validate_locale("pt-BR").is_ok());
        assert!(Validator::validate_locale("").is_err());
        assert!(Validator::validate_locale("en;drop").is_err());
    }

    #[test]
    fn test_text_validation() {
        assert!(Validator::validate_text("line one\nline two\ttabbed").is_ok());
        assert!(Validator::validate_text("nul\0byte").is_err());
        assert!(Validator::validate_text("bell\x07").is_err());
    }

    #[test]
    fn test_normalize_filename() {
        assert_eq!(normalize_filename("My Holiday Photo.JPG"), "my_holiday_photo.jpg");
        assert_eq!(normalize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(normalize_filename("a/b.png"), "a_b.png");
        assert_eq!(normalize_filename("C:\\Users\\me\\cat.png"), "c_users_me_cat.png");
        assert_eq!(normalize_filename("..hidden."), "hidden");
        assert_eq!(normalize_filename("two   spaces.png"), "two_spaces.png");
        assert_eq!(normalize_filename("żółw.gif"), "zow.gif");
        assert_eq!(normalize_filename("Café Crème.PNG"), "cafe_creme.png");
        assert_eq!(normalize_filename("???"), "file");
        assert_eq!(normalize_filename(""), "file");
    }

    #[test]
    fn test_normalize_filename_length_cap() {
        let long = format!("{}.png", "a".repeat(200));
        assert_eq!(normalize_filename(&long).len(), MAX_FILENAME_LENGTH);

        // Truncation must not leave a trailing separator behind
        let name = format!("{}_tail.png", "b".repeat(MAX_FILENAME_LENGTH - 1));
        let normalized = normalize_filename(&name);
        assert_eq!(normalized, "b".repeat(MAX_FILENAME_LENGTH - 1));
    }

    #[test]
    fn test_rate_limiter() {
        let limiter = RateLimiter::new(RateLimit::new(2, Duration::from_millis(100)));

        assert!(limiter.check_rate_limit("10.0.0.1").is_ok());
        assert!(limiter.check_rate_limit("10.0.0.1").is_ok());

        let err = limiter.check_rate_limit("10.0.0.1").unwrap_err();
        assert!(matches!(err, QbrackError::RateLimited(_)));

        // Other clients have their own window
        assert!(limiter.check_rate_limit("10.0.0.2").is_ok());

        thread::sleep(Duration::from_millis(150));
        assert!(limiter.check_rate_limit("10.0.0.1").is_ok());
    }
}
