//! Utility functions for CLI operations.

use crate::{auth::Password, config::CmsConfig, error::QbrackError, Cms, Result};
use rpassword::prompt_password;
use std::fs;
use std::path::Path;

/// Open the site named by the environment
pub fn open_cms() -> Result<Cms> {
    let config = CmsConfig::from_env()?;
    Cms::open(&config)
}

/// Read a text file, rejecting non-UTF-8 content
pub fn read_text_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|_| {
        QbrackError::invalid_input(format!("{} is not valid UTF-8", path.display()))
    })
}

/// Shortens text to `max` characters for one-line listings
pub fn preview(text: &str, max: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Prompt for a password securely (no echo to terminal)
pub fn prompt_for_password(prompt: &str) -> Result<Password> {
    let password_str = prompt_password(format!("{}: ", prompt))
        .map_err(|e| QbrackError::password(format!("Failed to read password: {}", e)))?;
    Ok(Password::new(password_str))
}

/// Prompt twice and require both entries to match
pub fn prompt_for_new_password() -> Result<Password> {
    let first = prompt_for_password("New admin password")?;
    if first.is_empty() {
        return Err(QbrackError::password("Password cannot be empty"));
    }
    let second = prompt_for_password("Repeat password")?;
    if !first.matches(&second) {
        return Err(QbrackError::password("Passwords do not match"));
    }
    Ok(first)
}
