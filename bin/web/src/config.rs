//! Web server configuration from the environment.

use qbrack::config::{flag, try_load};
use qbrack::{AdminCredentials, CmsConfig, Result};
use std::env;
use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_ADMIN_USER: &str = "admin";

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub cms: CmsConfig,
    pub bind: SocketAddr,
    pub admin: AdminCredentials,
    /// Set when served over HTTPS
    pub secure_cookies: bool,
    /// Honour X-Forwarded-For / X-Real-IP (only behind a reverse proxy)
    pub trust_proxy_headers: bool,
}

impl WebConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let default_bind: SocketAddr = DEFAULT_BIND
            .parse()
            .map_err(|e| qbrack::QbrackError::config(format!("bad default bind: {e}")))?;

        Ok(Self {
            cms: CmsConfig::from_lookup(&lookup)?,
            bind: try_load(&lookup, "QBRACK_BIND", default_bind)?,
            admin: AdminCredentials::new(
                lookup("ADMIN_USER").unwrap_or_else(|| DEFAULT_ADMIN_USER.to_string()),
                lookup("ADMIN_PASS_HASH"),
            )?,
            secure_cookies: flag(&lookup, "QBRACK_SECURE_COOKIES"),
            trust_proxy_headers: flag(&lookup, "TRUST_PROXY_HEADERS"),
        })
    }
}
