//! State shared by every handler.

use qbrack::validation::{RateLimit, RateLimiter};
use qbrack::{AdminCredentials, Cms};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub cms: Cms,
    pub admin: Arc<AdminCredentials>,
    /// Comment posting, keyed by client IP
    pub comment_limiter: RateLimiter,
    pub trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(cms: Cms, admin: AdminCredentials, trust_proxy_headers: bool) -> Self {
        Self {
            cms,
            admin: Arc::new(admin),
            comment_limiter: RateLimiter::new(RateLimit::comments_default()),
            trust_proxy_headers,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("locale", &self.cms.locale())
            .field("admin_enabled", &self.admin.is_enabled())
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish_non_exhaustive()
    }
}
