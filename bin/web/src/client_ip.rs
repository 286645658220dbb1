//! The address a request came from.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::net::{IpAddr, SocketAddr};

/// Client IP as text; empty when it cannot be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let ip = client_ip(
            &parts.headers,
            parts.extensions.get::<ConnectInfo<SocketAddr>>(),
            state.trust_proxy_headers,
        );
        Ok(ClientIp(ip.map(|ip| ip.to_string()).unwrap_or_default()))
    }
}

/// Checks the following in order:
/// 1. X-Forwarded-For header (first IP in chain) - only if proxy headers are trusted
/// 2. X-Real-IP header - only if proxy headers are trusted
/// 3. Connection info (direct connection)
fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> Option<IpAddr> {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    connect_info.map(|ci| ci.0.ip())
}
