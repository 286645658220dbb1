//! Web server for qbrack: renders pages, takes comments and serves the admin
//! tools for blocks and media.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use qbrack::Cms;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::time, Expiry, SessionManagerLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod client_ip;
mod config;
mod csrf;
mod error;
mod handlers;
mod session_store;
mod state;
mod templates;

use config::WebConfig;
use session_store::{spawn_pruning, ExpiringMemoryStore};
use state::AppState;

/// Room for multipart boundaries and the CSRF field on top of the file itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Sessions end after this long without a change
const SESSION_IDLE_HOURS: i64 = 2;

/// How often expired sessions are dropped from memory
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Builds the application with routes, session handling and security headers
pub fn build_router(
    state: AppState,
    session_store: ExpiringMemoryStore,
    secure_cookies: bool,
) -> Router {
    let static_root = state.cms.media.static_root().to_path_buf();
    let body_limit = state.cms.media.max_upload_bytes() + MULTIPART_OVERHEAD;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(SESSION_IDLE_HOURS)))
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_name("qbrack-session")
        .with_http_only(true);

    Router::new()
        .route("/", get(handlers::pages::home))
        .route("/pages_list", get(handlers::pages::pages_list))
        .route("/page/:page", get(handlers::pages::show_page))
        .route(
            "/add_page",
            get(handlers::pages::add_page_form).post(handlers::pages::add_page_submit),
        )
        .route("/del_page/:id", post(handlers::pages::del_page))
        .route("/edit_page/:page", get(handlers::pages::edit_page))
        .route(
            "/edit_page/:page/block/:id",
            post(handlers::pages::update_block),
        )
        .route(
            "/edit_page/:page/block/:id/delete",
            post(handlers::pages::delete_block),
        )
        .route("/edit_page/:page/delete", post(handlers::pages::delete_page))
        .route("/add_comment", post(handlers::comments::add_comment))
        .route("/get_comments", get(handlers::comments::get_comments))
        .route("/upload_media", post(handlers::media::upload_media))
        .route("/admin/media", get(handlers::media::media_page))
        .route("/admin/media/delete", post(handlers::media::delete_media))
        .nest_service("/static", ServeDir::new(static_root))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit as usize))
        .layer(session_layer)
        // Security headers to prevent common attacks
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qbrack=info,qbrack_web=info,tower_http=debug".into()),
        )
        .init();

    let config = WebConfig::from_env()?;
    let cms = Cms::open(&config.cms)?;

    if config.admin.is_enabled() {
        info!(user = config.admin.username(), "Admin access enabled");
    } else {
        warn!("ADMIN_PASS_HASH not set - admin pages are disabled (see 'qbrack hash-password')");
    }
    if config.secure_cookies {
        info!("Secure cookies enabled - cookies will only be sent over HTTPS");
    } else {
        warn!("Secure cookies disabled - set QBRACK_SECURE_COOKIES=true for production");
    }

    let state = AppState::new(cms, config.admin.clone(), config.trust_proxy_headers);
    let session_store = ExpiringMemoryStore::new();
    spawn_pruning(session_store.clone(), SESSION_PRUNE_INTERVAL);
    let app = build_router(state, session_store, config.secure_cookies);

    let listener = TcpListener::bind(config.bind).await?;
    info!("qbrack running on http://{}", config.bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests;
