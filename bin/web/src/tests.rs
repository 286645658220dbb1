//! Router tests: each request goes through the full middleware stack.

use super::*;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use qbrack::auth::{hash_password, Password};
use qbrack::{AdminCredentials, CmsConfig, NewBlock};
use serde_json::Value;
use std::str::FromStr;
use std::sync::OnceLock;
use tower_sessions::session::Id;
use tower_sessions::SessionStore;
use tempfile::TempDir;
use tower::ServiceExt;

/// `admin:letmein`
const ADMIN_AUTH: &str = "Basic YWRtaW46bGV0bWVpbg==";
/// `admin:wrong`
const WRONG_AUTH: &str = "Basic YWRtaW46d3Jvbmc=";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRrouter-test-image";

fn admin_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(&Password::new("letmein".to_string())).unwrap())
        .clone()
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Reply {
    fn location(&self) -> &str {
        self.headers[header::LOCATION].to_str().unwrap()
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    fn csrf_token(&self) -> String {
        let marker = r#"name="csrf_token" value=""#;
        let start = self.body.find(marker).expect("no csrf field") + marker.len();
        let end = self.body[start..].find('"').unwrap();
        self.body[start..start + end].to_string()
    }
}

struct TestApp {
    app: Router,
    cms: Cms,
    sessions: ExpiringMemoryStore,
    cookie: Option<String>,
    _dir: TempDir,
}

impl TestApp {
    fn with_admin(admin: AdminCredentials, max_upload_bytes: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let config = CmsConfig {
            db_path: dir.path().join("test.db"),
            static_root: dir.path().join("static"),
            max_upload_bytes,
            ..CmsConfig::default()
        };
        let cms = Cms::open(&config).unwrap();
        let sessions = ExpiringMemoryStore::new();
        let app = build_router(
            AppState::new(cms.clone(), admin, false),
            sessions.clone(),
            false,
        );
        Self {
            app,
            cms,
            sessions,
            cookie: None,
            _dir: dir,
        }
    }

    fn new() -> Self {
        let admin = AdminCredentials::new("admin", Some(admin_hash())).unwrap();
        Self::with_admin(admin, 1024 * 1024)
    }

    fn titled() -> Self {
        let app = Self::new();
        app.cms.params.set_title("Test Site").unwrap();
        app
    }

    async fn send(&mut self, mut req: Request<Body>) -> Reply {
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        if let Some(cookie) = &self.cookie {
            req.headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.app.clone().oneshot(req).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Reply {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    async fn get(&mut self, uri: &str, auth: Option<&str>) -> Reply {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&mut self, uri: &str, auth: Option<&str>, fields: &[(&str, &str)]) -> Reply {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    async fn upload(&mut self, token: &str, filename: &str, bytes: &[u8]) -> Reply {
        const BOUNDARY: &str = "qbrack-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(
            format!(
                "\r\n--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"csrf_token\"\r\n\r\n{token}\r\n--{BOUNDARY}--\r\n"
            )
            .as_bytes(),
        );

        let req = Request::builder()
            .method("POST")
            .uri("/upload_media")
            .header(header::AUTHORIZATION, ADMIN_AUTH)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    /// Opens a session and returns its CSRF token
    async fn token(&mut self) -> String {
        self.get("/add_page", Some(ADMIN_AUTH)).await.csrf_token()
    }

    fn add_block(&self, page: &str, position: u32, content: &str) -> i64 {
        self.cms
            .pages
            .add_block(&NewBlock {
                page: page.to_string(),
                locale: "en".to_string(),
                position,
                page_order: 0,
                content: content.to_string(),
            })
            .unwrap()
    }
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => (b as char).to_string(),
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// Test that pages redirect to the setup form until the site has a title
#[tokio::test]
async fn test_untitled_site_redirects_to_setup() {
    let mut t = TestApp::new();

    let reply = t.get("/", None).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/add_page");

    let reply = t.get("/page/about", None).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
}

/// Test the first-run flow: title first, then blocks
#[tokio::test]
async fn test_title_setup_then_add_block() {
    let mut t = TestApp::new();

    let form = t.get("/add_page", Some(ADMIN_AUTH)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("Name your site"));
    let token = form.csrf_token();

    let reply = t
        .post_form(
            "/add_page",
            Some(ADMIN_AUTH),
            &[("csrf_token", &token), ("title", "My Site")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/add_page");
    assert_eq!(t.cms.params.title().unwrap().as_deref(), Some("My Site"));

    let reply = t
        .post_form(
            "/add_page",
            Some(ADMIN_AUTH),
            &[
                ("csrf_token", &token),
                ("page", "about"),
                ("position", "0"),
                ("page_order", ""),
                ("content", "# About us\n\nWe make *things*."),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/page/about");

    let reply = t
        .post_form(
            "/add_page",
            Some(ADMIN_AUTH),
            &[
                ("csrf_token", &token),
                ("page", "home"),
                ("position", "0"),
                ("content", "Welcome home"),
            ],
        )
        .await;
    assert_eq!(reply.location(), "/page/home");
    let home = t.get("/page/home", None).await;
    assert_eq!(home.status, StatusCode::OK);
    assert!(home.body.contains("<p>Welcome home</p>"));

    let page = t.get("/page/about", None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("<h1>About us</h1>"));
    assert!(page.body.contains("<em>things</em>"));
    assert!(page.body.contains("My Site"));

    let list = t.get("/pages_list", None).await;
    assert_eq!(list.json(), serde_json::json!({ "pages": ["about", "home"] }));
}

/// Test that bad block input re-shows the form with the reason
#[tokio::test]
async fn test_add_block_validation_errors() {
    let mut t = TestApp::titled();
    let token = t.token().await;

    let reply = t
        .post_form(
            "/add_page",
            Some(ADMIN_AUTH),
            &[
                ("csrf_token", &token),
                ("page", "about"),
                ("position", "first"),
                ("content", "text"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body.contains("POSITION_INVALID"));

    t.add_block("about", 0, "taken");
    let reply = t
        .post_form(
            "/add_page",
            Some(ADMIN_AUTH),
            &[
                ("csrf_token", &token),
                ("page", "about"),
                ("position", "0"),
                ("content", "again"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body.contains("already has a block at position 0"));
}

/// Test that admin routes demand the configured credentials
#[tokio::test]
async fn test_admin_routes_require_credentials() {
    let mut t = TestApp::titled();

    for auth in [None, Some(WRONG_AUTH)] {
        let reply = t.get("/add_page", auth).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            reply.headers[header::WWW_AUTHENTICATE],
            r#"Basic realm="Restricted""#
        );
    }

    assert_eq!(t.get("/admin/media", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.get("/edit_page/home", None).await.status, StatusCode::UNAUTHORIZED);
}

/// Test that without a password hash nobody can sign in
#[tokio::test]
async fn test_admin_disabled_without_hash() {
    let mut t = TestApp::with_admin(AdminCredentials::new("admin", None).unwrap(), 1024);
    let reply = t.get("/add_page", Some(ADMIN_AUTH)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

/// Test page rendering and the 404 for unknown pages
#[tokio::test]
async fn test_page_rendering_and_unknown_pages() {
    let mut t = TestApp::titled();
    t.add_block("home", 1, "second");
    t.add_block("home", 0, "first");

    let home = t.get("/", None).await;
    assert_eq!(home.status, StatusCode::OK);
    let first = home.body.find("<p>first</p>").unwrap();
    let second = home.body.find("<p>second</p>").unwrap();
    assert!(first < second);
    assert_eq!(home.headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(home.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

    let missing = t.get("/page/nowhere", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert!(missing.body.contains("does not exist"));
}

/// Test posting and listing comments
#[tokio::test]
async fn test_comment_flow() {
    let mut t = TestApp::titled();
    let token = t.get("/", None).await.csrf_token();

    let reply = t
        .post_form(
            "/add_comment",
            None,
            &[("csrf_token", &token), ("user", "Ann"), ("comment", "Nice <b>site</b>")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/");

    let json = t.get("/get_comments", None).await.json();
    let comments = json["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["user"], "Ann");
    assert_eq!(comments[0]["ip"], "127.0.0.1");

    // Visitor text is escaped on the page
    let home = t.get("/", None).await;
    assert!(home.body.contains("Nice &lt;b&gt;site"));
    assert!(!home.body.contains("<b>site"));
}

/// Test that a rejected comment is reported on the next page view only
#[tokio::test]
async fn test_rejected_comment_flashes_reason() {
    let mut t = TestApp::titled();
    let token = t.get("/", None).await.csrf_token();

    let reply = t
        .post_form(
            "/add_comment",
            None,
            &[("csrf_token", &token), ("user", "  "), ("comment", "hello")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert!(t.cms.comments.all().unwrap().is_empty());

    assert!(t.get("/", None).await.body.contains("USER_CANT_BE_EMPTY"));
    assert!(!t.get("/", None).await.body.contains("USER_CANT_BE_EMPTY"));
}

/// Test that forms without the session's CSRF token are refused
#[tokio::test]
async fn test_csrf_token_required() {
    let mut t = TestApp::titled();
    t.get("/", None).await;

    let reply = t
        .post_form(
            "/add_comment",
            None,
            &[("csrf_token", "forged"), ("user", "Eve"), ("comment", "hi")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(t.cms.comments.all().unwrap().is_empty());
}

/// Test the per-IP comment rate limit
#[tokio::test]
async fn test_comment_rate_limit() {
    let mut t = TestApp::titled();
    let token = t.get("/", None).await.csrf_token();

    for i in 0..5 {
        let comment = format!("comment {i}");
        let reply = t
            .post_form(
                "/add_comment",
                None,
                &[("csrf_token", &token), ("user", "Bob"), ("comment", &comment)],
            )
            .await;
        assert_eq!(reply.status, StatusCode::SEE_OTHER);
    }

    let reply = t
        .post_form(
            "/add_comment",
            None,
            &[("csrf_token", &token), ("user", "Bob"), ("comment", "one more")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(t.cms.comments.all().unwrap().len(), 5);
}

/// Test upload, deduplication, static serving and deletion of media
#[tokio::test]
async fn test_media_upload_dedup_and_delete() {
    let mut t = TestApp::titled();
    let token = t.token().await;

    let first = t.upload(&token, "Team Photo.png", PNG).await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.body);
    let first = first.json();
    assert_eq!(first["deduplicated"], false);
    assert_eq!(first["mime"], "image/png");
    let location = first["location"].as_str().unwrap().to_string();
    assert!(location.starts_with("/static/uploads/"));
    assert!(location.ends_with("_team_photo.png"));

    let second = t.upload(&token, "copy.png", PNG).await.json();
    assert_eq!(second["deduplicated"], true);
    assert_eq!(second["location"], first["location"]);
    assert_eq!(second["sha256"], first["sha256"]);

    let served = t.get(&location, None).await;
    assert_eq!(served.status, StatusCode::OK);

    let listing = t.get("/admin/media", Some(ADMIN_AUTH)).await;
    assert!(listing.body.contains(&location));

    let reply = t
        .post_form(
            "/admin/media/delete",
            Some(ADMIN_AUTH),
            &[("csrf_token", &token), ("path", &location)],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(t.get(&location, None).await.status, StatusCode::NOT_FOUND);
    assert!(t.cms.media.recent().unwrap().is_empty());
}

/// Test that uploads are checked for type, size and CSRF token
#[tokio::test]
async fn test_media_upload_rejections() {
    let admin = AdminCredentials::new("admin", Some(admin_hash())).unwrap();
    let mut t = TestApp::with_admin(admin, 1024);
    let token = t.token().await;

    let reply = t.upload(&token, "notes.txt", b"just text").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], "UNSUPPORTED_MEDIA_TYPE");

    let mut big = PNG.to_vec();
    big.resize(4096, 0);
    let reply = t.upload(&token, "big.png", &big).await;
    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);

    let reply = t.upload("forged", "ok.png", PNG).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    assert!(t.cms.media.recent().unwrap().is_empty());
}

/// Test deleting a single block through `/del_page/:id`
#[tokio::test]
async fn test_del_page_returns_deleted_id() {
    let mut t = TestApp::titled();
    let id = t.add_block("about", 0, "bye");
    let token = t.token().await;

    let reply = t
        .post_form(
            &format!("/del_page/{id}"),
            Some(ADMIN_AUTH),
            &[("csrf_token", &token)],
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), serde_json::json!({ "deleted_id": id }));
    assert!(t.cms.pages.pages_list().unwrap().is_empty());
}

/// Test editing, deleting blocks and whole pages from the editor
#[tokio::test]
async fn test_edit_page_flow() {
    let mut t = TestApp::titled();
    let keep = t.add_block("docs", 0, "intro");
    let drop_id = t.add_block("docs", 1, "obsolete");
    let token = t.token().await;

    let editor = t.get("/edit_page/docs", Some(ADMIN_AUTH)).await;
    assert_eq!(editor.status, StatusCode::OK);
    assert!(editor.body.contains("obsolete"));

    let reply = t
        .post_form(
            &format!("/edit_page/docs/block/{keep}"),
            Some(ADMIN_AUTH),
            &[("csrf_token", &token), ("position", "5"), ("content", "new intro")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/edit_page/docs");

    let reply = t
        .post_form(
            &format!("/edit_page/docs/block/{drop_id}/delete"),
            Some(ADMIN_AUTH),
            &[("csrf_token", &token)],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);

    let blocks = t.cms.pages.blocks_for_page("docs", "en").unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].position, 5);
    assert_eq!(blocks[0].content, "new intro");

    // A block id from another page is not reachable through this page's URL
    let other = t.add_block("news", 0, "headline");
    let reply = t
        .post_form(
            &format!("/edit_page/docs/block/{other}/delete"),
            Some(ADMIN_AUTH),
            &[("csrf_token", &token)],
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = t
        .post_form("/edit_page/docs/delete", Some(ADMIN_AUTH), &[("csrf_token", &token)])
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(t.cms.pages.pages_list().unwrap(), vec!["news".to_string()]);
}

/// Test that the CSRF token lives in an expiring session record
#[tokio::test]
async fn test_csrf_token_stored_in_expiring_session() {
    let mut t = TestApp::titled();
    let token = t.get("/", None).await.csrf_token();

    let cookie = t.cookie.clone().unwrap();
    let id = Id::from_str(cookie.trim_start_matches("qbrack-session=")).unwrap();
    let record = t.sessions.load(&id).await.unwrap().unwrap();
    assert_eq!(record.data["csrf_token"], token);

    let idle = record.expiry_date - tower_sessions::cookie::time::OffsetDateTime::now_utc();
    assert!(idle.whole_minutes() > 110 && idle.whole_minutes() <= 120);

    // Further views with the cookie reuse the same record
    assert_eq!(t.get("/", None).await.csrf_token(), token);
    assert_eq!(t.sessions.len(), 1);
}

/// Test the media page markup: plain title, one upload script
#[tokio::test]
async fn test_media_page_markup() {
    let mut t = TestApp::titled();
    let page = t.get("/admin/media", Some(ADMIN_AUTH)).await;
    assert_eq!(page.status, StatusCode::OK);

    let title_start = page.body.find("<title>").unwrap();
    let title_end = page.body.find("</title>").unwrap();
    assert_eq!(&page.body[title_start..title_end], "<title>Media");
    assert_eq!(page.body.matches("<script>").count(), 1);
    assert!(page.body.contains(r#"id="upload-form""#));
}

/// Test that pages only reference assets the server provides
#[tokio::test]
async fn test_pages_reference_no_missing_stylesheet() {
    let mut t = TestApp::titled();
    let home = t.get("/", None).await;
    assert!(!home.body.contains("style.css"));
    assert!(home.body.contains("<style>"));
}
