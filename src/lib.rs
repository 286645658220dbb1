//! # qbrack - a small block-based CMS
//!
//! Pages are composed from ordered content blocks stored in SQLite. Visitors
//! can leave comments, the site keeps a handful of key/value parameters
//! (title, version, creation and modification dates) for its header and
//! footer, and an administrator can upload images that are stored once per
//! distinct content.
//!
//! ## Layout
//!
//! - [`storage`]: the SQLite handle and schema bootstrap
//! - [`pages`]: blocks, page composition and Markdown rendering
//! - [`comments`]: visitor comments and their acceptance rules
//! - [`site`]: site parameters and footer data
//! - [`media`]: content-addressed image uploads
//! - [`auth`]: the single admin credential
//! - [`cli`]: the `qbrack` admin command
//!
//! The web front end lives in the `qbrack-web` workspace member.
//!
//! ## Example
//!
//! ```rust,no_run
//! use qbrack::{Cms, NewBlock};
//! # fn main() -> qbrack::Result<()> {
//! let cms = Cms::in_memory("static")?;
//! cms.params.set_title("My Site")?;
//! cms.pages.add_block(&NewBlock {
//!     page: "home".into(),
//!     locale: cms.locale().into(),
//!     position: 0,
//!     page_order: 0,
//!     content: "# Welcome".into(),
//! })?;
//! let html = qbrack::pages::markup::render_page(&cms.pages.page_contents("home", cms.locale())?);
//! assert!(html.contains("<h1>Welcome</h1>"));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod cms;
pub mod comments;
pub mod config;
pub mod error;
pub mod media;
pub mod pages;
pub mod site;
pub mod storage;
pub mod validation;

pub use auth::{AdminCredentials, Password};
pub use cms::Cms;
pub use comments::Comment;
pub use config::CmsConfig;
pub use error::{QbrackError, Result};
pub use media::{MediaLibrary, MediaRecord, StoredMedia};
pub use pages::{Block, DeletedBlock, NewBlock, HOME_PAGE};
pub use site::FooterData;

/// Library version, stored as the `version` site parameter.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
