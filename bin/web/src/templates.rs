//! Askama templates for the qbrack web interface

use askama::Template;
use qbrack::{Block, Cms, Comment, MediaRecord};

/// Site header, navigation and footer, shared by every page
#[derive(Debug, Clone)]
pub struct Chrome {
    pub site_title: String,
    pub pages: Vec<String>,
    pub locale: String,
    pub version: String,
    pub creation_date: String,
    pub modification_date: String,
}

impl Chrome {
    pub fn load(cms: &Cms) -> qbrack::Result<Self> {
        let footer = cms.params.footer()?;
        Ok(Self {
            site_title: cms.params.title()?.unwrap_or_default(),
            pages: cms.pages.pages_list()?,
            locale: cms.locale().to_string(),
            version: footer.version.unwrap_or_default(),
            creation_date: footer.creation_date.unwrap_or_default(),
            modification_date: footer.modification_date.unwrap_or_default(),
        })
    }
}

/// A rendered page with the comment section
#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub chrome: Chrome,
    pub page: String,
    /// Rendered block HTML, inserted unescaped
    pub body_html: String,
    pub missing: bool,
    pub comments: Vec<Comment>,
    pub flash: Option<String>,
    pub csrf_token: String,
}

/// Values echoed back into the add-block form
#[derive(Debug, Clone, Default)]
pub struct BlockFormValues {
    pub page: String,
    pub position: String,
    pub page_order: String,
    pub content: String,
}

/// First-run title form, then the add-block form
#[derive(Template)]
#[template(path = "add_page.html")]
pub struct AddPageTemplate {
    pub chrome: Chrome,
    pub untitled: bool,
    pub form: BlockFormValues,
    pub error: Option<String>,
    pub csrf_token: String,
}

/// Block editor for one page
#[derive(Template)]
#[template(path = "edit_page.html")]
pub struct EditPageTemplate {
    pub chrome: Chrome,
    pub page: String,
    pub blocks: Vec<Block>,
    pub error: Option<String>,
    pub csrf_token: String,
}

/// Upload form and recent uploads
#[derive(Template)]
#[template(path = "media.html")]
pub struct MediaTemplate {
    pub chrome: Chrome,
    pub media: Vec<MediaRecord>,
    pub max_upload_bytes: u64,
    pub csrf_token: String,
}
