//! Block body rendering.
//!
//! Block bodies are written by the administrator as Markdown, and raw HTML
//! inside them is passed through untouched. Visitor input never goes
//! through here.

use pulldown_cmark::{html, Options, Parser};

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    options
}

/// Renders one block body to HTML.
pub fn render_block(content: &str) -> String {
    let parser = Parser::new_ext(content, options());
    let mut out = String::with_capacity(content.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Renders a whole page: the concatenation of its blocks in order.
pub fn render_page(blocks: &[String]) -> String {
    blocks.iter().map(|b| render_block(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_is_rendered() {
        assert_eq!(render_block("# Hello"), "<h1>Hello</h1>\n");
        assert_eq!(
            render_block("some *emphasis*"),
            "<p>some <em>emphasis</em></p>\n"
        );
    }

    #[test]
    fn test_raw_html_passes_through() {
        let html = "<div class=\"hero\"><img src=\"/static/uploads/a.png\"></div>";
        assert!(render_block(html).contains("<img src=\"/static/uploads/a.png\">"));
    }

    #[test]
    fn test_page_concatenates_blocks_in_order() {
        let blocks = vec!["first".to_string(), "second".to_string()];
        assert_eq!(render_page(&blocks), "<p>first</p>\n<p>second</p>\n");
    }
}
