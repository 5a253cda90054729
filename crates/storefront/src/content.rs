//! Markdown rendering for blog articles.
//!
//! Article bodies are stored as markdown and rendered on read. Raw HTML in
//! the source is escaped, not passed through.

use comrak::{Options, markdown_to_html};

/// Average reading speed used for estimates.
const WORDS_PER_MINUTE: usize = 200;

/// Render GitHub-flavored markdown to HTML.
#[must_use]
pub fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.superscript = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    options.render.escape = true;

    markdown_to_html(content, &options)
}

/// Estimated reading time, at least one minute.
#[must_use]
pub fn reading_time_minutes(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_gfm() {
        let html = render_markdown("# Moon phases\n\n~~silver~~ gold\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1"));
        assert!(html.contains("Moon phases"));
        assert!(html.contains("<del>silver</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render_markdown("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(200)), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(201)), 2);
    }
}
