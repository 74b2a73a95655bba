//! Post-processing for drafted blog posts.

use kuchiki::traits::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::canvas::escape_xml;

pub const SUMMARY_CHARS: usize = 200;
pub const INTERACTIVE_START: &str = "<!-- INTERACTIVE_CODE_START -->";
pub const INTERACTIVE_END: &str = "<!-- INTERACTIVE_CODE_END -->";

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][a-zA-Z0-9-]*(\s[^>]*)?/?>").expect("html tag regex"));
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("script block regex"));
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*\n(.*?)\n?```\s*$").expect("code fence regex")
});

/// What the SNS step picks up from the last drafted post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHandoff {
    pub title: String,
    pub summary: String,
    pub full_content: String,
}

impl PostHandoff {
    pub fn new(title: &str, html: &str) -> Self {
        Self {
            title: title.to_string(),
            summary: summarize(html),
            full_content: html.to_string(),
        }
    }
}

pub fn has_markup(text: &str) -> bool {
    HTML_TAG.is_match(text)
}

/// Normalizes a drafted reply into HTML. A reply wrapped in a single code
/// fence is unwrapped; a reply without any tags is treated as Markdown.
pub fn normalize_post_body(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|inner| inner.as_str().trim())
        .unwrap_or(trimmed);
    if has_markup(body) {
        body.to_string()
    } else {
        markdown_to_html(body)
    }
}

pub fn markdown_to_html(markdown: &str) -> String {
    use pulldown_cmark::{Options, Parser, html};

    let parser = Parser::new_ext(markdown, Options::all());
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

/// Visible text of an HTML fragment; script and style bodies are skipped.
pub fn plain_text(html: &str) -> String {
    let document = kuchiki::parse_html().one(html);
    let mut text = String::new();
    for node in document.descendants() {
        if is_inside_hidden_element(&node) {
            continue;
        }
        if let Some(value) = node.as_text() {
            text.push_str(&value.borrow());
        }
    }
    text
}

fn is_inside_hidden_element(node: &kuchiki::NodeRef) -> bool {
    node.ancestors().any(|ancestor| {
        ancestor
            .as_element()
            .map(|element| matches!(element.name.local.as_ref(), "script" | "style"))
            .unwrap_or(false)
    })
}

pub fn summarize(html: &str) -> String {
    let text = plain_text(html);
    let head = text.trim().chars().take(SUMMARY_CHARS).collect::<String>();
    format!("{}...", head)
}

/// Collects every `<script>` block, wrapped in marker comments.
pub fn extract_interactive_code(html: &str) -> Option<String> {
    let scripts = SCRIPT_BLOCK
        .find_iter(html)
        .map(|found| found.as_str())
        .collect::<Vec<_>>();
    if scripts.is_empty() {
        return None;
    }
    Some(format!(
        "{}\n{}\n{}",
        INTERACTIVE_START,
        scripts.join("\n\n"),
        INTERACTIVE_END
    ))
}

pub fn prepend_main_image(html: &str, data_uri: &str, alt: &str) -> String {
    format!(
        "<div class=\"main-image\"><img src=\"{}\" alt=\"{}\"></div>\n{}",
        escape_xml(data_uri),
        escape_xml(alt),
        html
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_reply_becomes_html() {
        let html = normalize_post_body("# 캠핑\n\n첫 **캠핑** 준비");
        assert!(html.contains("<h1>캠핑</h1>"));
        assert!(html.contains("<strong>캠핑</strong>"));
    }

    #[test]
    fn html_reply_is_kept() {
        let raw = "  <article><p>hi</p></article>\n";
        assert_eq!(normalize_post_body(raw), "<article><p>hi</p></article>");
    }

    #[test]
    fn fenced_html_is_unwrapped() {
        let raw = "```html\n<article><p>hi</p></article>\n```";
        assert_eq!(normalize_post_body(raw), "<article><p>hi</p></article>");
    }

    #[test]
    fn angle_brackets_alone_are_not_markup() {
        assert!(!has_markup("3 < 5 and 7 > 2"));
        assert!(has_markup("<br/>"));
        assert!(has_markup("<p class=\"x\">"));
    }

    #[test]
    fn summary_strips_tags_and_truncates() {
        let html = format!("<article><h1>제목</h1><p>{}</p></article>", "가".repeat(300));
        let summary = summarize(&html);
        assert!(summary.starts_with("제목가"));
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), SUMMARY_CHARS + 3);
    }

    #[test]
    fn short_post_summary_keeps_all_text() {
        assert_eq!(summarize("<p>짧은 글</p><script>var x = 1;</script>"), "짧은 글...");
    }

    #[test]
    fn scripts_are_collected_in_order() {
        let html = "<p>a</p><script>one()</script><div></div><SCRIPT src=\"x.js\"></SCRIPT>";
        let code = extract_interactive_code(html).unwrap();
        assert_eq!(
            code,
            "<!-- INTERACTIVE_CODE_START -->\n<script>one()</script>\n\n<SCRIPT src=\"x.js\"></SCRIPT>\n<!-- INTERACTIVE_CODE_END -->"
        );
        assert_eq!(extract_interactive_code("<p>none</p>"), None);
    }

    #[test]
    fn main_image_goes_first() {
        let html = prepend_main_image("<article></article>", "data:image/png;base64,AA", "A \"B\"");
        assert!(html.starts_with("<div class=\"main-image\"><img src=\"data:image/png;base64,AA\""));
        assert!(html.contains("alt=\"A &quot;B&quot;\""));
        assert!(html.ends_with("\n<article></article>"));
    }
}
