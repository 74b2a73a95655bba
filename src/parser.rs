//! Structured extraction from free-form model replies.
//!
//! Callers go through [`ResponseParser`]; the regex grammar below is one
//! implementation of it. Parsing never fails: anything that does not fit the
//! grammar degrades to plain text or empty sections.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("numbered line regex"));
static ACTIONABLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*(.+?)\s*-(.*)$").expect("actionable line regex"));
static THREADS_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\[Threads/X\](.*?)(?:\[Instagram\]|\z)").expect("threads section regex")
});
static INSTAGRAM_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\[Instagram\](.*?)(?:\[Facebook\]|\z)").expect("instagram section regex")
});
static FACEBOOK_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\[Facebook\](.*)\z").expect("facebook section regex"));
static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup tag regex"));
static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("break tag regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicItem {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum DisplayLine {
    /// Starts with `N.`.
    Item(String),
    Paragraph(String),
}

impl DisplayLine {
    pub fn text(&self) -> &str {
        match self {
            DisplayLine::Item(text) | DisplayLine::Paragraph(text) => text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicList {
    pub lines: Vec<DisplayLine>,
    pub actionable: Vec<TopicItem>,
}

impl TopicList {
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            DisplayLine::Item(text) => Some(text.as_str()),
            DisplayLine::Paragraph(_) => None,
        })
    }

    pub fn titles(&self) -> Vec<&str> {
        self.actionable
            .iter()
            .map(|item| item.title.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Threads,
    Instagram,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Threads, Platform::Instagram, Platform::Facebook];

    pub fn marker(&self) -> &'static str {
        match self {
            Platform::Threads => "[Threads/X]",
            Platform::Instagram => "[Instagram]",
            Platform::Facebook => "[Facebook]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Threads => "threads",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }
}

/// Always carries all three keys; a missing marker leaves its body empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformSections {
    pub threads: String,
    pub instagram: String,
    pub facebook: String,
}

impl PlatformSections {
    pub fn get(&self, platform: Platform) -> &str {
        match platform {
            Platform::Threads => &self.threads,
            Platform::Instagram => &self.instagram,
            Platform::Facebook => &self.facebook,
        }
    }

    pub fn is_empty(&self) -> bool {
        Platform::ALL
            .iter()
            .all(|platform| self.get(*platform).is_empty())
    }
}

pub trait ResponseParser: Send + Sync {
    fn parse_topics(&self, text: &str) -> TopicList;
    fn parse_platform_sections(&self, text: &str) -> PlatformSections;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegexResponseParser;

impl ResponseParser for RegexResponseParser {
    fn parse_topics(&self, text: &str) -> TopicList {
        let mut list = TopicList::default();
        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if !NUMBERED_LINE.is_match(line) {
                list.lines.push(DisplayLine::Paragraph(line.to_string()));
                continue;
            }
            list.lines.push(DisplayLine::Item(line.to_string()));
            if let Some(caps) = ACTIONABLE_LINE.captures(line) {
                let title = caps[1].trim();
                if !title.is_empty() {
                    list.actionable.push(TopicItem {
                        title: title.to_string(),
                        description: caps[2].trim().to_string(),
                    });
                }
            }
        }
        list
    }

    fn parse_platform_sections(&self, text: &str) -> PlatformSections {
        PlatformSections {
            threads: capture_section(&THREADS_SECTION, text),
            instagram: capture_section(&INSTAGRAM_SECTION, text),
            facebook: capture_section(&FACEBOOK_SECTION, text),
        }
    }
}

fn capture_section(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Splits a comma separated tag reply.
pub fn parse_tags(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn strip_markup(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").into_owned()
}

/// Newlines become `<br>` for display.
pub fn format_for_display(text: &str) -> String {
    text.replace('\n', "<br>")
}

/// Reverses [`format_for_display`] for copying to the clipboard.
pub fn display_to_plain(html: &str) -> String {
    let text = BREAK_TAG.replace_all(html, "\n");
    unescape_html(&text)
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
