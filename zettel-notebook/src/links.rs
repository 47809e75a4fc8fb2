//! Link extraction from note text.
//!
//! Two syntaxes are recognized:
//!
//!     Wiki links:      [[target]] or [[target|title]]
//!     Markdown links:  [title](target), [title](<target with spaces>)
//!
//! Image embeds (`![alt](src)`) and links inside code spans or fenced code
//! blocks are ignored. Spans are byte offsets into the source text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static WIKI_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]|\n]+?)(?:\|([^\[\]\n]*))?\]\]").unwrap());

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\[\]\n]*)\]\((?:<([^<>\n]+)>|([^()\s]+))(?:\s+"[^"\n]*")?\)"#).unwrap()
});

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());

static URL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9+.\-]+:|www\.)").unwrap());

/// A link found in a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Target as written by the user, percent-decoded for Markdown links.
    pub href: String,
    pub title: Option<String>,
    /// Byte span of the whole link, brackets included.
    pub span: Range<usize>,
    pub is_wiki: bool,
}

impl ExtractedLink {
    /// Whether the user wrote a title for the link.
    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|title| !title.is_empty())
    }
}

/// Detects hrefs pointing outside the notebook (`https://…`, `mailto:…`, `www.…`).
///
/// A single letter before the colon is not a scheme, so Windows drive paths are
/// not mistaken for URLs.
pub fn is_url(href: &str) -> bool {
    URL_PREFIX.is_match(href.trim())
}

/// Extract every link of `text`, in document order.
pub fn extract_links(text: &str) -> Vec<ExtractedLink> {
    let excluded = code_ranges(text);
    let is_excluded = |span: &Range<usize>| {
        excluded
            .iter()
            .any(|code| span.start < code.end && code.start < span.end)
    };

    let mut links = Vec::new();

    for captures in WIKI_LINK.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let span = whole.range();
        if is_excluded(&span) {
            continue;
        }
        let href = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if href.is_empty() {
            continue;
        }
        let title = captures.get(2).map(|m| m.as_str().trim().to_string());
        links.push(ExtractedLink {
            href,
            title,
            span,
            is_wiki: true,
        });
    }

    let wiki_spans: Vec<Range<usize>> = links.iter().map(|link| link.span.clone()).collect();

    for captures in MARKDOWN_LINK.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let span = whole.range();
        if is_excluded(&span) || text[..span.start].ends_with('!') {
            continue;
        }
        if wiki_spans
            .iter()
            .any(|wiki| span.start < wiki.end && wiki.start < span.end)
        {
            continue;
        }
        let raw_href = captures
            .get(2)
            .or_else(|| captures.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let href = match urlencoding::decode(raw_href) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw_href.to_string(),
        };
        let title = captures.get(1).map(|m| m.as_str().trim().to_string());
        links.push(ExtractedLink {
            href,
            title,
            span,
            is_wiki: false,
        });
    }

    links.sort_by_key(|link| link.span.start);
    links
}

/// Byte ranges covered by fenced code blocks and inline code spans.
pub(crate) fn code_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut fence_start: Option<usize> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            match fence_start.take() {
                Some(start) => ranges.push(start..offset + line.len()),
                None => fence_start = Some(offset),
            }
        }
        offset += line.len();
    }
    if let Some(start) = fence_start {
        ranges.push(start..text.len());
    }

    for code in CODE_SPAN.find_iter(text) {
        let span = code.range();
        if !ranges.iter().any(|fence| fence.start <= span.start && span.end <= fence.end) {
            ranges.push(span);
        }
    }
    ranges
}
