//! Parsing of note files: YAML front matter, title, tags and outgoing links.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use zettel_config::MarkdownConfig;

use crate::links::{code_ranges, extract_links};

static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#((?:[\p{L}\p{N}_\-/]|\\ )+)").unwrap());

static MULTIWORD_HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#([^#\s\\][^#\n]*?[^#\s\\])#").unwrap());

static COLON_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s):((?:[\p{L}\p{N}_\-/]+:)+)").unwrap());

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*#*[ \t]*$").unwrap());

/// Parsed representation of a note file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedContent {
    pub title: String,
    pub body: String,
    pub metadata: Map<String, Value>,
    pub tags: Vec<String>,
    pub link_hrefs: Vec<String>,
}

/// Parse a note. `fallback_title` is used when neither the front matter nor a
/// level-one heading provides a title.
pub fn parse_content(raw: &str, fallback_title: &str, config: &MarkdownConfig) -> ParsedContent {
    let (metadata, body) = split_front_matter(raw);

    let title = metadata
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            HEADING
                .captures(body)
                .and_then(|captures| captures.get(1))
                .map(|m| m.as_str().to_string())
        })
        .unwrap_or_else(|| fallback_title.to_string());

    let mut tags = Vec::new();
    for key in ["tags", "keywords"] {
        match metadata.get(key) {
            Some(Value::Array(values)) => {
                for value in values {
                    if let Some(tag) = value.as_str() {
                        push_unique(&mut tags, tag.trim());
                    }
                }
            }
            Some(Value::String(value)) => {
                for tag in value.split([',', ' ']) {
                    push_unique(&mut tags, tag.trim());
                }
            }
            _ => {}
        }
    }
    for tag in extract_tags(body, config) {
        push_unique(&mut tags, &tag);
    }

    let link_hrefs = extract_links(body)
        .into_iter()
        .map(|link| link.href)
        .collect();

    ParsedContent {
        title,
        body: body.to_string(),
        metadata,
        tags,
        link_hrefs,
    }
}

/// Inline tags of `text` allowed by `config`, outside code.
pub fn extract_tags(text: &str, config: &MarkdownConfig) -> Vec<String> {
    let excluded = code_ranges(text);
    let in_code = |start: usize| excluded.iter().any(|code| code.contains(&start));
    let mut tags = Vec::new();

    if config.hashtags {
        let mut multiword_spans = Vec::new();
        if config.multiword_tags {
            for captures in MULTIWORD_HASHTAG.captures_iter(text) {
                let Some(name) = captures.get(1) else {
                    continue;
                };
                if in_code(name.start()) {
                    continue;
                }
                multiword_spans.push(name.start()..name.end() + 1);
                push_unique(&mut tags, name.as_str());
            }
        }
        for captures in HASHTAG.captures_iter(text) {
            let Some(name) = captures.get(1) else {
                continue;
            };
            if in_code(name.start())
                || multiword_spans
                    .iter()
                    .any(|span| span.contains(&name.start()))
            {
                continue;
            }
            let tag = name.as_str().replace("\\ ", " ");
            if tag.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            push_unique(&mut tags, &tag);
        }
    }

    if config.colon_tags {
        for captures in COLON_TAGS.captures_iter(text) {
            let Some(group) = captures.get(1) else {
                continue;
            };
            if in_code(group.start()) {
                continue;
            }
            for tag in group.as_str().split(':') {
                push_unique(&mut tags, tag);
            }
        }
    }

    tags
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tag.is_empty() && !tags.iter().any(|existing| existing == tag) {
        tags.push(tag.to_string());
    }
}

/// Split `---` delimited YAML front matter from the body. Malformed front
/// matter is treated as part of the body.
fn split_front_matter(raw: &str) -> (Map<String, Value>, &str) {
    let Some(rest) = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))
    else {
        return (Map::new(), raw);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return match serde_yaml::from_str::<serde_yaml::Value>(yaml)
                .ok()
                .and_then(|value| serde_json::to_value(value).ok())
            {
                Some(Value::Object(map)) => (map, body),
                Some(Value::Null) => (Map::new(), body),
                _ => (Map::new(), raw),
            };
        }
        offset += line.len();
    }
    (Map::new(), raw)
}
