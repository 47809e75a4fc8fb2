//! Note records and query options exchanged with a [`Notebook`](crate::Notebook).

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::SystemTime;
use zettel_config::MarkdownConfig;

use crate::content::parse_content;
use crate::paths::strip_extension;

/// The fields of a note needed to link to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinimalNote {
    /// Path relative to the notebook root, `/`-separated.
    pub path: String,
    pub title: String,
    /// Front matter of the note.
    pub metadata: Map<String, Value>,
}

impl MinimalNote {
    /// File name of the note, extension included.
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// File name of the note without its extension.
    pub fn filename_stem(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(idx) if idx > 0 => &filename[..idx],
            _ => filename,
        }
    }
}

/// A fully indexed note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub path: String,
    pub title: String,
    pub metadata: Map<String, Value>,
    /// Body without the front matter.
    pub body: String,
    /// Whole file content.
    pub raw_content: String,
    pub tags: Vec<String>,
    /// Targets of the links written in the note, as typed.
    pub link_hrefs: Vec<String>,
    pub modified: Option<SystemTime>,
}

impl Note {
    /// Build a note from the raw content of the file at the notebook-relative
    /// `path`. The file name stem is the title of last resort.
    pub fn parse(
        path: impl Into<String>,
        raw_content: impl Into<String>,
        modified: Option<SystemTime>,
        config: &MarkdownConfig,
    ) -> Self {
        let path = path.into();
        let raw_content = raw_content.into();
        let stem = strip_extension(path.rsplit('/').next().unwrap_or(&path)).to_string();
        let parsed = parse_content(&raw_content, &stem, config);
        Self {
            path,
            title: parsed.title,
            metadata: parsed.metadata,
            body: parsed.body,
            raw_content,
            tags: parsed.tags,
            link_hrefs: parsed.link_hrefs,
            modified,
        }
    }

    pub fn as_minimal(&self) -> MinimalNote {
        MinimalNote {
            path: self.path.clone(),
            title: self.title.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Tag,
}

/// A named group of notes, such as a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub kind: CollectionKind,
    pub name: String,
    pub note_count: usize,
}

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub source_count: usize,
    pub added_count: usize,
    pub modified_count: usize,
    pub unchanged_count: usize,
    pub removed_count: usize,
    /// Wall-clock duration in milliseconds.
    pub duration: u64,
}

/// Restricts the notes returned by a query. An empty filter matches every note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    /// Notebook-relative paths; a note matches its exact path or the path
    /// without extension.
    pub include_paths: Vec<String>,
    /// Only notes linking to one of these notebook-relative paths.
    pub link_to: Vec<String>,
    pub limit: Option<usize>,
}

impl NoteFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn include_path(path: impl Into<String>) -> Self {
        Self {
            include_paths: vec![path.into()],
            ..Self::default()
        }
    }

    pub fn linking_to(path: impl Into<String>) -> Self {
        Self {
            link_to: vec![path.into()],
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Parameters of note creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNoteOptions {
    pub title: Option<String>,
    pub content: String,
    /// Directory of the note, relative to the notebook root or absolute.
    pub directory: Option<String>,
    pub group: Option<String>,
    /// Name of a template under `.zettel/templates/`.
    pub template: Option<String>,
    /// Extra variables made available to the templates.
    pub extra: HashMap<String, String>,
    pub date: NaiveDateTime,
}

impl NewNoteOptions {
    pub fn new(date: NaiveDateTime) -> Self {
        Self {
            title: None,
            content: String::new(),
            directory: None,
            group: None,
            template: None,
            extra: HashMap::new(),
            date,
        }
    }
}

/// Returns "note" or "notes" depending on `count`.
pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
