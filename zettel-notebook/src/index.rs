//! In-memory note index and the queries the language server issues against it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::links::is_url;
use crate::note::{Collection, CollectionKind, MinimalNote, Note, NoteFilter};
use crate::paths::{normalize, strip_anchor, strip_extension, to_slash};

static TITLE_QUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^title:\((.*)\)$").unwrap());

/// Query matching notes whose title contains every term of `terms`.
pub fn title_query(terms: &str) -> String {
    format!("title:({terms})")
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NoteIndex {
    notes: BTreeMap<String, Note>,
}

impl NoteIndex {
    pub fn insert(&mut self, note: Note) -> Option<Note> {
        self.notes.insert(note.path.clone(), note)
    }

    pub fn remove(&mut self, path: &str) -> Option<Note> {
        self.notes.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&Note> {
        self.notes.get(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.notes.keys().cloned().collect()
    }

    pub fn find_notes(&self, filter: &NoteFilter) -> Vec<Note> {
        let matches = self.notes.values().filter(|note| {
            (filter.include_paths.is_empty()
                || filter
                    .include_paths
                    .iter()
                    .any(|path| matches_path(note, path)))
                && (filter.link_to.is_empty()
                    || filter.link_to.iter().any(|target| links_to(note, target)))
        });
        match filter.limit {
            Some(limit) => matches.take(limit).cloned().collect(),
            None => matches.cloned().collect(),
        }
    }

    /// Exact lookups match the path with or without extension. Partial lookups
    /// match any path containing `href`, shortest path first.
    pub fn find_by_href(&self, href: &str, partial: bool) -> Option<MinimalNote> {
        let href = strip_anchor(href).trim();
        let href = href.strip_prefix("./").unwrap_or(href);
        if href.is_empty() {
            return None;
        }
        if !partial {
            return self
                .notes
                .values()
                .find(|note| matches_path(note, href))
                .map(Note::as_minimal);
        }
        self.notes
            .values()
            .filter(|note| note.path.contains(href))
            .min_by_key(|note| note.path.len())
            .map(Note::as_minimal)
    }

    /// Supports `title:(terms)` and bare terms. Every term must appear in the
    /// title, case-insensitively. Shorter titles rank first.
    pub fn find_matching(&self, query: &str) -> Option<MinimalNote> {
        let terms = TITLE_QUERY
            .captures(query.trim())
            .and_then(|captures| captures.get(1))
            .map_or(query, |m| m.as_str());
        let terms: Vec<String> = terms
            .split_whitespace()
            .map(|term| term.trim_matches('"').to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        if terms.is_empty() {
            return None;
        }
        self.notes
            .values()
            .filter(|note| {
                let title = note.title.to_lowercase();
                terms.iter().all(|term| title.contains(term.as_str()))
            })
            .min_by_key(|note| note.title.len())
            .map(Note::as_minimal)
    }

    pub fn find_collections(&self, kind: CollectionKind, filter: &NoteFilter) -> Vec<Collection> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let notes = self.find_notes(&NoteFilter {
            limit: None,
            ..filter.clone()
        });
        for note in &notes {
            for tag in &note.tags {
                *counts.entry(tag.as_str()).or_default() += 1;
            }
        }
        let mut collections: Vec<Collection> = counts
            .into_iter()
            .map(|(name, note_count)| Collection {
                kind,
                name: name.to_string(),
                note_count,
            })
            .collect();
        collections.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(limit) = filter.limit {
            collections.truncate(limit);
        }
        collections
    }
}

fn matches_path(note: &Note, path: &str) -> bool {
    note.path == path || strip_extension(&note.path) == path
}

/// Whether one of the links of `note` points at the notebook-relative `target`.
/// Hrefs are tried relative to the note's directory, then to the notebook root.
fn links_to(note: &Note, target: &str) -> bool {
    let target_stem = strip_extension(target);
    let dir = Path::new(&note.path).parent().unwrap_or(Path::new(""));
    note.link_hrefs.iter().any(|href| {
        if is_url(href) {
            return false;
        }
        let href = strip_anchor(href).trim();
        if href.is_empty() {
            return false;
        }
        [dir.join(href), Path::new(href).to_path_buf()]
            .iter()
            .map(|candidate| to_slash(&normalize(candidate)))
            .any(|candidate| candidate == target || candidate == target_stem)
    })
}
