//! Resolution of links to the notes they target.
//!
//! Strategies are tried in order and the first hit wins:
//!
//!     1. the href as a path relative to the linking document
//!     2. wiki links only: any note whose path contains the href
//!     3. wiki links only: a note whose title contains every word of the href
//!
//! URLs never resolve. Index failures are logged and count as misses.

use lsp_types::Url;
use std::path::{Path, PathBuf};
use zettel_notebook::paths::{normalize, to_slash};
use zettel_notebook::{is_url, title_query, MinimalNote, Notebook};

use crate::document::{LinkReference, OpenDocument};
use crate::error::{AnalysisError, Result};

/// The note a link points at.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub note: MinimalNote,
    /// Absolute path of the note.
    pub path: PathBuf,
    pub uri: Url,
}

pub fn resolve(
    link: &LinkReference,
    document: &OpenDocument,
    notebook: &dyn Notebook,
) -> Result<Option<ResolvedTarget>> {
    if is_url(&link.href) {
        return Ok(None);
    }

    let mut note = by_relative_path(&link.href, document, notebook);
    if note.is_none() && link.is_wiki {
        note = logged(
            "find_by_href",
            &link.href,
            notebook.find_by_href(&link.href, true),
        );
        if note.is_none() && !link.href.trim().is_empty() {
            note = logged(
                "find_matching",
                &link.href,
                notebook.find_matching(&title_query(&link.href)),
            );
        }
    }

    note.map(|note| target_of(note, notebook.root())).transpose()
}

/// Build the target of a note known to the notebook rooted at `root`.
pub fn target_of(note: MinimalNote, root: &Path) -> Result<ResolvedTarget> {
    let path = root.join(&note.path);
    let uri = path_to_uri(&path)?;
    Ok(ResolvedTarget { note, path, uri })
}

/// File URI of an absolute path.
pub fn path_to_uri(path: &Path) -> Result<Url> {
    Url::from_file_path(path).map_err(|_| AnalysisError::InvalidUri(path.to_path_buf()))
}

/// Directory of `document`, spelled the way `notebook` spells its root.
pub fn document_dir(document: &OpenDocument, notebook: &dyn Notebook) -> PathBuf {
    let dir = document.path.parent().unwrap_or(Path::new(""));
    notebook.canonical_path(dir)
}

fn by_relative_path(
    href: &str,
    document: &OpenDocument,
    notebook: &dyn Notebook,
) -> Option<MinimalNote> {
    let absolute = normalize(&document_dir(document, notebook).join(href));
    let relative = pathdiff::diff_paths(&absolute, notebook.root())?;
    logged(
        "find_by_href",
        href,
        notebook.find_by_href(&to_slash(&relative), false),
    )
}

fn logged(
    query: &str,
    href: &str,
    result: zettel_notebook::Result<Option<MinimalNote>>,
) -> Option<MinimalNote> {
    result.unwrap_or_else(|err| {
        tracing::warn!(query, href, error = %err, "link lookup failed");
        None
    })
}
