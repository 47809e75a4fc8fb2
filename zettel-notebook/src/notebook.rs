//! The notebook and notebook store collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use zettel_config::NotebookConfig;

use crate::error::{NotebookError, Result};
use crate::format::LinkFormatter;
use crate::note::{Collection, CollectionKind, IndexStats, MinimalNote, NewNoteOptions, Note, NoteFilter};
use crate::paths::{normalize, to_slash};

/// A directory of notes with its index.
///
/// Implementations are shared between concurrent requests and synchronize
/// internally.
pub trait Notebook: Send + Sync {
    /// Absolute path of the notebook root.
    fn root(&self) -> &Path;

    fn config(&self) -> &NotebookConfig;

    /// Bring the index up to date with the file system. `force` re-indexes
    /// unchanged files too.
    fn index(&self, force: bool) -> Result<IndexStats>;

    fn find_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>>;

    fn find_minimal_notes(&self, filter: &NoteFilter) -> Result<Vec<MinimalNote>> {
        Ok(self
            .find_notes(filter)?
            .iter()
            .map(Note::as_minimal)
            .collect())
    }

    fn find_note(&self, filter: &NoteFilter) -> Result<Option<Note>> {
        Ok(self
            .find_notes(&filter.clone().with_limit(1))?
            .into_iter()
            .next())
    }

    /// Look a note up by a notebook-relative href. A partial lookup matches
    /// any note whose path contains `href`.
    fn find_by_href(&self, href: &str, partial: bool) -> Result<Option<MinimalNote>>;

    /// Best match of a search query such as `title:(some words)`.
    fn find_matching(&self, query: &str) -> Result<Option<MinimalNote>>;

    fn find_collections(&self, kind: CollectionKind, filter: &NoteFilter)
        -> Result<Vec<Collection>>;

    /// Create a note and return its absolute path. Fails with
    /// [`NotebookError::NoteExists`] when the generated file already exists.
    fn new_note(&self, options: NewNoteOptions) -> Result<PathBuf>;

    /// The link formatter configured for this notebook.
    fn new_link_formatter(&self) -> LinkFormatter {
        LinkFormatter::from_config(&self.config().format.markdown)
    }

    /// `path` spelled under [`Notebook::root`]. A notebook reachable through
    /// several spellings, such as a symlinked directory, maps the other ones
    /// here. Paths are only normalized by default.
    fn canonical_path(&self, path: &Path) -> PathBuf {
        normalize(path)
    }

    /// `path` relative to the notebook root, `/`-separated.
    fn rel_path(&self, path: &Path) -> Result<String> {
        let absolute = self.canonical_path(&self.root().join(path));
        absolute
            .strip_prefix(self.root())
            .map(to_slash)
            .map_err(|_| NotebookError::InvalidPath(path.display().to_string()))
    }
}

/// Opens the notebook owning a path.
pub trait NotebookStore: Send + Sync {
    /// The notebook containing `path`, which may be any file or directory
    /// inside the notebook.
    fn open(&self, path: &Path) -> Result<Arc<dyn Notebook>>;
}
