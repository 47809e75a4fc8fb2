//! In-memory notebook for tests of the layers above.
//!
//! Every query is counted so tests can assert on index traffic.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use zettel_config::{load_defaults, NotebookConfig};

use crate::error::{NotebookError, Result};
use crate::fs::slugify;
use crate::index::NoteIndex;
use crate::note::{
    Collection, CollectionKind, IndexStats, MinimalNote, NewNoteOptions, Note, NoteFilter,
};
use crate::notebook::{Notebook, NotebookStore};

#[derive(Default)]
struct Counters {
    find_notes: AtomicUsize,
    find_by_href: AtomicUsize,
    find_matching: AtomicUsize,
    find_collections: AtomicUsize,
    index: AtomicUsize,
}

pub struct MemoryNotebook {
    root: PathBuf,
    config: NotebookConfig,
    index: RwLock<NoteIndex>,
    counters: Counters,
}

impl MemoryNotebook {
    /// Empty notebook with the default configuration.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: load_defaults().expect("embedded defaults deserialize"),
            index: RwLock::new(NoteIndex::default()),
            counters: Counters::default(),
        }
    }

    pub fn with_config(mut self, config: NotebookConfig) -> Self {
        self.config = config;
        self
    }

    pub fn configure(mut self, update: impl FnOnce(&mut NotebookConfig)) -> Self {
        update(&mut self.config);
        self
    }

    /// Add a note at the notebook-relative `path`.
    pub fn with_note(self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: &str, content: &str) {
        let note = Note::parse(path, content, None, &self.config.format.markdown);
        self.index.write().insert(note);
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of index queries issued so far, of any kind.
    pub fn query_count(&self) -> usize {
        self.find_notes_count()
            + self.find_by_href_count()
            + self.find_matching_count()
            + self.find_collections_count()
    }

    pub fn find_notes_count(&self) -> usize {
        self.counters.find_notes.load(Ordering::SeqCst)
    }

    pub fn find_by_href_count(&self) -> usize {
        self.counters.find_by_href.load(Ordering::SeqCst)
    }

    pub fn find_matching_count(&self) -> usize {
        self.counters.find_matching.load(Ordering::SeqCst)
    }

    pub fn find_collections_count(&self) -> usize {
        self.counters.find_collections.load(Ordering::SeqCst)
    }

    pub fn index_count(&self) -> usize {
        self.counters.index.load(Ordering::SeqCst)
    }

    pub fn note_count(&self) -> usize {
        self.index.read().paths().len()
    }
}

impl Notebook for MemoryNotebook {
    fn root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &NotebookConfig {
        &self.config
    }

    fn index(&self, _force: bool) -> Result<IndexStats> {
        self.counters.index.fetch_add(1, Ordering::SeqCst);
        let count = self.note_count();
        Ok(IndexStats {
            source_count: count,
            unchanged_count: count,
            ..IndexStats::default()
        })
    }

    fn find_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        self.counters.find_notes.fetch_add(1, Ordering::SeqCst);
        Ok(self.index.read().find_notes(filter))
    }

    fn find_by_href(&self, href: &str, partial: bool) -> Result<Option<MinimalNote>> {
        self.counters.find_by_href.fetch_add(1, Ordering::SeqCst);
        Ok(self.index.read().find_by_href(href, partial))
    }

    fn find_matching(&self, query: &str) -> Result<Option<MinimalNote>> {
        self.counters.find_matching.fetch_add(1, Ordering::SeqCst);
        Ok(self.index.read().find_matching(query))
    }

    fn find_collections(
        &self,
        kind: CollectionKind,
        filter: &NoteFilter,
    ) -> Result<Vec<Collection>> {
        self.counters.find_collections.fetch_add(1, Ordering::SeqCst);
        Ok(self.index.read().find_collections(kind, filter))
    }

    /// Notes are named after the slug of their title and only live in the index.
    fn new_note(&self, options: NewNoteOptions) -> Result<PathBuf> {
        let title = options
            .title
            .clone()
            .unwrap_or_else(|| self.config.note.default_title.clone());
        let dir = options.directory.as_deref().unwrap_or("").trim_matches('/');
        let filename = format!("{}.{}", slugify(&title), self.config.note.extension);
        let path = if dir.is_empty() {
            filename
        } else {
            format!("{dir}/{filename}")
        };
        if self.index.read().get(&path).is_some() {
            return Err(NotebookError::NoteExists { name: path });
        }
        self.insert(&path, &format!("# {title}\n\n{}", options.content));
        Ok(self.root.join(path))
    }
}

/// Store handing out one shared [`MemoryNotebook`] for every path under its root.
pub struct MemoryNotebookStore {
    notebook: Arc<MemoryNotebook>,
}

impl MemoryNotebookStore {
    pub fn new(notebook: Arc<MemoryNotebook>) -> Self {
        Self { notebook }
    }

    pub fn notebook(&self) -> &Arc<MemoryNotebook> {
        &self.notebook
    }
}

impl NotebookStore for MemoryNotebookStore {
    fn open(&self, path: &Path) -> Result<Arc<dyn Notebook>> {
        if path.starts_with(self.notebook.root()) {
            Ok(self.notebook.clone())
        } else {
            Err(NotebookError::NotFound(path.to_path_buf()))
        }
    }
}
