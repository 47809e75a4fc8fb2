//! File-system backed notebooks.
//!
//! A notebook is a directory holding a `.zettel/` folder. Notes are the files
//! with the configured extension below it; dot-directories and git-ignored
//! files are skipped. The index lives in memory and is refreshed by
//! [`Notebook::index`], comparing modification times.

use chrono::NaiveDateTime;
use ignore::WalkBuilder;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use zettel_config::{Loader, NotebookConfig, NOTEBOOK_DIR};

use crate::error::{NotebookError, Result};
use crate::index::NoteIndex;
use crate::note::{
    Collection, CollectionKind, IndexStats, MinimalNote, NewNoteOptions, Note, NoteFilter,
};
use crate::notebook::{Notebook, NotebookStore};
use crate::paths::{normalize, to_slash};
use crate::template::Template;

const TEMPLATES_DIR: &str = "templates";

pub struct FsNotebook {
    root: PathBuf,
    config: NotebookConfig,
    index: RwLock<NoteIndex>,
}

impl FsNotebook {
    /// Open the notebook rooted at `root`, loading its configuration and
    /// building the index.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let root = fs::canonicalize(&root).map_err(|err| NotebookError::io(&root, err))?;
        let config = Loader::for_notebook(&root).build()?;
        let notebook = Self {
            root,
            config,
            index: RwLock::new(NoteIndex::default()),
        };
        let stats = notebook.index(false)?;
        tracing::info!(
            root = %notebook.root.display(),
            notes = stats.source_count,
            "opened notebook"
        );
        Ok(notebook)
    }

    fn note_files(&self) -> Vec<PathBuf> {
        let extension = self.config.note.extension.as_str();
        WalkBuilder::new(&self.root)
            .hidden(true)
            .require_git(false)
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.to_string_lossy() == extension)
            })
            .collect()
    }

    fn load_template(&self, name: &str) -> Result<Template> {
        let path = self.root.join(NOTEBOOK_DIR).join(TEMPLATES_DIR).join(name);
        let source = fs::read_to_string(&path).map_err(|err| NotebookError::io(&path, err))?;
        Ok(Template::parse(&source)?)
    }

    fn note_directory(&self, directory: Option<&str>) -> Result<PathBuf> {
        let dir = match directory {
            Some(dir) if !dir.trim().is_empty() => normalize(&self.root.join(dir)),
            _ => self.root.clone(),
        };
        if !dir.starts_with(&self.root) {
            return Err(NotebookError::InvalidPath(dir.display().to_string()));
        }
        Ok(dir)
    }
}

/// Canonical form of the longest existing ancestor of `path`, with the rest
/// of `path` appended. `path` itself when no ancestor resolves.
fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut tail = Vec::new();
    let mut current = path;
    loop {
        if let Ok(canonical) = fs::canonicalize(current) {
            return tail
                .iter()
                .rev()
                .fold(canonical, |resolved, part| resolved.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Variables available to file name and body templates of new notes.
#[derive(Debug, Serialize)]
struct NewNoteContext<'a> {
    title: &'a str,
    content: &'a str,
    slug: String,
    id: String,
    date: String,
    datetime: String,
    dir: String,
    extra: &'a HashMap<String, String>,
}

impl Notebook for FsNotebook {
    fn root(&self) -> &Path {
        &self.root
    }

    fn canonical_path(&self, path: &Path) -> PathBuf {
        let path = normalize(path);
        if path.starts_with(&self.root) {
            path
        } else {
            canonicalize_existing(&path)
        }
    }

    fn config(&self) -> &NotebookConfig {
        &self.config
    }

    fn index(&self, force: bool) -> Result<IndexStats> {
        let started = Instant::now();
        let mut stats = IndexStats::default();
        let markdown = &self.config.format.markdown;
        let mut index = self.index.write();
        let mut seen = HashSet::new();

        for file in self.note_files() {
            let Ok(relative) = file.strip_prefix(&self.root) else {
                continue;
            };
            let path = to_slash(relative);
            stats.source_count += 1;
            let modified = fs::metadata(&file).and_then(|meta| meta.modified()).ok();

            let existing = index.get(&path).map(|note| note.modified);
            if !force && existing.is_some() && existing == Some(modified) {
                stats.unchanged_count += 1;
                seen.insert(path);
                continue;
            }

            let raw = match fs::read_to_string(&file) {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(path = %file.display(), error = %err, "failed to read note");
                    continue;
                }
            };
            if existing.is_some() {
                stats.modified_count += 1;
            } else {
                stats.added_count += 1;
            }
            index.insert(Note::parse(path.clone(), raw, modified, markdown));
            seen.insert(path);
        }

        for path in index.paths() {
            if !seen.contains(&path) {
                index.remove(&path);
                stats.removed_count += 1;
            }
        }

        stats.duration = started.elapsed().as_millis() as u64;
        tracing::debug!(?stats, "indexed notebook");
        Ok(stats)
    }

    fn find_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        Ok(self.index.read().find_notes(filter))
    }

    fn find_by_href(&self, href: &str, partial: bool) -> Result<Option<MinimalNote>> {
        Ok(self.index.read().find_by_href(href, partial))
    }

    fn find_matching(&self, query: &str) -> Result<Option<MinimalNote>> {
        Ok(self.index.read().find_matching(query))
    }

    fn find_collections(
        &self,
        kind: CollectionKind,
        filter: &NoteFilter,
    ) -> Result<Vec<Collection>> {
        Ok(self.index.read().find_collections(kind, filter))
    }

    fn new_note(&self, options: NewNoteOptions) -> Result<PathBuf> {
        let dir = self.note_directory(options.directory.as_deref())?;
        let group = options
            .group
            .as_deref()
            .and_then(|name| self.config.group.get(name));

        let title = options
            .title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(&self.config.note.default_title);
        let context = NewNoteContext {
            title,
            content: &options.content,
            slug: slugify(title),
            id: note_id(options.date),
            date: options.date.format("%Y-%m-%d").to_string(),
            datetime: options.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            dir: dir
                .strip_prefix(&self.root)
                .map(to_slash)
                .unwrap_or_default(),
            extra: &options.extra,
        };

        let filename_template = group
            .and_then(|group| group.filename.as_deref())
            .unwrap_or(&self.config.note.filename);
        let mut stem = Template::parse(filename_template)?.render(&context)?;
        if stem.trim().is_empty() {
            stem = context.id.clone();
        }
        let path = dir.join(format!("{}.{}", stem.trim(), self.config.note.extension));
        let relative = self.rel_path(&path)?;
        if path.exists() {
            return Err(NotebookError::NoteExists { name: relative });
        }

        let template = options
            .template
            .as_deref()
            .or_else(|| group.and_then(|group| group.template.as_deref()))
            .or(self.config.note.template.as_deref());
        let body = match template {
            Some(name) => self.load_template(name)?.render(&context)?,
            None => default_body(title, &options.content),
        };

        fs::create_dir_all(&dir).map_err(|err| NotebookError::io(&dir, err))?;
        fs::write(&path, body).map_err(|err| NotebookError::io(&path, err))?;
        tracing::info!(path = %relative, "created note");

        self.index(false)?;
        Ok(path)
    }
}

fn default_body(title: &str, content: &str) -> String {
    if content.is_empty() {
        format!("# {title}\n")
    } else {
        format!("# {title}\n\n{content}\n")
    }
}

fn note_id(date: NaiveDateTime) -> String {
    date.format("%Y%m%d%H%M%S").to_string()
}

/// Lowercase, dash-separated rendition of a title usable as a file name.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Finds notebooks by walking up to the closest `.zettel/` directory, and keeps
/// them open for the lifetime of the store.
#[derive(Default)]
pub struct FsNotebookStore {
    notebooks: Mutex<HashMap<PathBuf, Arc<FsNotebook>>>,
}

impl FsNotebookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of the notebook containing `path`.
    pub fn locate(path: &Path) -> Result<PathBuf> {
        path.ancestors()
            .find(|dir| dir.join(NOTEBOOK_DIR).is_dir())
            .map(Path::to_path_buf)
            .ok_or_else(|| NotebookError::NotFound(path.to_path_buf()))
    }
}

impl NotebookStore for FsNotebookStore {
    fn open(&self, path: &Path) -> Result<Arc<dyn Notebook>> {
        let root = Self::locate(path)?;
        let mut notebooks = self.notebooks.lock();
        if let Some(notebook) = notebooks.get(&root) {
            return Ok(notebook.clone());
        }
        let notebook = Arc::new(FsNotebook::open(&root)?);
        notebooks.insert(root, notebook.clone());
        Ok(notebook)
    }
}
