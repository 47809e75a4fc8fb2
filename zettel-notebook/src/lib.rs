//! Notebooks of interlinked Markdown notes.
//!
//! This crate is the collaborator the language server queries: it locates a
//! notebook from any path inside it, keeps an index of its notes, answers the
//! lookups used for link resolution and completion, and creates new notes.
//!
//! - [`Notebook`] / [`NotebookStore`]: the query and creation surface.
//! - [`FsNotebook`] / [`FsNotebookStore`]: the file-system implementation.
//! - [`extract_links`], [`extract_tags`]: the link and tag syntaxes.
//! - [`LinkFormatter`]: how links to notes are written.
//! - [`Template`], [`parse_natural_date`]: helpers of note creation.
//!
//! The `test-support` feature adds an in-memory notebook counting its queries.

pub mod content;
pub mod date;
pub mod error;
pub mod format;
pub mod fs;
mod index;
pub mod links;
pub mod note;
pub mod notebook;
pub mod paths;
pub mod template;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use content::{extract_tags, parse_content, ParsedContent};
pub use date::{parse_natural_date, DateError};
pub use error::{NotebookError, Result};
pub use format::{LinkFormatter, LinkFormatterContext};
pub use fs::{FsNotebook, FsNotebookStore};
pub use index::title_query;
pub use links::{extract_links, is_url, ExtractedLink};
pub use note::{
    pluralize, Collection, CollectionKind, IndexStats, MinimalNote, NewNoteOptions, Note,
    NoteFilter,
};
pub use notebook::{Notebook, NotebookStore};
pub use template::{Template, TemplateError};
pub use zettel_config as config;
