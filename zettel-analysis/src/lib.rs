//! Editor-facing analysis of notes, independent of the LSP transport.
//!
//! Everything here works on an [`OpenDocument`] and a
//! [`Notebook`](zettel_notebook::Notebook) and returns `lsp-types` values, so
//! the server layer only routes requests and owns concurrency.
//!
//!     document     open documents, incremental edits, positional queries
//!     resolver     link to note resolution
//!     diagnostics  dead links and missing titles
//!     completion   link and tag completion
//!     navigation   hover, definition, references, document links

pub mod completion;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod navigation;
pub mod resolver;

pub use document::{DocumentError, DocumentStore, LinkReference, OpenDocument};
pub use error::{AnalysisError, Result};
pub use resolver::{resolve, ResolvedTarget};
