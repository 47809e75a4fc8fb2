//! Language Server Protocol implementation for zettel notebooks
//!
//!     This crate wires the analysis of `zettel-analysis` to editors through tower-lsp. It owns
//!     everything stateful about a session: the open documents, the per-document diagnostics
//!     cycles, the capabilities the client announced, and the channel carrying messages the
//!     server sends on its own initiative.
//!
//! Feature Set
//!
//!     1. Diagnostics (textDocument/publishDiagnostics):
//!         - dead links, at the configured `lsp.diagnostics.dead_link` level
//!         - wiki links without a title, reported with the title of their target
//!         - refreshed on open, and after a debounce on change
//!
//!     2. Completion (textDocument/completion, completionItem/resolve):
//!         - links to notes after `[[` and `]((`
//!         - tags after `#` and `:`, when enabled in the notebook
//!         - resolved items carry the target note as Markdown documentation
//!
//!     3. Navigation (hover, definition, references, documentLink)
//!
//!     4. Code actions: new note from the selection, linked back in place of it
//!
//!     5. Commands (workspace/executeCommand):
//!         - `zettel.index`: reindex a notebook
//!         - `zettel.new`: create a note, or find the one that already exists
//!
//! Concurrency
//!
//!     Documents live behind a tokio `RwLock`; change notifications take the write lock before
//!     anything else so edits apply in receipt order. Diagnostics cycles run on spawned tasks,
//!     at most one per document (see [`diagnostics::RefreshTracker`]). Every notification and
//!     request the server initiates goes through [`outbox::Outbox`] to a single forwarding task,
//!     which keeps client replies from delaying diagnostics.
//!
//! Usage
//!
//!     The `zettel-lsp` binary speaks LSP over stdio. Logs go to stderr, or to `--log-file`,
//!     filtered by the `ZETTEL_LOG` environment variable.

pub mod diagnostics;
pub mod features;
pub mod outbox;
pub mod server;
pub mod session;

pub use server::{ServerOptions, ZettelLanguageServer};
