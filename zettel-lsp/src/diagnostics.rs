//! Asynchronous diagnostics refresh.
//!
//! Each document goes `Idle -> Refreshing -> Idle`. A refresh requested while
//! the document is `Refreshing` is dropped, not queued: the next open or change
//! starts a new cycle. A cycle returns the document to `Idle` before computing,
//! so an edit landing during the computation gets its own cycle.

use lsp_types::Url;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use zettel_analysis::diagnostics::compute_diagnostics;
use zettel_analysis::DocumentStore;
use zettel_notebook::Notebook;

use crate::outbox::Outbox;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Computed right away.
    Opened,
    /// Computed after the debounce delay.
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
}

/// Ticket of a running cycle. Only the cycle holding the current ticket of a
/// document can return it to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

/// Documents with a running cycle, each with the ticket of that cycle.
#[derive(Debug, Default)]
pub struct RefreshTracker {
    running: Mutex<HashMap<Url, RefreshTicket>>,
    issued: AtomicU64,
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `uri` to `Refreshing`. Returns `None` if it already was.
    pub fn try_begin(&self, uri: &Url) -> Option<RefreshTicket> {
        let mut running = self.running.lock();
        if running.contains_key(uri) {
            return None;
        }
        let ticket = RefreshTicket(self.issued.fetch_add(1, Ordering::Relaxed));
        running.insert(uri.clone(), ticket);
        Some(ticket)
    }

    /// Returns `uri` to `Idle`, unless a newer cycle took over since `ticket`
    /// was issued.
    pub fn finish(&self, uri: &Url, ticket: RefreshTicket) {
        let mut running = self.running.lock();
        if running.get(uri) == Some(&ticket) {
            running.remove(uri);
        }
    }

    pub fn state(&self, uri: &Url) -> RefreshState {
        if self.running.lock().contains_key(uri) {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    pub fn forget(&self, uri: &Url) {
        self.running.lock().remove(uri);
    }
}

pub struct DiagnosticsEngine {
    documents: Arc<RwLock<DocumentStore>>,
    tracker: Arc<RefreshTracker>,
    outbox: Outbox,
    debounce: Duration,
}

impl DiagnosticsEngine {
    pub fn new(documents: Arc<RwLock<DocumentStore>>, outbox: Outbox, debounce: Duration) -> Self {
        Self {
            documents,
            tracker: Arc::new(RefreshTracker::new()),
            outbox,
            debounce,
        }
    }

    pub fn tracker(&self) -> &RefreshTracker {
        &self.tracker
    }

    /// Schedule a refresh of `uri`. Returns the handle of the spawned cycle, or
    /// `None` when nothing was spawned: either every diagnostic is disabled and
    /// an empty set went out immediately, or a cycle is already running.
    pub fn refresh(
        &self,
        uri: Url,
        notebook: Arc<dyn Notebook>,
        trigger: RefreshTrigger,
    ) -> Option<JoinHandle<()>> {
        if notebook.config().lsp.diagnostics.is_disabled() {
            self.outbox.publish_diagnostics(uri, Vec::new());
            return None;
        }
        let Some(ticket) = self.tracker.try_begin(&uri) else {
            tracing::debug!(%uri, "diagnostics refresh already running");
            return None;
        };

        let documents = self.documents.clone();
        let tracker = self.tracker.clone();
        let outbox = self.outbox.clone();
        let delay = match trigger {
            RefreshTrigger::Opened => None,
            RefreshTrigger::Changed => Some(self.debounce),
        };
        Some(tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            tracker.finish(&uri, ticket);

            let Some(document) = documents.read().await.get(&uri).cloned() else {
                tracing::debug!(%uri, "document closed before diagnostics ran");
                return;
            };
            let diagnostics = compute_diagnostics(&document, notebook.as_ref());
            tracing::debug!(%uri, count = diagnostics.len(), "publishing diagnostics");
            outbox.publish_diagnostics(uri, diagnostics);
        }))
    }

    pub fn forget(&self, uri: &Url) {
        self.tracker.forget(uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::ClientMessage;
    use lsp_types::{Position, Range, TextDocumentContentChangeEvent};
    use tokio::sync::mpsc::UnboundedReceiver;
    use zettel_notebook::config::DiagnosticLevel;
    use zettel_notebook::test_support::MemoryNotebook;

    fn uri() -> Url {
        Url::parse("file:///nb/a.md").unwrap()
    }

    async fn setup(
        text: &str,
        notebook: MemoryNotebook,
    ) -> (
        DiagnosticsEngine,
        Arc<MemoryNotebook>,
        UnboundedReceiver<ClientMessage>,
    ) {
        let documents = Arc::new(RwLock::new(DocumentStore::new()));
        documents
            .write()
            .await
            .open(uri(), 1, text.to_string())
            .unwrap();
        let (outbox, receiver) = Outbox::channel();
        let engine = DiagnosticsEngine::new(documents, outbox, Duration::from_millis(50));
        (engine, notebook.into_arc(), receiver)
    }

    fn published(message: ClientMessage) -> Vec<String> {
        match message {
            ClientMessage::PublishDiagnostics { diagnostics, .. } => diagnostics
                .into_iter()
                .map(|diagnostic| diagnostic.message)
                .collect(),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn tracker_guards_reentrancy() {
        let tracker = RefreshTracker::new();
        let uri = uri();
        assert_eq!(tracker.state(&uri), RefreshState::Idle);
        let ticket = tracker.try_begin(&uri).unwrap();
        assert!(tracker.try_begin(&uri).is_none());
        assert_eq!(tracker.state(&uri), RefreshState::Refreshing);

        let other = Url::parse("file:///nb/b.md").unwrap();
        assert!(tracker.try_begin(&other).is_some());

        tracker.finish(&uri, ticket);
        assert!(tracker.try_begin(&uri).is_some());
        tracker.forget(&uri);
        assert_eq!(tracker.state(&uri), RefreshState::Idle);
    }

    #[test]
    fn stale_cycle_cannot_release_a_newer_one() {
        let tracker = RefreshTracker::new();
        let uri = uri();
        let stale = tracker.try_begin(&uri).unwrap();

        // closed and reopened while the first cycle is still running
        tracker.forget(&uri);
        let current = tracker.try_begin(&uri).unwrap();
        assert_ne!(stale, current);

        tracker.finish(&uri, stale);
        assert_eq!(tracker.state(&uri), RefreshState::Refreshing);
        assert!(tracker.try_begin(&uri).is_none());

        tracker.finish(&uri, current);
        assert_eq!(tracker.state(&uri), RefreshState::Idle);
    }

    #[tokio::test]
    async fn open_publishes_immediately() {
        let (engine, notebook, mut receiver) =
            setup("[[b]] [[gone]]", MemoryNotebook::new("/nb").with_note("b.md", "# B")).await;
        let handle = engine
            .refresh(uri(), notebook, RefreshTrigger::Opened)
            .unwrap();
        handle.await.unwrap();
        assert_eq!(
            published(receiver.recv().await.unwrap()),
            vec!["not found".to_string()]
        );
        assert_eq!(engine.tracker().state(&uri()), RefreshState::Idle);
    }

    #[tokio::test]
    async fn burst_of_changes_runs_one_cycle() {
        let (engine, notebook, mut receiver) = setup("[[gone]]", MemoryNotebook::new("/nb")).await;

        let first = engine.refresh(uri(), notebook.clone(), RefreshTrigger::Changed);
        assert!(first.is_some());
        for _ in 0..10 {
            assert!(engine
                .refresh(uri(), notebook.clone(), RefreshTrigger::Changed)
                .is_none());
        }
        first.unwrap().await.unwrap();

        assert_eq!(published(receiver.recv().await.unwrap()).len(), 1);
        assert!(receiver.try_recv().is_err());
        assert_eq!(notebook.find_by_href_count(), 2);

        assert!(engine
            .refresh(uri(), notebook, RefreshTrigger::Changed)
            .is_some());
    }

    #[tokio::test]
    async fn cycle_reads_the_text_current_after_the_debounce() {
        let (engine, notebook, mut receiver) = setup("[[gone]]", MemoryNotebook::new("/nb")).await;
        let handle = engine
            .refresh(uri(), notebook, RefreshTrigger::Changed)
            .unwrap();

        engine
            .documents
            .write()
            .await
            .apply_changes(
                &uri(),
                2,
                vec![TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(0, 0), Position::new(0, 8))),
                    range_length: None,
                    text: "clean".to_string(),
                }],
            )
            .unwrap();
        handle.await.unwrap();

        assert!(published(receiver.recv().await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn disabled_diagnostics_clear_without_queries() {
        let notebook = MemoryNotebook::new("/nb").configure(|config| {
            config.lsp.diagnostics.dead_link = DiagnosticLevel::None;
            config.lsp.diagnostics.wiki_title = DiagnosticLevel::None;
        });
        let (engine, notebook, mut receiver) = setup("[[gone]]", notebook).await;

        assert!(engine
            .refresh(uri(), notebook.clone(), RefreshTrigger::Changed)
            .is_none());
        assert!(published(receiver.recv().await.unwrap()).is_empty());
        assert_eq!(notebook.query_count(), 0);
        assert_eq!(engine.tracker().state(&uri()), RefreshState::Idle);
    }

    #[tokio::test]
    async fn closed_documents_publish_nothing() {
        let (engine, notebook, mut receiver) = setup("[[gone]]", MemoryNotebook::new("/nb")).await;
        let handle = engine
            .refresh(uri(), notebook, RefreshTrigger::Changed)
            .unwrap();
        engine.documents.write().await.close(&uri());
        engine.forget(&uri());
        handle.await.unwrap();
        assert!(receiver.try_recv().is_err());
    }
}
