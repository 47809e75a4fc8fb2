//! Main language server implementation

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::RwLock as SessionLock;
use serde_json::Value;
use tokio::sync::RwLock;
use tower_lsp::async_trait;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{
    ApplyWorkspaceEditResponse, CodeActionParams, CodeActionProviderCapability,
    CodeActionResponse, CompletionItem, CompletionOptions, CompletionParams, CompletionResponse,
    Diagnostic, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, DocumentLink, DocumentLinkOptions,
    DocumentLinkParams, ExecuteCommandOptions, ExecuteCommandParams, GotoDefinitionParams,
    GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability, InitializeParams,
    InitializeResult, InitializedParams, Location, OneOf, ReferenceParams, ServerCapabilities,
    ServerInfo, SetTraceParams, ShowDocumentParams, TextDocumentItem, TextDocumentSyncCapability,
    TextDocumentSyncKind, TextDocumentSyncOptions, TextDocumentSyncSaveOptions, TraceValue, Url,
    WorkDoneProgressOptions, WorkspaceEdit,
};
use tower_lsp::Client;
use zettel_analysis::{completion, navigation, DocumentStore, OpenDocument};
use zettel_notebook::{FsNotebookStore, Notebook, NotebookStore};

use crate::diagnostics::{DiagnosticsEngine, RefreshTrigger, DEFAULT_DEBOUNCE};
use crate::features::code_actions::new_note_actions;
use crate::features::commands::{self, CommandContext, COMMANDS};
use crate::features::internal_error;
use crate::outbox::Outbox;
use crate::session::Session;

/// Characters after which clients should ask for completions.
pub const TRIGGER_CHARACTERS: [&str; 4] = ["(", "[", "#", ":"];

/// The client calls the server makes, so tests can stand in for the editor.
#[async_trait]
pub trait LspClient: Send + Sync + Clone + 'static {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>);
    async fn apply_edit(&self, edit: WorkspaceEdit) -> Result<ApplyWorkspaceEditResponse>;
    async fn show_document(&self, params: ShowDocumentParams) -> Result<bool>;
}

#[async_trait]
impl LspClient for Client {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>) {
        self.publish_diagnostics(uri, diags, version).await;
    }

    async fn apply_edit(&self, edit: WorkspaceEdit) -> Result<ApplyWorkspaceEditResponse> {
        self.apply_edit(edit).await
    }

    async fn show_document(&self, params: ShowDocumentParams) -> Result<bool> {
        self.show_document(params).await
    }
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Delay between a change and the diagnostics it triggers.
    pub debounce: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

pub struct ZettelLanguageServer<C = Client, S = FsNotebookStore> {
    _client: C,
    store: Arc<S>,
    documents: Arc<RwLock<DocumentStore>>,
    session: SessionLock<Session>,
    diagnostics: DiagnosticsEngine,
    outbox: Outbox,
}

impl ZettelLanguageServer<Client, FsNotebookStore> {
    pub fn new(client: Client) -> Self {
        Self::with_store(client, Arc::new(FsNotebookStore::new()))
    }
}

impl<C, S> ZettelLanguageServer<C, S>
where
    C: LspClient,
    S: NotebookStore + 'static,
{
    pub fn with_store(client: C, store: Arc<S>) -> Self {
        Self::with_options(client, store, ServerOptions::default())
    }

    /// Must be called from within a tokio runtime: client messages are
    /// delivered by a spawned task.
    pub fn with_options(client: C, store: Arc<S>, options: ServerOptions) -> Self {
        let (outbox, _forwarder) = Outbox::spawn_forwarder(client.clone());
        let documents = Arc::new(RwLock::new(DocumentStore::new()));
        let diagnostics = DiagnosticsEngine::new(documents.clone(), outbox.clone(), options.debounce);
        Self {
            _client: client,
            store,
            documents,
            session: SessionLock::new(Session::default()),
            diagnostics,
            outbox,
        }
    }

    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// Handler of the `$/setTrace` notification.
    pub async fn set_trace(&self, params: SetTraceParams) {
        tracing::debug!(trace = ?params.value, "trace level changed");
        self.session.write().trace = params.value;
    }

    async fn snapshot(&self, uri: &Url) -> Option<OpenDocument> {
        self.documents.read().await.get(uri).cloned()
    }

    fn notebook_of(&self, document: &OpenDocument) -> Result<Arc<dyn Notebook>> {
        self.store.open(&document.path).map_err(internal_error)
    }

    /// The open document at `uri` with its notebook. A document that is not
    /// open is not an error.
    async fn document_and_notebook(
        &self,
        uri: &Url,
    ) -> Result<Option<(OpenDocument, Arc<dyn Notebook>)>> {
        let Some(document) = self.snapshot(uri).await else {
            return Ok(None);
        };
        let notebook = self.notebook_of(&document)?;
        Ok(Some((document, notebook)))
    }

    async fn refresh_diagnostics(&self, uri: &Url, trigger: RefreshTrigger) {
        let Some(path) = self.documents.read().await.get(uri).map(|doc| doc.path.clone()) else {
            return;
        };
        match self.store.open(&path) {
            Ok(notebook) => {
                self.diagnostics.refresh(uri.clone(), notebook, trigger);
            }
            Err(err) => tracing::debug!(%uri, error = %err, "no notebook, skipping diagnostics"),
        }
    }
}

#[async_trait]
impl<C, S> tower_lsp::LanguageServer for ZettelLanguageServer<C, S>
where
    C: LspClient,
    S: NotebookStore + 'static,
{
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let session = Session::from_initialize(&params);
        tracing::info!(roots = ?session.workspace_roots, "initializing");
        *self.session.write() = session;

        let capabilities = ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..TextDocumentSyncOptions::default()
                },
            )),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            definition_provider: Some(OneOf::Left(true)),
            references_provider: Some(OneOf::Left(true)),
            code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
            document_link_provider: Some(DocumentLinkOptions {
                resolve_provider: Some(true),
                work_done_progress_options: WorkDoneProgressOptions::default(),
            }),
            completion_provider: Some(CompletionOptions {
                resolve_provider: Some(true),
                trigger_characters: Some(
                    TRIGGER_CHARACTERS.iter().map(|c| c.to_string()).collect(),
                ),
                ..CompletionOptions::default()
            }),
            execute_command_provider: Some(ExecuteCommandOptions {
                commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                work_done_progress_options: WorkDoneProgressOptions::default(),
            }),
            ..ServerCapabilities::default()
        };

        Ok(InitializeResult {
            capabilities,
            server_info: Some(ServerInfo {
                name: "zettel-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("client initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        self.session.write().trace = TraceValue::Off;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let TextDocumentItem {
            uri, version, text, ..
        } = params.text_document;
        if let Err(err) = self
            .documents
            .write()
            .await
            .open(uri.clone(), version, text)
        {
            tracing::warn!(error = %err, "replaced open document");
        }
        self.refresh_diagnostics(&uri, RefreshTrigger::Opened).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        {
            let mut documents = self.documents.write().await;
            if documents.get(&uri).is_none() {
                return;
            }
            if let Err(err) =
                documents.apply_changes(&uri, params.text_document.version, params.content_changes)
            {
                tracing::warn!(%uri, error = %err, "change not applied");
            }
        }
        self.refresh_diagnostics(&uri, RefreshTrigger::Changed).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.write().await.close(&uri);
        self.diagnostics.forget(&uri);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let Some(document) = self.snapshot(&params.text_document.uri).await else {
            return;
        };
        match self.notebook_of(&document) {
            Ok(notebook) => {
                if let Err(err) = notebook.index(false) {
                    tracing::warn!(error = %err, "reindexing after save failed");
                }
            }
            Err(err) => tracing::warn!(error = %err.message, "no notebook for saved document"),
        }
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position.position;
        let uri = &params.text_document_position.text_document.uri;
        let Some((document, notebook)) = self.document_and_notebook(uri).await? else {
            return Ok(None);
        };
        let items = completion::complete(&document, notebook.as_ref(), position)
            .map_err(internal_error)?;
        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(CompletionResponse::Array(items)))
        }
    }

    async fn completion_resolve(&self, item: CompletionItem) -> Result<CompletionItem> {
        completion::resolve_item(item).map_err(internal_error)
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params.position;
        let uri = &params.text_document_position_params.text_document.uri;
        let Some((document, notebook)) = self.document_and_notebook(uri).await? else {
            return Ok(None);
        };
        navigation::hover(&document, notebook.as_ref(), position).map_err(internal_error)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params.position;
        let uri = &params.text_document_position_params.text_document.uri;
        let Some((document, notebook)) = self.document_and_notebook(uri).await? else {
            return Ok(None);
        };
        let link_support = self.session.read().definition_link_support();
        navigation::definition(&document, notebook.as_ref(), position, link_support)
            .map_err(internal_error)
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position.position;
        let uri = &params.text_document_position.text_document.uri;
        let Some((document, notebook)) = self.document_and_notebook(uri).await? else {
            return Ok(None);
        };
        let locations = navigation::references(&document, notebook.as_ref(), position)
            .map_err(internal_error)?;
        Ok(Some(locations))
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        let Some((document, notebook)) = self
            .document_and_notebook(&params.text_document.uri)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(navigation::document_links(&document, notebook.as_ref())))
    }

    async fn document_link_resolve(&self, link: DocumentLink) -> Result<DocumentLink> {
        Ok(link)
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let Some(document) = self.snapshot(&params.text_document.uri).await else {
            return Ok(None);
        };
        let actions = new_note_actions(&document, params.range).map_err(internal_error)?;
        if actions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(actions))
        }
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        tracing::debug!(command = %params.command, "executing command");
        let session = self.session();
        let documents = self.documents.read().await;
        let context = CommandContext {
            store: self.store.as_ref(),
            documents: &documents,
            session: &session,
            outbox: &self.outbox,
            now: Local::now().naive_local(),
        };
        commands::execute_command(&params.command, &params.arguments, &context)
    }
}
