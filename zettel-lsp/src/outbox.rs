//! Messages the server sends to the client on its own initiative.
//!
//! Background tasks never hold the client. They push a [`ClientMessage`] into
//! the [`Outbox`], and one forwarding task publishes diagnostics in the order
//! they were sent, so the last set published for a document wins. Edits and
//! show-document requests wait for the client's reply on a lane of their own.

use lsp_types::{Diagnostic, ShowDocumentParams, Url, WorkspaceEdit};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::server::LspClient;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    PublishDiagnostics {
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    },
    ApplyEdit(WorkspaceEdit),
    ShowDocument(ShowDocumentParams),
}

#[derive(Debug, Clone)]
pub struct Outbox {
    sender: UnboundedSender<ClientMessage>,
}

impl Outbox {
    /// An outbox and the receiving end of its channel.
    pub fn channel() -> (Self, UnboundedReceiver<ClientMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// An outbox whose messages are delivered to `client` by a spawned task.
    /// Must be called from within a tokio runtime.
    pub fn spawn_forwarder<C: LspClient>(client: C) -> (Self, JoinHandle<()>) {
        let (outbox, receiver) = Self::channel();
        let handle = tokio::spawn(forward(client, receiver));
        (outbox, handle)
    }

    pub fn send(&self, message: ClientMessage) {
        if self.sender.send(message).is_err() {
            tracing::debug!("client message dropped, forwarder stopped");
        }
    }

    pub fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        self.send(ClientMessage::PublishDiagnostics {
            uri,
            diagnostics,
            version: None,
        });
    }
}

/// Publishes go out in send order. Requests awaiting a client reply run in
/// send order on a second task, so a slow reply never holds back diagnostics.
async fn forward<C: LspClient>(client: C, mut receiver: UnboundedReceiver<ClientMessage>) {
    let (requests, pending) = mpsc::unbounded_channel();
    let request_lane = tokio::spawn(forward_requests(client.clone(), pending));

    while let Some(message) = receiver.recv().await {
        match message {
            ClientMessage::PublishDiagnostics {
                uri,
                diagnostics,
                version,
            } => client.publish_diagnostics(uri, diagnostics, version).await,
            request => {
                if requests.send(request).is_err() {
                    tracing::warn!("client request dropped, request lane stopped");
                }
            }
        }
    }

    drop(requests);
    if let Err(err) = request_lane.await {
        tracing::warn!(error = %err, "client request lane failed");
    }
}

async fn forward_requests<C: LspClient>(client: C, mut pending: UnboundedReceiver<ClientMessage>) {
    while let Some(message) = pending.recv().await {
        request(&client, message).await;
    }
}

async fn request<C: LspClient>(client: &C, message: ClientMessage) {
    match message {
        ClientMessage::PublishDiagnostics {
            uri,
            diagnostics,
            version,
        } => client.publish_diagnostics(uri, diagnostics, version).await,
        ClientMessage::ApplyEdit(edit) => match client.apply_edit(edit).await {
            Ok(response) if !response.applied => tracing::warn!(
                reason = response.failure_reason.as_deref().unwrap_or("unknown"),
                "client rejected workspace edit"
            ),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "workspace/applyEdit failed"),
        },
        ClientMessage::ShowDocument(params) => {
            let uri = params.uri.clone();
            match client.show_document(params).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(%uri, "client could not show document"),
                Err(err) => tracing::warn!(%uri, error = %err, "window/showDocument failed"),
            }
        }
    }
}
