//! Dead link and missing title diagnostics.

use lsp_types::{Diagnostic, DiagnosticSeverity};
use zettel_config::DiagnosticLevel;
use zettel_notebook::{is_url, Notebook};

use crate::document::OpenDocument;
use crate::resolver::resolve;

/// `source` of every diagnostic published by the server.
pub const DIAGNOSTIC_SOURCE: &str = "zettel";

pub const DEAD_LINK_MESSAGE: &str = "not found";

/// Diagnostics of `document` under the notebook configuration. Nothing is
/// queried when every category is disabled.
pub fn compute_diagnostics(document: &OpenDocument, notebook: &dyn Notebook) -> Vec<Diagnostic> {
    let config = notebook.config().lsp.diagnostics;
    if config.is_disabled() {
        return Vec::new();
    }

    let mut diagnostics = Vec::new();
    for link in document.links() {
        if is_url(&link.href) {
            continue;
        }
        let target = match resolve(&link, document, notebook) {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!(href = %link.href, error = %err, "skipping link");
                continue;
            }
        };

        let (level, message) = match target {
            None => (config.dead_link, DEAD_LINK_MESSAGE.to_string()),
            Some(_) if link.has_title => continue,
            Some(target) => (config.wiki_title, target.note.title),
        };
        let Some(severity) = severity(level) else {
            continue;
        };
        diagnostics.push(Diagnostic {
            range: link.range,
            severity: Some(severity),
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message,
            ..Diagnostic::default()
        });
    }
    diagnostics
}

pub fn severity(level: DiagnosticLevel) -> Option<DiagnosticSeverity> {
    match level {
        DiagnosticLevel::None => None,
        DiagnosticLevel::Hint => Some(DiagnosticSeverity::HINT),
        DiagnosticLevel::Info => Some(DiagnosticSeverity::INFORMATION),
        DiagnosticLevel::Warning => Some(DiagnosticSeverity::WARNING),
        DiagnosticLevel::Error => Some(DiagnosticSeverity::ERROR),
    }
}
