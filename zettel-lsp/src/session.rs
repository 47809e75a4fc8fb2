//! What the client told us at `initialize`.

use lsp_types::{ClientCapabilities, InitializeParams, TraceValue};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Session {
    pub capabilities: ClientCapabilities,
    pub trace: TraceValue,
    /// Workspace folders, used to resolve relative command paths.
    pub workspace_roots: Vec<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            capabilities: ClientCapabilities::default(),
            trace: TraceValue::Off,
            workspace_roots: Vec::new(),
        }
    }
}

impl Session {
    #[allow(deprecated)]
    pub fn from_initialize(params: &InitializeParams) -> Self {
        let mut roots = Vec::new();
        if let Some(folders) = params.workspace_folders.as_ref() {
            for folder in folders {
                if let Ok(path) = folder.uri.to_file_path() {
                    roots.push(path);
                }
            }
        }
        if roots.is_empty() {
            if let Some(root_uri) = params.root_uri.as_ref() {
                if let Ok(path) = root_uri.to_file_path() {
                    roots.push(path);
                }
            } else if let Some(root_path) = params.root_path.as_ref() {
                roots.push(PathBuf::from(root_path));
            }
        }

        Self {
            capabilities: params.capabilities.clone(),
            trace: params.trace.as_ref().cloned().unwrap_or(TraceValue::Off),
            workspace_roots: roots,
        }
    }

    /// Whether go to definition may answer with `LocationLink`s.
    pub fn definition_link_support(&self) -> bool {
        self.capabilities
            .text_document
            .as_ref()
            .and_then(|document| document.definition.as_ref())
            .and_then(|definition| definition.link_support)
            .unwrap_or(false)
    }

    /// `path` as given when absolute, otherwise relative to the first
    /// workspace root.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match self.workspace_roots.first() {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}
