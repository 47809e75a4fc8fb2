//! Error types of the notebook collaborator

use std::path::PathBuf;
use thiserror::Error;

use crate::date::DateError;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum NotebookError {
    /// No notebook root (a directory holding `.zettel/`) above the path.
    #[error("no notebook found in {0} or any parent directory")]
    NotFound(PathBuf),

    /// A note with the generated file name already exists.
    #[error("a note already exists at {name}")]
    NoteExists { name: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid notebook configuration: {0}")]
    Config(#[from] zettel_config::ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Date(#[from] DateError),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl NotebookError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NotebookError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, NotebookError>;
