use std::path::PathBuf;
use thiserror::Error;
use zettel_notebook::{NotebookError, TemplateError};

use crate::document::DocumentError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Notebook(#[from] NotebookError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build a file URI for {0}")]
    InvalidUri(PathBuf),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
