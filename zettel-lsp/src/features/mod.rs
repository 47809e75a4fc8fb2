pub mod code_actions;
pub mod commands;

use std::fmt::Display;
use tower_lsp::jsonrpc::{Error, ErrorCode};

/// Request error carrying the message of a collaborator failure.
pub(crate) fn internal_error(err: impl Display) -> Error {
    Error {
        code: ErrorCode::InternalError,
        message: err.to_string().into(),
        data: None,
    }
}
