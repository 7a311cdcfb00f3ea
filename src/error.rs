use thiserror::Error;

use crate::mp3::{MediaFormatError, ValidationError};
use crate::parse::ParseError;
use crate::provider::MissingResourceError;

/// Unified error type covering rule loading, media inspection, and splicing.
///
/// Returned by convenience methods like [`Rule::from_file()`](crate::Rule::from_file)
/// and [`splice()`](crate::splice).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[cfg(feature = "json")]
    #[error(transparent)]
    Json(#[from] crate::serial::DocumentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    MediaFormat(#[from] MediaFormatError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    MissingResource(#[from] MissingResourceError),

    #[error("{tool} not found")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("unknown splicing engine: {0}")]
    UnknownEngine(String),
}

impl Error {
    pub(crate) fn tool_not_found(tool: impl Into<String>) -> Self {
        Error::ToolNotFound { tool: tool.into() }
    }

    pub(crate) fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
