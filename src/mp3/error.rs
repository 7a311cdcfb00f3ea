use std::path::PathBuf;

use thiserror::Error;

/// Why a file could not be used as MP3 audio.
#[derive(Debug, Error)]
pub enum MediaFormatErrorKind {
    #[error("no MPEG audio frame header found")]
    NoFrameHeader,

    #[error("variable bitrate audio cannot be spliced")]
    Vbr,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file is not usable MP3 audio.
#[derive(Debug, Error)]
#[error("{}: {kind}", .path.display())]
pub struct MediaFormatError {
    pub path: PathBuf,
    #[source]
    pub kind: MediaFormatErrorKind,
}

impl MediaFormatError {
    pub(crate) fn new(path: impl Into<PathBuf>, kind: impl Into<MediaFormatErrorKind>) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
        }
    }
}

/// Files handed to the splicer disagree on an encoding parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} does not match; expected {expected}, got {actual}")]
pub struct ValidationError {
    /// One of `vbr`, `bitrate`, `samplerate`, `mode`.
    pub field: &'static str,
    pub expected: String,
    pub actual: String,
}
