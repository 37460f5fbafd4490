//! Error types

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors. Anything recoverable is logged as a warning instead.
#[derive(Debug, Error)]
pub enum XmltvError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: is a directory", .0.display())]
    IsDirectory(PathBuf),

    #[error("{}: XML error at byte {position}: {message}", .path.display())]
    Xml {
        path: PathBuf,
        position: u64,
        message: String,
    },

    #[error("invalid XMLTV timestamp '{0}' (expected YYYYMMDDHHMMSS +HHMM)")]
    InvalidTimestamp(String),

    #[error("missing '{0}' attribute")]
    MissingAttribute(String),

    #[error("timestamp '{0}' shifted out of range")]
    TimestampOutOfRange(String),

    #[error("channels filter file does not exist: {}", .0.display())]
    FilterFileMissing(PathBuf),

    #[error("failed to write XMLTV document: {0}")]
    Write(String),
}

impl XmltvError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        XmltvError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, XmltvError>;
