//! Error types for ferry-fetch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded with HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("file I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("connection closed after {received} of {expected} bytes")]
    UnexpectedEof { expected: u64, received: u64 },

    #[error("server sent an unusable Content-Range: {0}")]
    InvalidContentRange(String),

    #[error("transfer cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TransferError>;

impl TransferError {
    pub(crate) fn io(path: &std::path::Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| TransferError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn network<E: std::error::Error>(e: E) -> Self { TransferError::Network(e.to_string()) }
}
