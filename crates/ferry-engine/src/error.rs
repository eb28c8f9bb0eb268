use std::io;
use std::path::PathBuf;

use ferry_fetch::TransferError;
use ferry_verify::VerificationError;

/// Failures of the engine's public operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown catalog entry '{0}'")]
    UnknownEntry(String),

    #[error(transparent)]
    Storage(#[from] ferry_fs::Error),

    #[error("invalid configuration: {0}")]
    Config(#[source] Box<figment::Error>),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Why one acquisition attempt ended without a committed file.
///
/// Never returned from the public API: the engine renders it into
/// [`TransferState::Error`](crate::TransferState::Error) or, for
/// [`Cancelled`](Self::Cancelled), back to `Idle`.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded with HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("integrity check failed: expected digest {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("could not move the download into place: {0}")]
    Commit(#[source] ferry_fs::Error),

    #[error(transparent)]
    Storage(#[from] ferry_fs::Error),

    #[error("file I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("verification failed: {0}")]
    Verify(#[source] VerificationError),

    #[error("transfer task failed: {0}")]
    Panicked(String),

    #[error("cancelled")]
    Cancelled,
}

impl AcquireError {
    /// Whether re-running `acquire` has a reasonable chance of succeeding.
    ///
    /// The engine itself never retries; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Io { .. } | Self::Commit(_) | Self::Cancelled => true,
            Self::HttpStatus { status } => *status == 429 || *status >= 500,
            Self::DigestMismatch { .. } | Self::Storage(_) | Self::Verify(_) | Self::Panicked(_) => false,
        }
    }
}

impl From<TransferError> for AcquireError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::HttpStatus { status } => Self::HttpStatus { status },
            TransferError::Io { path, source } => Self::Io { path, source },
            TransferError::Cancelled => Self::Cancelled,
            e @ (TransferError::Network(_)
            | TransferError::UnexpectedEof { .. }
            | TransferError::InvalidContentRange(_)) => Self::Network(e.to_string()),
        }
    }
}

impl From<VerificationError> for AcquireError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Mismatch { expected, actual } => Self::DigestMismatch { expected, actual },
            VerificationError::Interrupted => Self::Cancelled,
            e => Self::Verify(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_mapping() {
        assert!(matches!(
            AcquireError::from(TransferError::HttpStatus { status: 503 }),
            AcquireError::HttpStatus { status: 503 }
        ));
        assert!(matches!(AcquireError::from(TransferError::Cancelled), AcquireError::Cancelled));

        let eof = AcquireError::from(TransferError::UnexpectedEof {
            expected: 1000,
            received: 10,
        });
        assert_eq!(eof.to_string(), "network error: connection closed after 10 of 1000 bytes");
    }

    #[test]
    fn test_verification_error_mapping() {
        let mismatch = AcquireError::from(VerificationError::Mismatch {
            expected: "aa".into(),
            actual:   "bb".into(),
        });
        assert_eq!(
            mismatch.to_string(),
            "integrity check failed: expected digest aa, got bb"
        );
        assert!(matches!(
            AcquireError::from(VerificationError::Interrupted),
            AcquireError::Cancelled
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(AcquireError::HttpStatus { status: 503 }.is_retryable());
        assert!(AcquireError::HttpStatus { status: 429 }.is_retryable());
        assert!(!AcquireError::HttpStatus { status: 404 }.is_retryable());
        assert!(AcquireError::Network("reset".into()).is_retryable());
        assert!(
            !AcquireError::DigestMismatch {
                expected: String::new(),
                actual:   String::new(),
            }
            .is_retryable()
        );
    }
}
