use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("digest mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("invalid digest '{0}'")]
    InvalidDigest(String),

    #[error("unsupported digest algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("failed to read '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("verification interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, VerificationError>;
