use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid catalog manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("catalog entry id must not be empty")]
    EmptyId,

    #[error("duplicate catalog entry id '{0}'")]
    DuplicateId(String),

    #[error("entries '{first}' and '{second}' share target filename '{filename}'")]
    DuplicateFilename {
        filename: String,
        first:    String,
        second:   String,
    },

    #[error("entry '{id}': invalid source url '{url}': {reason}")]
    InvalidUrl {
        id:     String,
        url:    String,
        reason: String,
    },

    #[error("entry '{id}': cannot derive a filename from '{url}'")]
    MissingFilename { id: String, url: String },

    #[error("entry '{id}': {source}")]
    Filename { id: String, source: ferry_fs::Error },

    #[error("entry '{id}': {source}")]
    Digest {
        id:     String,
        source: ferry_verify::VerificationError,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
