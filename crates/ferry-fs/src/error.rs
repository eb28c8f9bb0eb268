use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to remove '{path}': {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("failed to create directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to rename '{from}' to '{to}': {source}")]
    Rename {
        from:   PathBuf,
        to:     PathBuf,
        source: io::Error,
    },

    #[error("nothing staged at '{0}'")]
    NothingStaged(PathBuf),

    #[error("invalid target filename '{0}'")]
    InvalidFilename(String),
}

pub type Result<T> = std::result::Result<T, Error>;
