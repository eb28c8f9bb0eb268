//! Resume validators persisted beside a staging file.
//!
//! The first response's `ETag` / `Last-Modified` are saved so a later resume
//! can send `If-Range`: an origin whose content changed then answers with a
//! full `200` instead of splicing new bytes onto an old prefix.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Result, TransferError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeValidators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag:          Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl ResumeValidators {
    pub fn new(etag: Option<String>, last_modified: Option<String>) -> Self {
        Self {
            etag,
            last_modified,
        }
    }

    pub fn is_empty(&self) -> bool { self.etag.is_none() && self.last_modified.is_none() }

    /// Value for an `If-Range` header. Weak ETags are not allowed there.
    pub fn if_range(&self) -> Option<&str> {
        self.etag
            .as_deref()
            .filter(|etag| !etag.starts_with("W/"))
            .or(self.last_modified.as_deref())
    }

    /// Load validators, treating a missing or unreadable sidecar as "none".
    pub async fn load(path: &Path) -> Option<Self> {
        let bytes = fs::read(path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(validators) => Some(validators),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable resume metadata");
                None
            }
        }
    }

    /// Write the sidecar through a temporary file and rename it into place.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec(self)
            .map_err(|e| TransferError::io(path)(std::io::Error::other(e)))?;

        let mut temp_path = path.as_os_str().to_owned();
        temp_path.push(".tmp");
        let temp_path = std::path::PathBuf::from(temp_path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(TransferError::io(&temp_path))?;
            file.write_all(&content).await.map_err(TransferError::io(&temp_path))?;
            file.sync_all().await.map_err(TransferError::io(&temp_path))?;
        }

        fs::rename(&temp_path, path).await.map_err(TransferError::io(path))
    }
}
