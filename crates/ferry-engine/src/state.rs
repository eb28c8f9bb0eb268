use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one catalog entry.
///
/// ```text
/// Idle ──acquire──▶ Downloading ──stream done──▶ Verifying ──ok──▶ Complete
///   ▲                    │                           │
///   └──── cancel ────────┴───────────────────────────┤
///                        └──────── failure ──────────┴──▶ Error ──acquire──▶ Downloading
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransferState {
    /// Nothing in flight. A staging file may still hold a resumable prefix.
    #[default]
    Idle,
    Downloading {
        /// `bytes_downloaded / total_bytes` in `[0, 1]`; 0 while the total is unknown.
        progress_fraction: f64,
        bytes_downloaded:  u64,
        total_bytes:       Option<u64>,
    },
    Verifying,
    Complete {
        final_path: PathBuf,
    },
    Error {
        message: String,
    },
}

impl TransferState {
    pub fn downloading(bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        let progress_fraction = match total_bytes {
            Some(total) if total > 0 => (bytes_downloaded as f64 / total as f64).clamp(0.0, 1.0),
            _ => 0.0,
        };
        Self::Downloading {
            progress_fraction,
            bytes_downloaded,
            total_bytes,
        }
    }

    pub fn is_complete(&self) -> bool { matches!(self, Self::Complete { .. }) }

    pub fn is_error(&self) -> bool { matches!(self, Self::Error { .. }) }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading { .. } => "downloading",
            Self::Verifying => "verifying",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloading {
                progress_fraction,
                total_bytes: Some(_),
                ..
            } => write!(f, "downloading {:.0}%", progress_fraction * 100.0),
            Self::Downloading {
                bytes_downloaded, ..
            } => write!(f, "downloading {bytes_downloaded} bytes"),
            Self::Error { message } => write!(f, "error: {message}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Full registry view: every known entry id and its state.
pub type Snapshot = BTreeMap<String, TransferState>;

/// One state change, as delivered by [`Engine::events`](crate::Engine::events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    pub entry_id: String,
    pub state:    TransferState,
}
