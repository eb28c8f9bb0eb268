use std::path::{Path, PathBuf};
use std::time::Duration;

use ferry_fetch::ClientOptions;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

const MIN_CHUNK_SIZE: usize = 4 * 1024;
const MAX_CHUNK_SIZE: usize = 16 * 1024;

/// Engine settings.
///
/// Loaded from built-in defaults, then an optional TOML file, then `FERRY_*`
/// environment variables, each layer overriding the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding final and staging files.
    pub storage_dir:          PathBuf,
    /// Bytes written between progress reports and cancellation checks.
    pub chunk_size:           usize,
    /// Minimum spacing of published progress updates. 0 publishes every chunk.
    pub progress_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs:    u64,
    pub user_agent:           String,
    /// Buffer of the state event channel before slow receivers start lagging.
    pub event_capacity:       usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_dir:          Self::default_storage_dir(),
            chunk_size:           ferry_fetch::DEFAULT_CHUNK_SIZE,
            progress_interval_ms: 100,
            connect_timeout_secs: 30,
            read_timeout_secs:    60,
            user_agent:           concat!("ferry/", env!("CARGO_PKG_VERSION")).to_string(),
            event_capacity:       1024,
        }
    }
}

impl EngineConfig {
    /// `~/.ferry/models`, or `.ferry/models` when there is no home directory.
    pub fn default_storage_dir() -> PathBuf {
        home::home_dir()
            .unwrap_or_default()
            .join(".ferry")
            .join("models")
    }

    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(Env::prefixed("FERRY_"))
            .extract()
            .map_err(|e| EngineError::Config(Box::new(e)))
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// The configured chunk size, clamped to 4 KiB..=16 KiB.
    pub fn chunk_size(&self) -> usize { self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE) }

    pub fn progress_interval(&self) -> Duration { Duration::from_millis(self.progress_interval_ms) }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout:    Duration::from_secs(self.read_timeout_secs),
            user_agent:      self.user_agent.clone(),
        }
    }
}
