//! Resumable, verified acquisition of catalog entries.
//!
//! The [`Engine`] owns a registry holding one [`TransferState`] per catalog
//! entry and at most one active run per entry. Runs for different entries
//! proceed concurrently; a second `acquire` for an entry that is already in
//! flight attaches to the existing [`TransferHandle`].
//!
//! # Example
//!
//! ```no_run
//! use ferry_catalog::{CatalogEntry, StaticCatalog};
//! use ferry_engine::{Engine, EngineConfig};
//! use ferry_fetch::ReqwestClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = StaticCatalog::new([
//!     CatalogEntry::builder("tiny", "https://example.org/models/tiny.gguf").build()?,
//! ])?;
//! let config = EngineConfig::load(None)?;
//! let client = ReqwestClient::new(&config.client_options())?;
//!
//! let engine = Engine::new(client, catalog, config)?;
//! let handle = engine.acquire("tiny").await?;
//! println!("{}", handle.wait().await);
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
mod handle;
mod registry;
mod state;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{AcquireError, EngineError, Result};
pub use handle::TransferHandle;
pub use state::{Snapshot, StateEvent, TransferState};
