//! Catalog of downloadable model artifacts.
//!
//! The acquisition engine only reads from a catalog: it lists entries and
//! looks them up by id. [`StaticCatalog`] is a validated, immutable snapshot
//! built in code or loaded from a TOML manifest.

mod catalog;
mod entry;
mod error;
mod manifest;

pub use catalog::{Catalog, StaticCatalog};
pub use entry::{CatalogEntry, EntryBuilder};
pub use error::{CatalogError, Result};
