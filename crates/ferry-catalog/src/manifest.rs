//! TOML manifest format.
//!
//! ```toml
//! [[entry]]
//! id = "gemma-2b-q4"
//! url = "https://example.org/models/gemma-2b-q4.gguf"
//! size = 1500000000
//! sha256 = "ab12..."
//! ```

use serde::Deserialize;

use crate::{CatalogEntry, EntryBuilder};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Manifest {
    #[serde(default, rename = "entry")]
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ManifestEntry {
    id:          String,
    url:         String,
    #[serde(default)]
    size:        Option<u64>,
    #[serde(default, alias = "digest")]
    sha256:      Option<String>,
    #[serde(default)]
    filename:    Option<String>,
    #[serde(default)]
    name:        Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ManifestEntry {
    pub fn into_builder(self) -> EntryBuilder {
        let mut builder = CatalogEntry::builder(self.id, self.url);
        if let Some(size) = self.size {
            builder = builder.size(size);
        }
        if let Some(digest) = self.sha256 {
            builder = builder.digest(digest);
        }
        if let Some(filename) = self.filename {
            builder = builder.filename(filename);
        }
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        builder
    }
}
