use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::manifest::Manifest;
use crate::{CatalogEntry, CatalogError, Result};

/// Read access to the set of downloadable entries.
pub trait Catalog: Send + Sync {
    fn list_entries(&self) -> Vec<Arc<CatalogEntry>>;

    fn find_entry(&self, id: &str) -> Option<Arc<CatalogEntry>>;
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn list_entries(&self) -> Vec<Arc<CatalogEntry>> { (**self).list_entries() }

    fn find_entry(&self, id: &str) -> Option<Arc<CatalogEntry>> { (**self).find_entry(id) }
}

/// A fixed catalog snapshot, in declaration order.
///
/// Ids are unique and no two entries share a target filename, so no two
/// transfers can ever write the same staging file.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<Arc<CatalogEntry>>,
    by_id:   HashMap<String, usize>,
}

impl StaticCatalog {
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self> {
        let mut catalog = Self::default();
        let mut by_filename: HashMap<String, String> = HashMap::new();

        for entry in entries {
            if catalog.by_id.contains_key(entry.id()) {
                return Err(CatalogError::DuplicateId(entry.id().to_string()));
            }
            if let Some(first) = by_filename.get(entry.target_filename()) {
                return Err(CatalogError::DuplicateFilename {
                    filename: entry.target_filename().to_string(),
                    first:    first.clone(),
                    second:   entry.id().to_string(),
                });
            }

            by_filename.insert(entry.target_filename().to_string(), entry.id().to_string());
            catalog.by_id.insert(entry.id().to_string(), catalog.entries.len());
            catalog.entries.push(Arc::new(entry));
        }

        Ok(catalog)
    }

    /// Parse a TOML manifest of `[[entry]]` tables.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(source)?;
        let entries = manifest
            .entries
            .into_iter()
            .map(|entry| entry.into_builder().build())
            .collect::<Result<Vec<_>>>()?;
        Self::new(entries)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path:   path.to_path_buf(),
            source: e,
        })?;
        let catalog = Self::from_toml_str(&source)?;
        debug!(path = %path.display(), entries = catalog.len(), "loaded catalog");
        Ok(catalog)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Catalog for StaticCatalog {
    fn list_entries(&self) -> Vec<Arc<CatalogEntry>> { self.entries.clone() }

    fn find_entry(&self, id: &str) -> Option<Arc<CatalogEntry>> {
        self.by_id.get(id).map(|&index| Arc::clone(&self.entries[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, url: &str) -> CatalogEntry { CatalogEntry::builder(id, url).build().unwrap() }

    #[test]
    fn test_find_and_list() {
        let catalog = StaticCatalog::new([
            entry("a", "https://example.org/a.bin"),
            entry("b", "https://example.org/b.bin"),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.find_entry("b").unwrap().target_filename(), "b.bin");
        assert!(catalog.find_entry("c").is_none());

        let ids: Vec<_> = catalog.list_entries().iter().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_duplicate_id() {
        let err = StaticCatalog::new([
            entry("a", "https://example.org/a.bin"),
            entry("a", "https://example.org/other.bin"),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_shared_filename() {
        let err = StaticCatalog::new([
            entry("a", "https://one.example.org/m.bin"),
            entry("b", "https://two.example.org/m.bin"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DuplicateFilename { ref first, ref second, .. } if first == "a" && second == "b"
        ));
    }

    #[test]
    fn test_sidecar_filename_rejected() {
        for filename in ["x.part.meta", "x.part.meta.tmp"] {
            let source = format!(
                r#"
                [[entry]]
                id = "a"
                url = "https://example.org/a.bin"
                filename = "{filename}"

                [[entry]]
                id = "b"
                url = "https://example.org/b.bin"
                filename = "x"
                "#
            );
            let err = StaticCatalog::from_toml_str(&source).unwrap_err();
            assert!(matches!(err, CatalogError::Filename { ref id, .. } if id == "a"), "{filename}: {err}");
        }
    }

    #[test]
    fn test_arc_catalog() {
        let catalog = Arc::new(StaticCatalog::new([entry("a", "https://example.org/a.bin")]).unwrap());
        assert!(Catalog::find_entry(&catalog, "a").is_some());
    }
}
