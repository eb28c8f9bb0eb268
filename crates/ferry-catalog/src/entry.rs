use url::Url;

use crate::{CatalogError, Result};

/// An immutable description of one downloadable artifact.
///
/// Built through [`EntryBuilder`], which validates the source URL, the target
/// filename and the digest format. Once built an entry never changes; catalogs
/// hand them out behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    id:                  String,
    source_url:          Url,
    expected_size_bytes: Option<u64>,
    expected_digest:     String,
    target_filename:     String,
    name:                Option<String>,
    description:         Option<String>,
}

impl CatalogEntry {
    pub fn builder(id: impl Into<String>, source_url: impl Into<String>) -> EntryBuilder {
        EntryBuilder {
            id:              id.into(),
            source_url:      source_url.into(),
            size:            None,
            digest:          String::new(),
            target_filename: None,
            name:            None,
            description:     None,
        }
    }

    pub fn id(&self) -> &str { &self.id }

    pub fn source_url(&self) -> &Url { &self.source_url }

    /// Advisory size; the server's answer wins when they disagree.
    pub fn expected_size_bytes(&self) -> Option<u64> { self.expected_size_bytes }

    /// Hex digest, optionally `algorithm:`-prefixed. Empty means unverified.
    pub fn expected_digest(&self) -> &str { &self.expected_digest }

    pub fn is_verified(&self) -> bool { !self.expected_digest.is_empty() }

    pub fn target_filename(&self) -> &str { &self.target_filename }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str { self.name.as_deref().unwrap_or(&self.id) }

    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
}

/// Validating builder for [`CatalogEntry`].
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    id:              String,
    source_url:      String,
    size:            Option<u64>,
    digest:          String,
    target_filename: Option<String>,
    name:            Option<String>,
    description:     Option<String>,
}

impl EntryBuilder {
    pub fn size(mut self, bytes: u64) -> Self {
        self.size = Some(bytes);
        self
    }

    pub fn digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.target_filename = Some(filename.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build(self) -> Result<CatalogEntry> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(CatalogError::EmptyId);
        }

        let source_url = parse_source_url(&id, &self.source_url)?;

        let target_filename = match self.target_filename {
            Some(name) => name,
            None => filename_from_url(&source_url).ok_or_else(|| CatalogError::MissingFilename {
                id:  id.clone(),
                url: self.source_url.clone(),
            })?,
        };
        ferry_fs::validate_filename(&target_filename).map_err(|source| CatalogError::Filename {
            id: id.clone(),
            source,
        })?;

        let expected_digest = self.digest.trim().to_string();
        ferry_verify::ExpectedDigest::parse_optional(&expected_digest).map_err(|source| {
            CatalogError::Digest {
                id: id.clone(),
                source,
            }
        })?;

        Ok(CatalogEntry {
            id,
            source_url,
            expected_size_bytes: self.size.filter(|&n| n > 0),
            expected_digest,
            target_filename,
            name: self.name.filter(|s| !s.trim().is_empty()),
            description: self.description.filter(|s| !s.trim().is_empty()),
        })
    }
}

fn parse_source_url(id: &str, raw: &str) -> Result<Url> {
    let invalid = |reason: String| CatalogError::InvalidUrl {
        id: id.to_string(),
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "https" | "http" => {}
        scheme => return Err(invalid(format!("unsupported scheme '{scheme}'"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Last non-empty path segment of the URL.
fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}
