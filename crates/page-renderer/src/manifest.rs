//! On-demand dynamic-import manifest.
//!
//! Code generated for each dynamic import call site embeds its own manifest
//! entry as a JSON string key. Instead of a prebuilt table, the engine is
//! handed a resolver that decodes any key it encounters.

use serde::{Deserialize, Serialize};

/// Prefix the bundler puts on chunk paths; the engine expects paths
/// relative to the build directory.
pub const CHUNK_PREFIX: &str = "_next/";

/// A manifest entry as encoded in a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    /// Module identifier.
    pub id: String,
    /// Chunk paths, as emitted by the bundler.
    pub chunks: Vec<String>,
}

/// A resolved entry, in the shape the engine consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Module identifier.
    pub id: String,
    /// Build-directory-relative files, in chunk order.
    pub files: Vec<String>,
}

impl From<ManifestItem> for ManifestEntry {
    fn from(item: ManifestItem) -> Self {
        Self {
            id: item.id,
            files: item.chunks.into_iter().map(normalize_chunk).collect(),
        }
    }
}

/// Error resolving a manifest key.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("malformed manifest key {key:?}: {source}")]
    MalformedKey {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Lookup capability for dynamic-import manifest entries.
///
/// There is nothing to enumerate: every well-formed key resolves.
pub trait LoadableManifest: Send + Sync {
    /// Resolve a key to its entry.
    fn resolve(&self, key: &str) -> Result<ManifestEntry, ManifestError>;
}

/// Resolver that decodes entries straight from their keys.
///
/// Stateless; resolving the same key twice yields the same entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicManifest;

impl LoadableManifest for DynamicManifest {
    fn resolve(&self, key: &str) -> Result<ManifestEntry, ManifestError> {
        let item: ManifestItem =
            serde_json::from_str(key).map_err(|source| ManifestError::MalformedKey {
                key: key.to_string(),
                source,
            })?;
        Ok(item.into())
    }
}

fn normalize_chunk(chunk: String) -> String {
    match chunk.strip_prefix(CHUNK_PREFIX) {
        Some(relative) => relative.to_string(),
        None => chunk,
    }
}
