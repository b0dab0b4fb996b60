use crate::normalize::PathNormalizer;
use crate::Result;
use log::{debug, warn};
use scanmap_protocol::{ArtifactUri, LocalUri};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const BASE_CACHE_SCHEMA_VERSION: u32 = 1;

/// One learned base pair: any artifact URI beginning with `artifact_base` can
/// be rewritten by substituting `local_base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseUriCacheEntry {
    pub artifact_base: String,
    pub local_base: LocalUri,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedBaseCache {
    schema_version: u32,
    entries: Vec<BaseUriCacheEntry>,
}

/// Learned (artifact-prefix, local-prefix) pairs, most specific first.
///
/// Holds at most one entry per distinct normalized artifact prefix: inserting
/// the exact prefix again replaces the pair, while a longer refinement
/// coexists and wins lookups by the longest-prefix-first scan order.
#[derive(Debug, Clone)]
pub struct BaseUriCache {
    normalizer: PathNormalizer,
    entries: Vec<BaseUriCacheEntry>,
}

impl BaseUriCache {
    #[must_use]
    pub fn new(normalizer: PathNormalizer) -> Self {
        Self {
            normalizer,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[BaseUriCacheEntry] {
        &self.entries
    }

    pub fn insert(&mut self, artifact_base: impl Into<String>, local_base: LocalUri) {
        let artifact_base = artifact_base.into();
        let normalizer = self.normalizer;
        let key = normalizer.normalize(&artifact_base);
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| normalizer.normalize(&e.artifact_base) == key)
        {
            existing.artifact_base = artifact_base;
            existing.local_base = local_base;
            return;
        }
        debug!("learned base pair: {artifact_base} -> {local_base}");
        // Descending prefix length keeps lookups most-specific-first; insertion
        // order breaks ties between equal lengths.
        let len = key.as_str().len();
        let pos = self
            .entries
            .iter()
            .position(|e| e.artifact_base.len() < len)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            pos,
            BaseUriCacheEntry {
                artifact_base,
                local_base,
            },
        );
    }

    /// Candidate local URIs for `artifact`, most specific base first. Callers
    /// accept the first candidate the existence prober confirms.
    #[must_use]
    pub fn candidates(&self, artifact: &ArtifactUri) -> Vec<LocalUri> {
        self.entries
            .iter()
            .filter(|e| self.normalizer.has_prefix(artifact.as_str(), &e.artifact_base))
            .map(|e| {
                // Normalization is length-preserving, so the raw tail can be
                // sliced at the prefix length.
                let tail = &artifact.as_str()[e.artifact_base.len()..];
                LocalUri::new(rewrite(e.local_base.as_str(), tail))
            })
            .collect()
    }

    /// Inverse direction: artifact candidates for a local URI, most specific
    /// local base first.
    #[must_use]
    pub fn reverse_candidates(&self, local: &LocalUri) -> Vec<ArtifactUri> {
        let mut matching: Vec<&BaseUriCacheEntry> = self
            .entries
            .iter()
            .filter(|e| self.normalizer.has_prefix(local.as_str(), e.local_base.as_str()))
            .collect();
        matching.sort_by(|a, b| b.local_base.as_str().len().cmp(&a.local_base.as_str().len()));
        matching
            .into_iter()
            .map(|e| {
                let tail = &local.as_str()[e.local_base.as_str().len()..];
                ArtifactUri::new(rewrite(&e.artifact_base, tail))
            })
            .collect()
    }

    /// Load a persisted cache, treating a missing file as empty and a schema
    /// mismatch as empty (with a warning) rather than an error.
    pub async fn load(path: &Path, normalizer: PathNormalizer) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(normalizer));
        }
        let bytes = tokio::fs::read(path).await?;
        let persisted: PersistedBaseCache = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != BASE_CACHE_SCHEMA_VERSION {
            warn!(
                "base cache at {} has schema {} (expected {}); starting empty",
                path.display(),
                persisted.schema_version,
                BASE_CACHE_SCHEMA_VERSION
            );
            return Ok(Self::new(normalizer));
        }
        let mut cache = Self::new(normalizer);
        for entry in persisted.entries {
            cache.insert(entry.artifact_base, entry.local_base);
        }
        Ok(cache)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted = PersistedBaseCache {
            schema_version: BASE_CACHE_SCHEMA_VERSION,
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn rewrite(base: &str, tail: &str) -> String {
    let mut out = String::from(base.trim_end_matches(['/', '\\']));
    if out.ends_with(':') {
        out.push_str("//");
    }
    for seg in tail.split(['/', '\\']).filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(seg);
    }
    out
}
