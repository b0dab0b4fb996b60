use crate::normalize::{file_name, NormalizedKey, PathNormalizer};
use scanmap_protocol::ArtifactUri;
use std::collections::HashMap;

/// Base file name → unique artifact URI, built once per loaded log. A name
/// that appears under more than one artifact is tombstoned and never
/// returned, so the shortcut cannot guess wrong.
#[derive(Debug, Clone)]
pub struct DistinctNameIndex {
    normalizer: PathNormalizer,
    names: HashMap<NormalizedKey, Option<ArtifactUri>>,
}

impl DistinctNameIndex {
    #[must_use]
    pub fn build(
        normalizer: PathNormalizer,
        artifacts: impl IntoIterator<Item = ArtifactUri>,
    ) -> Self {
        let mut names: HashMap<NormalizedKey, Option<ArtifactUri>> = HashMap::new();
        for artifact in artifacts {
            let name = file_name(artifact.as_str());
            if name.is_empty() {
                continue;
            }
            let key = normalizer.normalize(name);
            names
                .entry(key)
                .and_modify(|slot| {
                    let duplicate = slot
                        .as_ref()
                        .is_some_and(|existing| !normalizer.eq(existing.as_str(), artifact.as_str()));
                    if duplicate {
                        *slot = None;
                    }
                })
                .or_insert_with(|| Some(artifact.clone()));
        }
        Self { normalizer, names }
    }

    #[must_use]
    pub fn empty(normalizer: PathNormalizer) -> Self {
        Self {
            normalizer,
            names: HashMap::new(),
        }
    }

    /// Unique owner of `name`, if exactly one artifact in the log carries it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArtifactUri> {
        self.names
            .get(&self.normalizer.normalize(name))
            .and_then(Option::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
