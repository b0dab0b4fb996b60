use crate::{ArtifactUri, LocalUri};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Line/column range of a finding. Lines are 1-based, columns 0-based,
/// matching the usual analysis-log convention. A zero-width region is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Region {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Region {
    #[must_use]
    pub fn line(line: u32) -> Self {
        Self {
            start_line: line,
            start_col: 0,
            end_line: line,
            end_col: 0,
        }
    }
}

/// The URI side of a location. `Local` is only ever constructed after the
/// existence prober has positively confirmed the target, so "which variant"
/// and "is this mapped" cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationUri {
    Artifact { uri: ArtifactUri },
    Local { uri: LocalUri },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub uri: Option<LocationUri>,
    pub region: Region,
}

impl Location {
    #[must_use]
    pub fn artifact(uri: ArtifactUri, region: Region) -> Self {
        Self {
            uri: Some(LocationUri::Artifact { uri }),
            region,
        }
    }

    #[must_use]
    pub fn unresolved(region: Region) -> Self {
        Self { uri: None, region }
    }

    /// True once the location points at a probe-confirmed local file.
    #[must_use]
    pub fn mapped(&self) -> bool {
        matches!(self.uri, Some(LocationUri::Local { .. }))
    }

    #[must_use]
    pub fn artifact_uri(&self) -> Option<&ArtifactUri> {
        match &self.uri {
            Some(LocationUri::Artifact { uri }) => Some(uri),
            _ => None,
        }
    }

    #[must_use]
    pub fn local_uri(&self) -> Option<&LocalUri> {
        match &self.uri {
            Some(LocationUri::Local { uri }) => Some(uri),
            _ => None,
        }
    }

    /// Raw URI string regardless of which side it currently lives on.
    #[must_use]
    pub fn uri_str(&self) -> Option<&str> {
        match &self.uri {
            Some(LocationUri::Artifact { uri }) => Some(uri.as_str()),
            Some(LocationUri::Local { uri }) => Some(uri.as_str()),
            None => None,
        }
    }

    /// Rewrite this location to a confirmed local URI. Callers must only do
    /// this with a URI the existence prober has accepted.
    pub fn promote(&mut self, local: LocalUri) {
        self.uri = Some(LocationUri::Local { uri: local });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn artifact_location_is_unmapped() {
        let loc = Location::artifact(ArtifactUri::new("file:///a/b.c"), Region::line(3));
        assert_eq!(loc.mapped(), false);
        assert_eq!(loc.artifact_uri().map(ArtifactUri::as_str), Some("file:///a/b.c"));
        assert_eq!(loc.local_uri(), None);
    }

    #[test]
    fn promote_flips_mapped() {
        let mut loc = Location::artifact(ArtifactUri::new("file:///a/b.c"), Region::line(3));
        loc.promote(LocalUri::new("file:///home/me/a/b.c"));
        assert_eq!(loc.mapped(), true);
        assert_eq!(loc.artifact_uri(), None);
        assert_eq!(
            loc.local_uri().map(LocalUri::as_str),
            Some("file:///home/me/a/b.c")
        );
    }

    #[test]
    fn location_uri_serializes_tagged() {
        let loc = Location::artifact(ArtifactUri::new("http:///x/y.z"), Region::default());
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["uri"]["kind"], "artifact");
        assert_eq!(json["uri"]["uri"], "http:///x/y.z");
    }
}
