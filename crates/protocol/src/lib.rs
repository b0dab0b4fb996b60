use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod location;
mod request;

pub use location::{Location, LocationUri, Region};
pub use request::{parse_host_request, HostRequest};

pub const HOST_REQUEST_SCHEMA_VERSION: u32 = 1;

/// A file identifier exactly as recorded in a static-analysis log, relative to
/// the environment that produced the log. Opaque; never assumed to exist on
/// the consumer's machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ArtifactUri(String);

impl ArtifactUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ArtifactUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file identifier valid in the consumer's file system. May or may not
/// currently exist on disk; only the rebaser's existence prober decides that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LocalUri(String);

impl LocalUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for LocalUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// Stable identity of one finding: the run it came from and its index inside
/// that run. Survives remapping; used to address diagnostics across the
/// host boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct ResultKey {
    pub run_id: u32,
    pub result_id: u32,
}

impl ResultKey {
    #[must_use]
    pub fn new(run_id: u32, result_id: u32) -> Self {
        Self { run_id, result_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Remove,
    Synchronize,
}

/// Change notification delivered to the surrounding UI layer. `Add`/`Remove`
/// events carry the affected keys in operation order; `Synchronize` follows a
/// completed batch of partition mutations and carries no keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiagnosticsChange {
    pub kind: ChangeKind,
    #[serde(default)]
    pub keys: Vec<ResultKey>,
}

impl DiagnosticsChange {
    #[must_use]
    pub fn added(keys: Vec<ResultKey>) -> Self {
        Self {
            kind: ChangeKind::Add,
            keys,
        }
    }

    #[must_use]
    pub fn removed(keys: Vec<ResultKey>) -> Self {
        Self {
            kind: ChangeKind::Remove,
            keys,
        }
    }

    #[must_use]
    pub fn synchronized() -> Self {
        Self {
            kind: ChangeKind::Synchronize,
            keys: Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed host request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid host request: {0}")]
    Invalid(String),
}
