use scanmap_protocol::{Location, LocalUri, ResultKey, Severity};
use serde::{Deserialize, Serialize};

/// One finding from an analysis log. Lives in exactly one of the collection's
/// two partitions at a time and moves (never copies) from unmapped to mapped
/// when its artifact URI resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub key: ResultKey,
    pub location: Location,
    pub message: String,
    pub severity: Severity,
    pub rule_id: Option<String>,
    /// Name of the tool that produced the finding.
    pub tool: String,
    /// The log file this finding came from; `remove_runs` drops by this.
    pub log_uri: LocalUri,
}
