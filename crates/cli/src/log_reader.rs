use anyhow::{Context as AnyhowContext, Result};
use scanmap_diagnostics::Diagnostic;
use scanmap_protocol::{ArtifactUri, LocalUri, Location, Region, ResultKey, Severity};
use serde::Deserialize;
use std::path::Path;

// Log parsing proper belongs to the log-reader collaborator; this model
// covers exactly the fields the rebasing engine consumes.

#[derive(Debug, Deserialize)]
struct AnalysisLog {
    #[serde(default)]
    runs: Vec<LogRun>,
}

#[derive(Debug, Deserialize)]
struct LogRun {
    tool: Tool,
    #[serde(default)]
    results: Vec<LogResult>,
}

#[derive(Debug, Deserialize)]
struct Tool {
    driver: Driver,
}

#[derive(Debug, Deserialize)]
struct Driver {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogResult {
    rule_id: Option<String>,
    level: Option<String>,
    message: Option<Message>,
    #[serde(default)]
    locations: Vec<LogLocation>,
}

#[derive(Debug, Deserialize)]
struct Message {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogLocation {
    physical_location: PhysicalLocation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhysicalLocation {
    artifact_location: ArtifactLocation,
    region: Option<LogRegion>,
}

#[derive(Debug, Deserialize)]
struct ArtifactLocation {
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogRegion {
    start_line: Option<u32>,
    start_column: Option<u32>,
    end_line: Option<u32>,
    end_column: Option<u32>,
}

#[derive(Debug)]
pub struct LoadedLog {
    pub diagnostics: Vec<Diagnostic>,
    pub artifacts: Vec<ArtifactUri>,
    pub runs_loaded: u32,
}

/// Read one analysis log, numbering its runs from `first_run_id`.
pub fn read_log(path: &Path, log_uri: &LocalUri, first_run_id: u32) -> Result<LoadedLog> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading log {}", path.display()))?;
    let log: AnalysisLog =
        serde_json::from_str(&raw).with_context(|| format!("parsing log {}", path.display()))?;

    let mut diagnostics = Vec::new();
    let mut artifacts = Vec::new();
    let runs_loaded = u32::try_from(log.runs.len()).unwrap_or(u32::MAX);
    for (run_idx, run) in log.runs.into_iter().enumerate() {
        let run_id = first_run_id + u32::try_from(run_idx).unwrap_or(u32::MAX);
        for (result_idx, result) in run.results.into_iter().enumerate() {
            let key = ResultKey::new(run_id, u32::try_from(result_idx).unwrap_or(u32::MAX));
            let location = match result.locations.first() {
                Some(loc) => {
                    let artifact = ArtifactUri::new(loc.physical_location.artifact_location.uri.clone());
                    artifacts.push(artifact.clone());
                    Location::artifact(artifact, to_region(loc.physical_location.region.as_ref()))
                }
                None => Location::unresolved(Region::default()),
            };
            diagnostics.push(Diagnostic {
                key,
                location,
                message: result.message.map(|m| m.text).unwrap_or_default(),
                severity: to_severity(result.level.as_deref()),
                rule_id: result.rule_id,
                tool: run.tool.driver.name.clone(),
                log_uri: log_uri.clone(),
            });
        }
    }
    Ok(LoadedLog {
        diagnostics,
        artifacts,
        runs_loaded,
    })
}

fn to_severity(level: Option<&str>) -> Severity {
    match level {
        Some("error") => Severity::Error,
        Some("warning") => Severity::Warning,
        _ => Severity::Note,
    }
}

fn to_region(region: Option<&LogRegion>) -> Region {
    let Some(region) = region else {
        return Region::default();
    };
    let start_line = region.start_line.unwrap_or(1);
    Region {
        start_line,
        start_col: region.start_column.unwrap_or(0),
        end_line: region.end_line.unwrap_or(start_line),
        end_col: region.end_column.unwrap_or(0),
    }
}
