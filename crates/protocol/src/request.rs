use crate::{LocalUri, ProtocolError, Result, ResultKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Closed set of requests accepted from the host boundary (command API,
/// panels). Each variant carries exactly the fields that request kind needs;
/// anything else fails deserialization instead of being silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum HostRequest {
    OpenLog { path: String },
    CloseLog { path: String },
    CloseAllLogs,
    RemapResult { key: ResultKey },
    AddUriBase { base: LocalUri },
}

/// Parse and validate one host request from raw JSON.
pub fn parse_host_request(raw: &str) -> Result<HostRequest> {
    let request: HostRequest = serde_json::from_str(raw)?;
    match &request {
        HostRequest::OpenLog { path } | HostRequest::CloseLog { path } => {
            if path.trim().is_empty() {
                return Err(ProtocolError::Invalid("log path must not be empty".into()));
            }
        }
        HostRequest::AddUriBase { base } => {
            if base.as_str().trim().is_empty() {
                return Err(ProtocolError::Invalid("uri base must not be empty".into()));
            }
        }
        HostRequest::CloseAllLogs | HostRequest::RemapResult { .. } => {}
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_open_log() {
        let req = parse_host_request(r#"{"type":"open_log","path":"/tmp/scan.sarif"}"#).unwrap();
        assert_eq!(
            req,
            HostRequest::OpenLog {
                path: "/tmp/scan.sarif".into()
            }
        );
    }

    #[test]
    fn parses_remap_result() {
        let req =
            parse_host_request(r#"{"type":"remap_result","key":{"run_id":1,"result_id":4}}"#)
                .unwrap();
        assert_eq!(
            req,
            HostRequest::RemapResult {
                key: ResultKey::new(1, 4)
            }
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(parse_host_request(r#"{"type":"reticulate"}"#).is_err());
    }

    #[test]
    fn rejects_extra_fields() {
        assert!(parse_host_request(r#"{"type":"close_all_logs","path":"x"}"#).is_err());
    }

    #[test]
    fn rejects_empty_path() {
        assert!(parse_host_request(r#"{"type":"open_log","path":"  "}"#).is_err());
    }
}
