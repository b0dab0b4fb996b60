use async_trait::async_trait;
use scanmap_protocol::LocalUri;
use std::path::{Path, PathBuf};

/// The only filesystem capability resolution needs: "does this candidate
/// exist". Implementations never error outward; a probe failure (permissions,
/// bad path) reads as `false` and resolution moves on to the next strategy.
#[async_trait]
pub trait ExistenceProber: Send + Sync {
    async fn exists(&self, uri: &LocalUri) -> bool;
}

/// Real-filesystem prober over `file://` URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProber;

#[async_trait]
impl ExistenceProber for FsProber {
    async fn exists(&self, uri: &LocalUri) -> bool {
        let Some(path) = local_uri_to_path(uri) else {
            return false;
        };
        tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}

/// Convert a `file://` URI (or a bare path) to a filesystem path. Returns
/// `None` for non-file schemes.
#[must_use]
pub fn local_uri_to_path(uri: &LocalUri) -> Option<PathBuf> {
    let raw = uri.as_str();
    if let Some(rest) = raw.strip_prefix("file://") {
        let path = rest.strip_prefix('/').map_or(rest, |tail| {
            // Windows drive URIs look like file:///c:/..., Unix like file:///home.
            if tail.as_bytes().get(1) == Some(&b':') {
                tail
            } else {
                rest
            }
        });
        return Some(PathBuf::from(path));
    }
    if raw.contains("://") {
        return None;
    }
    Some(PathBuf::from(raw))
}

/// Build a `file://` URI from a filesystem path, forward-slashed.
#[must_use]
pub fn local_uri_from_path(path: &Path) -> LocalUri {
    let display = path.display().to_string().replace('\\', "/");
    if display.starts_with('/') {
        LocalUri::new(format!("file://{display}"))
    } else {
        LocalUri::new(format!("file:///{display}"))
    }
}
