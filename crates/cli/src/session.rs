use crate::host::PromptPicker;
use crate::log_reader::read_log;
use anyhow::{Context as AnyhowContext, Result};
use log::{debug, info};
use scanmap_diagnostics::{
    CollectionConfig, DiagnosticCollection, SharedMemorySink, DEFAULT_MAX_DIAGNOSTICS_PER_FILE,
};
use scanmap_protocol::{ArtifactUri, LocalUri, ResultKey};
use scanmap_rebase::{
    local_uri_from_path, BaseUriCache, DistinctNameIndex, FilePicker, FsProber, NoPicker,
    PathNormalizer, PickPolicy, UriRebaser,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub uri_bases: Vec<LocalUri>,
    pub max_diagnostics_per_file: usize,
    pub cache_path: Option<PathBuf>,
    pub interactive: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            uri_bases: Vec::new(),
            max_diagnostics_per_file: DEFAULT_MAX_DIAGNOSTICS_PER_FILE,
            cache_path: None,
            interactive: true,
        }
    }
}

/// One host session: the rebaser, the diagnostic collection, and the set of
/// open logs. Owns the distinct-name index rebuild whenever that set changes.
pub struct Session {
    rebaser: Arc<Mutex<UriRebaser>>,
    collection: DiagnosticCollection,
    sink: SharedMemorySink,
    normalizer: PathNormalizer,
    cache_path: Option<PathBuf>,
    interactive: bool,
    /// Artifact URIs per open log, keyed by log URI; the union feeds the
    /// distinct-name index.
    artifacts_by_log: HashMap<String, Vec<ArtifactUri>>,
    next_run_id: u32,
}

impl Session {
    pub async fn create(options: SessionOptions) -> Result<Self> {
        let normalizer = PathNormalizer::platform();
        let cache = match &options.cache_path {
            Some(path) => BaseUriCache::load(path, normalizer)
                .await
                .with_context(|| format!("loading base-URI cache {}", path.display()))?,
            None => BaseUriCache::new(normalizer),
        };
        let picker: Arc<dyn FilePicker> = if options.interactive {
            Arc::new(PromptPicker)
        } else {
            Arc::new(NoPicker)
        };
        let mut rebaser = UriRebaser::new(
            normalizer,
            DistinctNameIndex::empty(normalizer),
            Arc::new(FsProber),
            picker,
        )
        .with_cache(cache);
        rebaser.set_uri_bases(options.uri_bases);
        let rebaser = Arc::new(Mutex::new(rebaser));

        let sink = SharedMemorySink::new();
        let collection = DiagnosticCollection::new(
            Arc::clone(&rebaser),
            normalizer,
            Box::new(sink.clone()),
            CollectionConfig {
                max_diagnostics_per_file: options.max_diagnostics_per_file,
            },
        );
        Ok(Self {
            rebaser,
            collection,
            sink,
            normalizer,
            cache_path: options.cache_path,
            interactive: options.interactive,
            artifacts_by_log: HashMap::new(),
            next_run_id: 0,
        })
    }

    #[must_use]
    pub fn sink(&self) -> &SharedMemorySink {
        &self.sink
    }

    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.collection.mapped_len()
    }

    #[must_use]
    pub fn unmapped_len(&self) -> usize {
        self.collection.unmapped_len()
    }

    /// Ingest a log, try to resolve everything it brought in, and persist
    /// whatever the cache learned along the way.
    pub async fn open_log(&mut self, path: &Path) -> Result<()> {
        let log_uri = local_uri_from_path(path);
        let loaded = read_log(path, &log_uri, self.next_run_id)?;
        info!(
            "opened {log_uri}: {} runs, {} results",
            loaded.runs_loaded,
            loaded.diagnostics.len()
        );
        self.next_run_id += loaded.runs_loaded;
        self.artifacts_by_log
            .insert(log_uri.as_str().to_string(), loaded.artifacts);
        self.rebuild_distinct_names().await;

        self.collection.add_run(loaded.diagnostics);
        self.collection.resolve_all(self.default_policy()).await?;
        self.collection.sync_problem_list();
        self.save_cache().await
    }

    pub async fn close_log(&mut self, path: &Path) -> Result<()> {
        let log_uri = local_uri_from_path(path);
        if self.artifacts_by_log.remove(log_uri.as_str()).is_none() {
            debug!("close for log that was never opened: {log_uri}");
        }
        self.rebuild_distinct_names().await;
        self.collection.remove_runs(&log_uri);
        Ok(())
    }

    pub async fn close_all_logs(&mut self) -> Result<()> {
        self.artifacts_by_log.clear();
        self.rebuild_distinct_names().await;
        self.collection.remove_all();
        Ok(())
    }

    /// Explicit remap request for one result: always allowed to prompt, even
    /// for an artifact the user previously declined.
    pub async fn remap_result(&mut self, key: ResultKey) -> Result<bool> {
        let Some(artifact) = self
            .collection
            .find(key)
            .and_then(|d| d.location.artifact_uri().cloned())
        else {
            debug!("remap requested for unknown or already-mapped {key:?}");
            return Ok(false);
        };
        let policy = if self.interactive {
            PickPolicy::Prompt
        } else {
            PickPolicy::Never
        };
        let resolved = {
            let mut rebaser = self.rebaser.lock().await;
            rebaser.translate_artifact_to_local(&artifact, policy).await
        };
        let Some(local) = resolved else {
            return Ok(false);
        };
        self.collection.location_mapped(key, local).await?;
        self.save_cache().await?;
        Ok(true)
    }

    /// Add a candidate base and silently retry everything still unmapped.
    pub async fn add_uri_base(&mut self, base: LocalUri) -> Result<()> {
        self.rebaser.lock().await.add_uri_base(base);
        self.collection.resolve_all(PickPolicy::Never).await?;
        self.collection.sync_problem_list();
        self.save_cache().await
    }

    fn default_policy(&self) -> PickPolicy {
        if self.interactive {
            PickPolicy::IfNotDeclined
        } else {
            PickPolicy::Never
        }
    }

    async fn rebuild_distinct_names(&mut self) {
        let all: Vec<ArtifactUri> = self
            .artifacts_by_log
            .values()
            .flatten()
            .cloned()
            .collect();
        let index = DistinctNameIndex::build(self.normalizer, all);
        self.rebaser.lock().await.set_distinct_names(index);
    }

    async fn save_cache(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        let rebaser = self.rebaser.lock().await;
        rebaser
            .cache()
            .save(path)
            .await
            .with_context(|| format!("saving base-URI cache {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const LOG: &str = r#"{
        "runs": [{
            "tool": {"driver": {"name": "analyzer"}},
            "results": [{
                "ruleId": "SA1",
                "level": "error",
                "message": {"text": "boom"},
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": {"uri": "file:///ci/src/a.c"},
                        "region": {"startLine": 3}
                    }
                }]
            }]
        }]
    }"#;

    #[tokio::test]
    async fn open_log_resolves_against_a_real_base() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        fs::write(src.join("a.c"), "int main;").expect("write");
        let log_path = dir.path().join("scan.sarif");
        fs::write(&log_path, LOG).expect("write log");

        let mut session = Session::create(SessionOptions {
            uri_bases: vec![local_uri_from_path(dir.path())],
            interactive: false,
            ..SessionOptions::default()
        })
        .await
        .expect("session");

        session.open_log(&log_path).await.expect("open");
        assert_eq!(session.mapped_len(), 1);
        assert_eq!(session.unmapped_len(), 0);

        session.close_log(&log_path).await.expect("close");
        assert_eq!(session.mapped_len(), 0);
    }

    #[tokio::test]
    async fn cache_persists_across_sessions() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        fs::write(src.join("a.c"), "int main;").expect("write");
        let log_path = dir.path().join("scan.sarif");
        fs::write(&log_path, LOG).expect("write log");
        let cache_path = dir.path().join("cache.json");

        {
            let mut session = Session::create(SessionOptions {
                uri_bases: vec![local_uri_from_path(dir.path())],
                cache_path: Some(cache_path.clone()),
                interactive: false,
                ..SessionOptions::default()
            })
            .await
            .expect("session");
            session.open_log(&log_path).await.expect("open");
            assert_eq!(session.mapped_len(), 1);
        }

        // Second session gets the learned base pair without any configured
        // bases at all.
        let mut session = Session::create(SessionOptions {
            cache_path: Some(cache_path),
            interactive: false,
            ..SessionOptions::default()
        })
        .await
        .expect("session");
        session.open_log(&log_path).await.expect("open");
        assert_eq!(session.mapped_len(), 1);
        assert_eq!(session.unmapped_len(), 0);
    }
}
