use crate::diagnostic::Diagnostic;
use crate::error::{CollectionError, Result};
use crate::sink::{ProblemItem, ProblemListSink};
use log::{debug, error, info};
use scanmap_protocol::{DiagnosticsChange, LocalUri, Region, ResultKey, Severity};
use scanmap_rebase::{NormalizedKey, PathNormalizer, PickPolicy, UriRebaser};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

pub const DEFAULT_MAX_DIAGNOSTICS_PER_FILE: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct CollectionConfig {
    /// Per-file display ceiling; overflow is truncated behind a synthetic
    /// notice occupying the first slot.
    pub max_diagnostics_per_file: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_diagnostics_per_file: DEFAULT_MAX_DIAGNOSTICS_PER_FILE,
        }
    }
}

/// Owns the two diagnostic partitions and keeps the host problem list in
/// step while resolutions cascade.
///
/// Every diagnostic lives in exactly one partition, keyed by its current
/// URI's normalized form: unmapped entries under their artifact URI, mapped
/// entries under the probe-confirmed local URI.
pub struct DiagnosticCollection {
    rebaser: Arc<Mutex<UriRebaser>>,
    normalizer: PathNormalizer,
    sink: Box<dyn ProblemListSink>,
    config: CollectionConfig,
    mapped: HashMap<NormalizedKey, Vec<Diagnostic>>,
    unmapped: HashMap<NormalizedKey, Vec<Diagnostic>>,
    change_tx: broadcast::Sender<DiagnosticsChange>,
    remap_in_flight: bool,
    synced_uris: HashSet<String>,
}

impl DiagnosticCollection {
    #[must_use]
    pub fn new(
        rebaser: Arc<Mutex<UriRebaser>>,
        normalizer: PathNormalizer,
        sink: Box<dyn ProblemListSink>,
        config: CollectionConfig,
    ) -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            rebaser,
            normalizer,
            sink,
            config,
            mapped: HashMap::new(),
            unmapped: HashMap::new(),
            change_tx,
            remap_in_flight: false,
            synced_uris: HashSet::new(),
        }
    }

    #[must_use]
    pub fn subscribe_changes(&self) -> broadcast::Receiver<DiagnosticsChange> {
        self.change_tx.subscribe()
    }

    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.mapped.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn unmapped_len(&self) -> usize {
        self.unmapped.values().map(Vec::len).sum()
    }

    pub fn mapped(&self) -> impl Iterator<Item = &Diagnostic> {
        self.mapped.values().flatten()
    }

    pub fn unmapped(&self) -> impl Iterator<Item = &Diagnostic> {
        self.unmapped.values().flatten()
    }

    #[must_use]
    pub fn find(&self, key: ResultKey) -> Option<&Diagnostic> {
        self.mapped()
            .chain(self.unmapped())
            .find(|d| d.key == key)
    }

    /// Bucket one diagnostic by its location and announce the addition.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        let key = diagnostic.key;
        let partition_key = self.partition_key(&diagnostic);
        if diagnostic.location.mapped() {
            self.mapped.entry(partition_key).or_default().push(diagnostic);
        } else {
            self.unmapped
                .entry(partition_key)
                .or_default()
                .push(diagnostic);
        }
        let _ = self.change_tx.send(DiagnosticsChange::added(vec![key]));
    }

    pub fn add_run(&mut self, diagnostics: Vec<Diagnostic>) {
        for diagnostic in diagnostics {
            self.add(diagnostic);
        }
    }

    /// Attempt resolution for every unmapped diagnostic, in key order. Each
    /// success triggers the cascade, so later entries are often already moved
    /// by the time the loop reaches them.
    pub async fn resolve_all(&mut self, policy: PickPolicy) -> Result<()> {
        let mut pending: Vec<ResultKey> = self.unmapped().map(|d| d.key).collect();
        pending.sort();
        for key in pending {
            let Some(artifact) = self
                .unmapped()
                .find(|d| d.key == key)
                .and_then(|d| d.location.artifact_uri().cloned())
            else {
                continue;
            };
            let resolved = {
                let mut rebaser = self.rebaser.lock().await;
                rebaser.translate_artifact_to_local(&artifact, policy).await
            };
            if let Some(local) = resolved {
                self.location_mapped(key, local).await?;
            }
        }
        Ok(())
    }

    /// A resolution succeeded for `key`: move it to the mapped partition and
    /// cascade. The cascade retries every remaining unmapped diagnostic with
    /// automatic strategies only, since the newly learned base pair may now
    /// resolve them silently; it runs at most one walk at a time and resyncs
    /// the problem list exactly once per completed walk.
    ///
    /// Calling this for an already-mapped key is a no-op.
    pub async fn location_mapped(&mut self, key: ResultKey, local: LocalUri) -> Result<()> {
        if self.mapped().any(|d| d.key == key) {
            debug!("location_mapped for already-mapped {key:?}; ignoring");
            return Ok(());
        }
        let slot = self.find_unmapped_slot(key).ok_or_else(|| {
            error!("diagnostic {key:?} missing from the unmapped partition");
            CollectionError::PartitionDrift { key }
        })?;
        self.move_to_mapped(slot, key, local)?;

        if self.remap_in_flight {
            // The in-flight walk iterates the full unmapped set; it will see
            // whatever this trigger implies. Never start a second walk.
            return Ok(());
        }
        self.remap_in_flight = true;
        let walked = self.cascade_walk().await;
        self.remap_in_flight = false;
        walked?;
        self.sync_problem_list();
        Ok(())
    }

    /// Rebuild the externally visible problem list from both partitions.
    /// Unmapped diagnostics stay visible under their artifact URI, flagged so
    /// the user knows a manual pick would help.
    pub fn sync_problem_list(&mut self) {
        let max = self.config.max_diagnostics_per_file.max(1);
        let mut current: HashSet<String> = HashSet::new();
        for (partition, unmapped) in [(&self.mapped, false), (&self.unmapped, true)] {
            for diags in partition.values() {
                let Some(uri) = diags.first().and_then(|d| d.location.uri_str()) else {
                    continue;
                };
                let uri = uri.to_string();
                let total = diags.len();
                let mut items: Vec<ProblemItem> =
                    diags.iter().map(|d| to_problem_item(d, unmapped)).collect();
                if total > max {
                    items.truncate(max - 1);
                    items.insert(
                        0,
                        ProblemItem {
                            region: Region::line(1),
                            message: format!("{} of {total} results shown (list truncated)", max - 1),
                            severity: Severity::Error,
                            code: None,
                            source: "scanmap".to_string(),
                        },
                    );
                }
                self.sink.replace(&uri, items);
                current.insert(uri);
            }
        }
        for stale in self.synced_uris.difference(&current) {
            self.sink.replace(stale, Vec::new());
        }
        self.synced_uris = current;
        let _ = self.change_tx.send(DiagnosticsChange::synchronized());
    }

    /// Drop every diagnostic that came from `log_uri`.
    pub fn remove_runs(&mut self, log_uri: &LocalUri) {
        let removed = self.drain_matching(|d| &d.log_uri == log_uri);
        info!("removed {} diagnostics from {log_uri}", removed.len());
        if !removed.is_empty() {
            let _ = self.change_tx.send(DiagnosticsChange::removed(removed));
        }
        self.sync_problem_list();
    }

    pub fn remove_all(&mut self) {
        let removed = self.drain_matching(|_| true);
        if !removed.is_empty() {
            let _ = self.change_tx.send(DiagnosticsChange::removed(removed));
        }
        self.sync_problem_list();
    }

    fn drain_matching(&mut self, predicate: impl Fn(&Diagnostic) -> bool) -> Vec<ResultKey> {
        let mut removed = Vec::new();
        for partition in [&mut self.mapped, &mut self.unmapped] {
            partition.retain(|_, diags| {
                diags.retain(|d| {
                    if predicate(d) {
                        removed.push(d.key);
                        false
                    } else {
                        true
                    }
                });
                !diags.is_empty()
            });
        }
        removed.sort();
        removed
    }

    fn partition_key(&self, diagnostic: &Diagnostic) -> NormalizedKey {
        self.normalizer
            .normalize(diagnostic.location.uri_str().unwrap_or(""))
    }

    fn find_unmapped_slot(&self, key: ResultKey) -> Option<(NormalizedKey, usize)> {
        for (pkey, diags) in &self.unmapped {
            if let Some(idx) = diags.iter().position(|d| d.key == key) {
                return Some((pkey.clone(), idx));
            }
        }
        None
    }

    fn move_to_mapped(
        &mut self,
        (pkey, idx): (NormalizedKey, usize),
        key: ResultKey,
        local: LocalUri,
    ) -> Result<()> {
        let diags = self
            .unmapped
            .get_mut(&pkey)
            .ok_or(CollectionError::PartitionDrift { key })?;
        if idx >= diags.len() || diags[idx].key != key {
            error!("diagnostic {key:?} moved out from under the cascade");
            return Err(CollectionError::PartitionDrift { key });
        }
        let mut diagnostic = diags.remove(idx);
        if diags.is_empty() {
            self.unmapped.remove(&pkey);
        }
        diagnostic.location.promote(local.clone());
        self.mapped
            .entry(self.normalizer.normalize(local.as_str()))
            .or_default()
            .push(diagnostic);
        Ok(())
    }

    /// One cascade pass. Phase one walks the whole unmapped set and records
    /// (partition key, index) for each entry automatic resolution now covers;
    /// phase two removes them in descending index order per key so earlier
    /// indices stay valid. Mutating while iterating across awaits would
    /// invalidate the indices mid-walk.
    async fn cascade_walk(&mut self) -> Result<()> {
        let rebaser = self.rebaser.clone();
        let mut resolved: Vec<(NormalizedKey, usize, ResultKey, LocalUri)> = Vec::new();

        let mut partition_keys: Vec<NormalizedKey> = self.unmapped.keys().cloned().collect();
        partition_keys.sort();
        for pkey in partition_keys {
            let Some(diags) = self.unmapped.get(&pkey) else {
                continue;
            };
            for (idx, diag) in diags.iter().enumerate() {
                let Some(artifact) = diag.location.artifact_uri() else {
                    continue;
                };
                let got = {
                    let mut rebaser = rebaser.lock().await;
                    rebaser.resolve_auto(artifact).await
                };
                if let Some(local) = got {
                    resolved.push((pkey.clone(), idx, diag.key, local));
                }
            }
        }

        debug!("cascade resolved {} additional diagnostics", resolved.len());
        resolved.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        for (pkey, idx, key, local) in resolved {
            self.move_to_mapped((pkey, idx), key, local)?;
        }
        Ok(())
    }
}

fn to_problem_item(diagnostic: &Diagnostic, unmapped: bool) -> ProblemItem {
    let message = if unmapped {
        format!("[unmapped] {}", diagnostic.message)
    } else {
        diagnostic.message.clone()
    };
    ProblemItem {
        region: diagnostic.location.region,
        message,
        severity: diagnostic.severity,
        code: diagnostic.rule_id.clone(),
        source: diagnostic.tool.clone(),
    }
}
