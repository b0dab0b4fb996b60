use crate::cache::BaseUriCache;
use crate::distinct::DistinctNameIndex;
use crate::normalize::{
    file_name, join_segments, segments, split_uri, strip_trailing_segments, NormalizedKey,
    PathNormalizer,
};
use crate::pick::FilePicker;
use crate::probe::ExistenceProber;
use log::{debug, info, warn};
use scanmap_protocol::{ArtifactUri, LocalUri};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const MAPPING_CHANNEL_CAPACITY: usize = 64;

/// Announced whenever any strategy confirms an artifact→local mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEvent {
    pub artifact: ArtifactUri,
    pub local: LocalUri,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickPolicy {
    /// Prompt, unless a previous pick for this artifact was cancelled.
    IfNotDeclined,
    /// Prompt even after a cancelled pick (an explicit user retry).
    Prompt,
    /// Automatic strategies only; used by the remapping cascade.
    Never,
}

/// The resolution engine: rewrites artifact URIs recorded in an analysis log
/// into URIs reachable in the consumer's file system, and back.
///
/// Strategies run in a fixed order and the first success wins: learned base
/// pairs, then the distinct-name shortcut, then the suffix-overlap search over
/// the configured bases, then (policy permitting) one interactive pick. Every
/// success except a bare cache hit teaches the cache a new base pair, which is
/// how a single pick resolves an entire tree of siblings.
pub struct UriRebaser {
    normalizer: PathNormalizer,
    cache: BaseUriCache,
    distinct: DistinctNameIndex,
    uri_bases: Vec<LocalUri>,
    prober: Arc<dyn ExistenceProber>,
    picker: Arc<dyn FilePicker>,
    declined: HashSet<NormalizedKey>,
    pick_active: Arc<AtomicBool>,
    mapping_tx: broadcast::Sender<MappingEvent>,
}

impl UriRebaser {
    #[must_use]
    pub fn new(
        normalizer: PathNormalizer,
        distinct: DistinctNameIndex,
        prober: Arc<dyn ExistenceProber>,
        picker: Arc<dyn FilePicker>,
    ) -> Self {
        let (mapping_tx, _) = broadcast::channel(MAPPING_CHANNEL_CAPACITY);
        Self {
            normalizer,
            cache: BaseUriCache::new(normalizer),
            distinct,
            uri_bases: Vec::new(),
            prober,
            picker,
            declined: HashSet::new(),
            pick_active: Arc::new(AtomicBool::new(false)),
            mapping_tx,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: BaseUriCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &BaseUriCache {
        &self.cache
    }

    #[must_use]
    pub fn normalizer(&self) -> PathNormalizer {
        self.normalizer
    }

    #[must_use]
    pub fn uri_bases(&self) -> &[LocalUri] {
        &self.uri_bases
    }

    /// Replace the distinct-name index, e.g. after another log is loaded or
    /// unloaded. Ambiguity is recomputed over the full set of open logs.
    pub fn set_distinct_names(&mut self, distinct: DistinctNameIndex) {
        self.distinct = distinct;
    }

    pub fn set_uri_bases(&mut self, bases: Vec<LocalUri>) {
        self.uri_bases = bases;
    }

    pub fn add_uri_base(&mut self, base: LocalUri) {
        self.uri_bases.push(base);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MappingEvent> {
        self.mapping_tx.subscribe()
    }

    /// Automatic strategies only (cache, distinct name, suffix overlap).
    pub async fn resolve_auto(&mut self, artifact: &ArtifactUri) -> Option<LocalUri> {
        self.translate_artifact_to_local(artifact, PickPolicy::Never)
            .await
    }

    pub async fn translate_artifact_to_local(
        &mut self,
        artifact: &ArtifactUri,
        policy: PickPolicy,
    ) -> Option<LocalUri> {
        if let Some(local) = self.try_cached(artifact).await {
            debug!("cache hit: {artifact} -> {local}");
            self.announce(artifact, &local);
            return Some(local);
        }
        if let Some(local) = self.try_distinct_name(artifact).await {
            debug!("distinct-name hit: {artifact} -> {local}");
            self.learn(artifact, &local);
            self.announce(artifact, &local);
            return Some(local);
        }
        if let Some(local) = self.try_suffix_overlap(artifact).await {
            debug!("suffix-overlap hit: {artifact} -> {local}");
            self.learn(artifact, &local);
            self.announce(artifact, &local);
            return Some(local);
        }
        match policy {
            PickPolicy::Never => None,
            PickPolicy::IfNotDeclined
                if self
                    .declined
                    .contains(&self.normalizer.normalize(artifact.as_str())) =>
            {
                debug!("skipping pick for previously declined {artifact}");
                None
            }
            PickPolicy::IfNotDeclined | PickPolicy::Prompt => self.try_pick(artifact).await,
        }
    }

    /// Inverse lookup for a local edit: which tracked artifact does this file
    /// correspond to. Walks the cache with the sides swapped, then falls back
    /// to the distinct-name map. No existence probing; the artifact side is
    /// not required to exist anywhere.
    #[must_use]
    pub fn translate_local_to_artifact(&self, local: &LocalUri) -> Option<ArtifactUri> {
        if let Some(artifact) = self.cache.reverse_candidates(local).into_iter().next() {
            return Some(artifact);
        }
        let name = file_name(local.as_str());
        if name.is_empty() {
            return None;
        }
        self.distinct.get(name).cloned()
    }

    async fn try_cached(&self, artifact: &ArtifactUri) -> Option<LocalUri> {
        for candidate in self.cache.candidates(artifact) {
            if self.prober.exists(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }

    async fn try_distinct_name(&self, artifact: &ArtifactUri) -> Option<LocalUri> {
        if self.uri_bases.is_empty() {
            return None;
        }
        let name = file_name(artifact.as_str());
        if name.is_empty() {
            return None;
        }
        let owner = self.distinct.get(name)?;
        if !self.normalizer.eq(owner.as_str(), artifact.as_str()) {
            return None;
        }
        for base in &self.uri_bases {
            let candidate = LocalUri::new(join_segments(base.as_str(), &[name]));
            if self.prober.exists(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }

    /// Trailing-segment search: suffix lengths longest first, bases in
    /// configuration order, so the outcome never depends on map iteration.
    async fn try_suffix_overlap(&self, artifact: &ArtifactUri) -> Option<LocalUri> {
        if self.uri_bases.is_empty() {
            return None;
        }
        let (_, path) = split_uri(artifact.as_str());
        let segs = segments(path);
        if segs.is_empty() {
            return None;
        }
        for take in (1..=segs.len()).rev() {
            let suffix = &segs[segs.len() - take..];
            for base in &self.uri_bases {
                for candidate in self.overlap_candidates(base.as_str(), suffix) {
                    if self.prober.exists(&candidate).await {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    /// Candidates for gluing `suffix` onto `base`: a plain append, then one
    /// candidate per occurrence of the suffix head inside the base (rightmost
    /// first), truncating the base after the match. The overlap form is what
    /// lets `/a/b/c/d.e` land on base `/x/y/b/z` as `/x/y/b/c/d.e`.
    fn overlap_candidates(&self, base: &str, suffix: &[&str]) -> Vec<LocalUri> {
        let mut out = vec![LocalUri::new(join_segments(base, suffix))];
        let base_segs = segments(split_uri(base).1);
        for (idx, seg) in base_segs.iter().enumerate().rev() {
            if self.normalizer.eq(seg, suffix[0]) {
                let drop = base_segs.len() - idx - 1;
                let truncated = strip_trailing_segments(base, drop);
                out.push(LocalUri::new(join_segments(truncated, &suffix[1..])));
            }
        }
        out
    }

    async fn try_pick(&mut self, artifact: &ArtifactUri) -> Option<LocalUri> {
        // One dialog at a time; a second caller backs off instead of stacking.
        if self.pick_active.swap(true, Ordering::SeqCst) {
            warn!("pick already in flight; not prompting for {artifact}");
            return None;
        }
        let guard = PickGuard(self.pick_active.clone());
        let picked = self.picker.pick_file(file_name(artifact.as_str())).await;
        drop(guard);

        let key = self.normalizer.normalize(artifact.as_str());
        let Some(local) = picked else {
            debug!("pick cancelled for {artifact}");
            self.declined.insert(key);
            return None;
        };
        if !self.prober.exists(&local).await {
            warn!("picked file does not exist: {local}");
            self.declined.insert(key);
            return None;
        }
        self.declined.remove(&key);
        self.learn(artifact, &local);
        self.announce(artifact, &local);
        Some(local)
    }

    /// Generalize one confirmed mapping into a base pair by stripping the
    /// longest common trailing suffix from both sides. With no shared suffix
    /// at all this degenerates to an exact pair, which is still worth keeping.
    fn learn(&mut self, artifact: &ArtifactUri, local: &LocalUri) {
        let shared = self
            .normalizer
            .common_trailing_segments(artifact.as_str(), local.as_str());
        let artifact_base = strip_trailing_segments(artifact.as_str(), shared).to_string();
        let local_base = strip_trailing_segments(local.as_str(), shared).to_string();
        info!("learned base mapping {artifact_base} -> {local_base}");
        self.cache.insert(artifact_base, LocalUri::new(local_base));
    }

    fn announce(&self, artifact: &ArtifactUri, local: &LocalUri) {
        let _ = self.mapping_tx.send(MappingEvent {
            artifact: artifact.clone(),
            local: local.clone(),
        });
    }
}

struct PickGuard(Arc<AtomicBool>);

impl Drop for PickGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::CaseSensitivity;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    struct SetProber {
        existing: HashSet<String>,
        probes: AtomicU32,
    }

    impl SetProber {
        fn new(existing: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                existing: existing.iter().map(|s| s.to_string()).collect(),
                probes: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ExistenceProber for SetProber {
        async fn exists(&self, uri: &LocalUri) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.existing.contains(uri.as_str())
        }
    }

    struct ScriptedPicker {
        responses: Mutex<VecDeque<Option<LocalUri>>>,
        calls: AtomicU32,
    }

    impl ScriptedPicker {
        fn new(responses: Vec<Option<LocalUri>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FilePicker for ScriptedPicker {
        async fn pick_file(&self, _seed_name: &str) -> Option<LocalUri> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().pop_front().flatten()
        }
    }

    fn rebaser(
        artifacts: &[&str],
        prober: Arc<SetProber>,
        picker: Arc<ScriptedPicker>,
    ) -> UriRebaser {
        let normalizer = PathNormalizer::new(CaseSensitivity::Sensitive);
        let distinct = DistinctNameIndex::build(
            normalizer,
            artifacts.iter().map(|u| ArtifactUri::new(*u)),
        );
        UriRebaser::new(normalizer, distinct, prober, picker)
    }

    #[tokio::test]
    async fn cache_hit_resolves_without_bases_or_picker() {
        let prober = SetProber::new(&["file:///home/me/proj/src/a.rs"]);
        let picker = ScriptedPicker::new(vec![]);
        let mut rb = rebaser(&[], prober, picker.clone());
        rb.cache
            .insert("file:///build", LocalUri::new("file:///home/me/proj"));

        let got = rb
            .translate_artifact_to_local(
                &ArtifactUri::new("file:///build/src/a.rs"),
                PickPolicy::IfNotDeclined,
            )
            .await;
        assert_eq!(got, Some(LocalUri::new("file:///home/me/proj/src/a.rs")));
        assert_eq!(picker.calls(), 0);
    }

    #[tokio::test]
    async fn nothing_configured_prompts_at_most_once() {
        let prober = SetProber::new(&[]);
        let picker = ScriptedPicker::new(vec![None, None]);
        let mut rb = rebaser(&["file:///folder/file1.txt"], prober, picker.clone());
        let artifact = ArtifactUri::new("file:///folder/file1.txt");

        let first = rb
            .translate_artifact_to_local(&artifact, PickPolicy::IfNotDeclined)
            .await;
        let second = rb
            .translate_artifact_to_local(&artifact, PickPolicy::IfNotDeclined)
            .await;
        assert_eq!(first, None);
        assert_eq!(second, None);
        assert_eq!(picker.calls(), 1);
    }

    #[tokio::test]
    async fn prompt_policy_retries_after_decline() {
        let prober = SetProber::new(&["file:///projects/project/file1.txt"]);
        let picker = ScriptedPicker::new(vec![
            None,
            Some(LocalUri::new("file:///projects/project/file1.txt")),
        ]);
        let mut rb = rebaser(&["file:///folder/file1.txt"], prober, picker.clone());
        let artifact = ArtifactUri::new("file:///folder/file1.txt");

        assert_eq!(
            rb.translate_artifact_to_local(&artifact, PickPolicy::IfNotDeclined)
                .await,
            None
        );
        let got = rb
            .translate_artifact_to_local(&artifact, PickPolicy::Prompt)
            .await;
        assert_eq!(got, Some(LocalUri::new("file:///projects/project/file1.txt")));
        assert_eq!(picker.calls(), 2);
    }

    #[tokio::test]
    async fn pick_learns_a_generalized_base_pair() {
        let prober = SetProber::new(&[
            "file:///projects/project/file1.txt",
            "file:///projects/project/sub/file2.txt",
        ]);
        let picker =
            ScriptedPicker::new(vec![Some(LocalUri::new("file:///projects/project/file1.txt"))]);
        let mut rb = rebaser(
            &["file:///folder/file1.txt", "file:///folder/sub/file2.txt"],
            prober,
            picker.clone(),
        );

        let got = rb
            .translate_artifact_to_local(
                &ArtifactUri::new("file:///folder/file1.txt"),
                PickPolicy::IfNotDeclined,
            )
            .await;
        assert_eq!(got, Some(LocalUri::new("file:///projects/project/file1.txt")));
        assert_eq!(
            rb.cache().entries(),
            &[crate::BaseUriCacheEntry {
                artifact_base: "file:///folder".into(),
                local_base: LocalUri::new("file:///projects/project"),
            }]
        );

        // The learned pair resolves the sibling without prompting.
        let sibling = rb
            .resolve_auto(&ArtifactUri::new("file:///folder/sub/file2.txt"))
            .await;
        assert_eq!(
            sibling,
            Some(LocalUri::new("file:///projects/project/sub/file2.txt"))
        );
        assert_eq!(picker.calls(), 1);
    }

    #[tokio::test]
    async fn distinct_name_shortcut_uses_configured_bases() {
        let prober = SetProber::new(&["file:///ws/checkout/file1.txt"]);
        let picker = ScriptedPicker::new(vec![]);
        let mut rb = rebaser(&["file:///folder/file1.txt"], prober, picker.clone());
        rb.set_uri_bases(vec![
            LocalUri::new("file:///ws/other"),
            LocalUri::new("file:///ws/checkout"),
        ]);

        let got = rb
            .resolve_auto(&ArtifactUri::new("file:///folder/file1.txt"))
            .await;
        assert_eq!(got, Some(LocalUri::new("file:///ws/checkout/file1.txt")));
        // Learned pair generalizes the resolution to the shared prefix.
        assert_eq!(rb.cache().entries()[0].artifact_base, "file:///folder");
        assert_eq!(picker.calls(), 0);
    }

    #[tokio::test]
    async fn ambiguous_name_skips_the_shortcut() {
        let prober = SetProber::new(&["file:///ws/mod.rs"]);
        let picker = ScriptedPicker::new(vec![]);
        let mut rb = rebaser(
            &["file:///a/mod.rs", "file:///b/mod.rs"],
            prober,
            picker,
        );
        rb.set_uri_bases(vec![LocalUri::new("file:///ws")]);

        // Suffix overlap still applies, but only with more context than the
        // bare name gives; with a one-segment path the append also matches.
        let got = rb.resolve_auto(&ArtifactUri::new("file:///a/mod.rs")).await;
        // /ws + mod.rs exists, found by the suffix search, not the shortcut.
        assert_eq!(got, Some(LocalUri::new("file:///ws/mod.rs")));
    }

    #[tokio::test]
    async fn suffix_overlap_resolves_non_file_scheme() {
        let prober = SetProber::new(&["file:///x/y/b/c/d.e"]);
        let picker = ScriptedPicker::new(vec![]);
        let mut rb = rebaser(&[], prober, picker);
        rb.set_uri_bases(vec![LocalUri::new("file:///x/y/b/z")]);

        let got = rb.resolve_auto(&ArtifactUri::new("http:///a/b/c/d.e")).await;
        assert_eq!(got, Some(LocalUri::new("file:///x/y/b/c/d.e")));
    }

    #[tokio::test]
    async fn suffix_overlap_prefers_earlier_base_on_ties() {
        let prober = SetProber::new(&["file:///one/src/a.rs", "file:///two/src/a.rs"]);
        let picker = ScriptedPicker::new(vec![]);
        let mut rb = rebaser(&[], prober, picker);
        rb.set_uri_bases(vec![
            LocalUri::new("file:///one"),
            LocalUri::new("file:///two"),
        ]);

        let got = rb.resolve_auto(&ArtifactUri::new("file:///ci/src/a.rs")).await;
        assert_eq!(got, Some(LocalUri::new("file:///one/src/a.rs")));
    }

    #[tokio::test]
    async fn unresolvable_artifact_returns_none() {
        let prober = SetProber::new(&[]);
        let picker = ScriptedPicker::new(vec![]);
        let mut rb = rebaser(&[], prober, picker);
        rb.set_uri_bases(vec![LocalUri::new("file:///ws")]);

        assert_eq!(rb.resolve_auto(&ArtifactUri::new("file:///a/b.c")).await, None);
    }

    #[tokio::test]
    async fn local_to_artifact_walks_cache_reversed() {
        let prober = SetProber::new(&[]);
        let picker = ScriptedPicker::new(vec![]);
        let mut rb = rebaser(&[], prober, picker);
        rb.cache
            .insert("http:///ci/job", LocalUri::new("file:///home/me/proj"));

        let got = rb.translate_local_to_artifact(&LocalUri::new("file:///home/me/proj/src/a.rs"));
        assert_eq!(got, Some(ArtifactUri::new("http:///ci/job/src/a.rs")));
    }

    #[tokio::test]
    async fn local_to_artifact_falls_back_to_distinct_names() {
        let prober = SetProber::new(&[]);
        let picker = ScriptedPicker::new(vec![]);
        let rb = rebaser(&["file:///folder/file1.txt"], prober, picker);

        let got = rb.translate_local_to_artifact(&LocalUri::new("file:///anywhere/file1.txt"));
        assert_eq!(got, Some(ArtifactUri::new("file:///folder/file1.txt")));
    }

    #[tokio::test]
    async fn success_is_announced_to_subscribers() {
        let prober = SetProber::new(&["file:///home/me/proj/src/a.rs"]);
        let picker = ScriptedPicker::new(vec![]);
        let mut rb = rebaser(&[], prober, picker);
        rb.cache
            .insert("file:///build", LocalUri::new("file:///home/me/proj"));
        let mut events = rb.subscribe();

        rb.resolve_auto(&ArtifactUri::new("file:///build/src/a.rs"))
            .await
            .expect("resolved");
        let event = events.try_recv().expect("event");
        assert_eq!(
            event,
            MappingEvent {
                artifact: ArtifactUri::new("file:///build/src/a.rs"),
                local: LocalUri::new("file:///home/me/proj/src/a.rs"),
            }
        );
    }
}
