use scanmap_protocol::{Region, Severity};
use std::collections::HashMap;

/// One row of the host problem list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemItem {
    pub region: Region,
    pub message: String,
    pub severity: Severity,
    pub code: Option<String>,
    pub source: String,
}

/// Host problem-list surface. `replace` installs the full ordered list for
/// one file URI, discarding whatever was there before; an empty list clears
/// the file's entry.
pub trait ProblemListSink: Send {
    fn replace(&mut self, uri: &str, items: Vec<ProblemItem>);
}

/// In-memory sink, used by tests and by hosts that render on demand.
#[derive(Debug, Default)]
pub struct MemorySink {
    lists: HashMap<String, Vec<ProblemItem>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&[ProblemItem]> {
        self.lists.get(uri).map(Vec::as_slice)
    }

    #[must_use]
    pub fn uris(&self) -> Vec<&str> {
        self.lists.keys().map(String::as_str).collect()
    }
}

impl ProblemListSink for MemorySink {
    fn replace(&mut self, uri: &str, items: Vec<ProblemItem>) {
        if items.is_empty() {
            self.lists.remove(uri);
        } else {
            self.lists.insert(uri.to_string(), items);
        }
    }
}

/// Cloneable handle over a [`MemorySink`], for hosts that hand the sink to
/// the collection and read the rendered lists elsewhere.
#[derive(Debug, Default, Clone)]
pub struct SharedMemorySink(std::sync::Arc<std::sync::Mutex<MemorySink>>);

impl SharedMemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Vec<ProblemItem>> {
        self.0.lock().ok()?.get(uri).map(<[ProblemItem]>::to_vec)
    }

    /// All current lists, sorted by URI for stable output.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Vec<ProblemItem>)> {
        let Ok(inner) = self.0.lock() else {
            return Vec::new();
        };
        let mut lists: Vec<(String, Vec<ProblemItem>)> = inner
            .lists
            .iter()
            .map(|(uri, items)| (uri.clone(), items.clone()))
            .collect();
        lists.sort_by(|a, b| a.0.cmp(&b.0));
        lists
    }
}

impl ProblemListSink for SharedMemorySink {
    fn replace(&mut self, uri: &str, items: Vec<ProblemItem>) {
        if let Ok(mut inner) = self.0.lock() {
            inner.replace(uri, items);
        }
    }
}
