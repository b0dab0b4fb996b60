use serde::{Deserialize, Serialize};

/// Whether URI comparison folds case. File systems decide this, not the URI
/// scheme, so the consumer's platform picks the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    #[must_use]
    pub fn platform_default() -> Self {
        if cfg!(any(windows, target_os = "macos")) {
            CaseSensitivity::Insensitive
        } else {
            CaseSensitivity::Sensitive
        }
    }
}

/// Canonical comparison key for a URI: separators unified to `/`, ASCII case
/// folded when the platform is case-insensitive. The mapping is byte-wise and
/// length-preserving, which lets callers slice the raw URI by normalized
/// prefix lengths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform-aware URI comparer. Pure; every prefix/suffix comparison in the
/// rebaser goes through this so the case rule is applied consistently.
#[derive(Debug, Clone, Copy)]
pub struct PathNormalizer {
    case: CaseSensitivity,
}

impl PathNormalizer {
    #[must_use]
    pub fn new(case: CaseSensitivity) -> Self {
        Self { case }
    }

    #[must_use]
    pub fn platform() -> Self {
        Self::new(CaseSensitivity::platform_default())
    }

    #[must_use]
    pub fn case(&self) -> CaseSensitivity {
        self.case
    }

    #[must_use]
    pub fn normalize(&self, uri: &str) -> NormalizedKey {
        let folded = uri
            .chars()
            .map(|c| {
                if c == '\\' {
                    '/'
                } else if self.case == CaseSensitivity::Insensitive {
                    c.to_ascii_lowercase()
                } else {
                    c
                }
            })
            .collect();
        NormalizedKey(folded)
    }

    #[must_use]
    pub fn eq(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }

    /// True when `uri` begins with `prefix` at a segment boundary.
    #[must_use]
    pub fn has_prefix(&self, uri: &str, prefix: &str) -> bool {
        let uri = self.normalize(uri);
        let prefix = self.normalize(prefix);
        let (uri, prefix) = (uri.as_str(), prefix.as_str());
        if !uri.starts_with(prefix) {
            return false;
        }
        uri.len() == prefix.len()
            || prefix.ends_with('/')
            || uri.as_bytes()[prefix.len()] == b'/'
    }

    /// Number of trailing path segments `a` and `b` share under this
    /// normalizer. Compares path portions only, so the two URIs may carry
    /// different schemes.
    #[must_use]
    pub fn common_trailing_segments(&self, a: &str, b: &str) -> usize {
        let a_segs = segments(split_uri(a).1);
        let b_segs = segments(split_uri(b).1);
        a_segs
            .iter()
            .rev()
            .zip(b_segs.iter().rev())
            .take_while(|(x, y)| self.eq(x, y))
            .count()
    }
}

fn is_sep(b: u8) -> bool {
    b == b'/' || b == b'\\'
}

/// Split a URI into its head (`scheme://authority`) and path. URIs without a
/// scheme are treated as bare paths with an empty head.
#[must_use]
pub fn split_uri(uri: &str) -> (&str, &str) {
    let Some(scheme_end) = uri.find("://") else {
        return ("", uri);
    };
    let after = scheme_end + 3;
    match uri[after..].find('/') {
        Some(slash) => uri.split_at(after + slash),
        None => (uri, ""),
    }
}

/// Non-empty path segments, accepting either separator style.
#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty()).collect()
}

/// Base file name of a URI, or `""` for URIs with no path segments.
#[must_use]
pub fn file_name(uri: &str) -> &str {
    segments(split_uri(uri).1).last().copied().unwrap_or("")
}

/// Remove the last `n` path segments. Never strips into the URI head, so the
/// result of stripping everything is `scheme://authority`.
#[must_use]
pub fn strip_trailing_segments(uri: &str, n: usize) -> &str {
    let (head, _) = split_uri(uri);
    let floor = head.len();
    let bytes = uri.as_bytes();
    let mut end = bytes.len();
    while end > floor && is_sep(bytes[end - 1]) {
        end -= 1;
    }
    for _ in 0..n {
        if end == floor {
            break;
        }
        while end > floor && !is_sep(bytes[end - 1]) {
            end -= 1;
        }
        while end > floor && is_sep(bytes[end - 1]) {
            end -= 1;
        }
    }
    &uri[..end]
}

/// Append path segments to a base URI with single `/` separators.
#[must_use]
pub fn join_segments(base: &str, segs: &[&str]) -> String {
    let mut out = String::from(base.trim_end_matches(['/', '\\']));
    if out.ends_with(':') {
        // base was a bare head like "file://"
        out.push_str("//");
    }
    for seg in segs {
        out.push('/');
        out.push_str(seg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn insensitive() -> PathNormalizer {
        PathNormalizer::new(CaseSensitivity::Insensitive)
    }

    fn sensitive() -> PathNormalizer {
        PathNormalizer::new(CaseSensitivity::Sensitive)
    }

    #[test]
    fn insensitive_folds_case_and_separators() {
        let norm = insensitive();
        assert_eq!(
            norm.normalize(r"C:\Src\FILE.TXT").as_str(),
            "c:/src/file.txt"
        );
        assert!(norm.eq("file:///a/b", "file:///a/B"));
    }

    #[test]
    fn sensitive_keeps_case_but_unifies_separators() {
        let norm = sensitive();
        assert_eq!(norm.normalize(r"a\b").as_str(), "a/b");
        assert!(!norm.eq("file:///a/b", "file:///a/B"));
    }

    #[test]
    fn prefix_match_respects_segment_boundary() {
        let norm = sensitive();
        assert!(norm.has_prefix("file:///a/b/c", "file:///a/b"));
        assert!(norm.has_prefix("file:///a/b", "file:///a/b"));
        assert!(!norm.has_prefix("file:///a/bc", "file:///a/b"));
    }

    #[test]
    fn splits_scheme_head_from_path() {
        assert_eq!(split_uri("file:///a/b"), ("file://", "/a/b"));
        assert_eq!(split_uri("http://host/x"), ("http://host", "/x"));
        assert_eq!(split_uri("/plain/path"), ("", "/plain/path"));
        assert_eq!(split_uri("http:///a/b/c/d.e"), ("http://", "/a/b/c/d.e"));
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(file_name("file:///folder/file1.txt"), "file1.txt");
        assert_eq!(file_name(r"c:\x\y.z"), "y.z");
        assert_eq!(file_name("file://"), "");
    }

    #[test]
    fn strips_trailing_segments() {
        assert_eq!(
            strip_trailing_segments("file:///folder/file1.txt", 1),
            "file:///folder"
        );
        assert_eq!(
            strip_trailing_segments("file:///projects/project/file1.txt", 1),
            "file:///projects/project"
        );
        assert_eq!(strip_trailing_segments("file:///a/b", 2), "file://");
        assert_eq!(strip_trailing_segments("file:///a/b", 9), "file://");
    }

    #[test]
    fn join_rebuilds_from_bare_head() {
        assert_eq!(join_segments("file://", &["x", "y.z"]), "file:///x/y.z");
        assert_eq!(join_segments("file:///d/e/", &["f"]), "file:///d/e/f");
    }

    #[test]
    fn common_trailing_segments_ignores_scheme() {
        let norm = sensitive();
        assert_eq!(
            norm.common_trailing_segments("http:///a/src/m.c", "file:///w/src/m.c"),
            2
        );
        assert_eq!(
            norm.common_trailing_segments("file:///a/b.c", "file:///x/d.e"),
            0
        );
    }

    #[test]
    fn common_trailing_segments_folds_case_when_insensitive() {
        assert_eq!(
            insensitive().common_trailing_segments("file:///a/SRC/M.C", "file:///b/src/m.c"),
            2
        );
        assert_eq!(
            sensitive().common_trailing_segments("file:///a/SRC/M.C", "file:///b/src/m.c"),
            0
        );
    }
}
