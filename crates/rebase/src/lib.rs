//! # Scanmap Rebase
//!
//! Artifact↔local URI rebasing for static-analysis logs.
//!
//! ## Resolution pipeline
//!
//! ```text
//! Artifact URI
//!     │
//!     ├──> Base-URI cache (longest learned prefix first)
//!     │      └─> rewrite + existence probe
//!     │
//!     ├──> Distinct-name shortcut (unique base name × configured bases)
//!     │
//!     ├──> Suffix-overlap search (trailing segments × configured bases)
//!     │
//!     └──> Interactive pick (one prompt, generalized into a base pair)
//! ```
//!
//! Every successful resolution is announced on a broadcast channel so the
//! diagnostic collection can cascade it to sibling artifacts.

mod cache;
mod distinct;
mod error;
mod normalize;
mod pick;
mod probe;
mod rebaser;

pub use cache::{BaseUriCache, BaseUriCacheEntry, BASE_CACHE_SCHEMA_VERSION};
pub use distinct::DistinctNameIndex;
pub use error::{RebaseError, Result};
pub use normalize::{
    file_name, join_segments, segments, split_uri, strip_trailing_segments, CaseSensitivity,
    NormalizedKey, PathNormalizer,
};
pub use pick::{FilePicker, NoPicker};
pub use probe::{local_uri_from_path, local_uri_to_path, ExistenceProber, FsProber};
pub use rebaser::{MappingEvent, PickPolicy, UriRebaser};
