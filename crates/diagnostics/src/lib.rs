//! # Scanmap Diagnostics
//!
//! Mapped/unmapped diagnostic partitions and the remapping cascade.
//!
//! ## Flow
//!
//! ```text
//! Log ingestion
//!     │
//!     ├──> add() — bucket by location (mapped / unmapped)
//!     │
//!     ├──> resolve_all() — one rebaser call per unmapped diagnostic
//!     │      └─> location_mapped() on each success
//!     │            └─> cascade: retry every remaining unmapped
//!     │                diagnostic non-interactively, one resync
//!     │
//!     └──> sync_problem_list() — per-file ceiling + truncation notice
//! ```

mod collection;
mod diagnostic;
mod error;
mod sink;

pub use collection::{CollectionConfig, DiagnosticCollection, DEFAULT_MAX_DIAGNOSTICS_PER_FILE};
pub use diagnostic::Diagnostic;
pub use error::{CollectionError, Result};
pub use sink::{MemorySink, ProblemItem, ProblemListSink, SharedMemorySink};
