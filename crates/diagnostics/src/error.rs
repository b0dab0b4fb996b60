use scanmap_protocol::ResultKey;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollectionError>;

#[derive(Error, Debug)]
pub enum CollectionError {
    /// The mapped/unmapped partitioning drifted out of sync: a diagnostic the
    /// cascade resolved is no longer where the walk saw it. Not recoverable;
    /// continuing would desynchronize the visible problem list.
    #[error("partition invariant violated for result {run_id}:{result_id}", run_id = .key.run_id, result_id = .key.result_id)]
    PartitionDrift { key: ResultKey },
}
