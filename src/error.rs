//! Top-level error type
//!
//! Aggregates the per-subsystem errors so facade callers handle one type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SfmError {
    #[error(transparent)]
    Graph(#[from] crate::graph::GraphError),

    #[error(transparent)]
    Lock(#[from] crate::lock::LockError),

    #[error(transparent)]
    Txn(#[from] crate::txn::TxnError),

    #[error(transparent)]
    Capacity(#[from] crate::memory::CapacityError),

    #[error(transparent)]
    Taxonomy(#[from] crate::taxonomy::TaxonomyError),

    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

pub type SfmResult<T> = Result<T, SfmError>;
