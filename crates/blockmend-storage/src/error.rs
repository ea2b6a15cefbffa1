//! Storage Error Types
//!
//! ## Gateway Errors (`StorageError`)
//!
//! Every call into the bucket returns `StorageError`. The adapter classifies
//! backend errors at the point of call:
//! - `NotFound`: the object does not exist. A normal answer for existence
//!   probes, never retried.
//! - `ObjectStore` / `Other`: anything else. Treated uniformly as a failure
//!   of the operation.
//!
//! ## Run Errors (`Error`)
//!
//! Errors that abort a whole run: a listing page failed during discovery,
//! discovery hit the depth cap, or the configuration is unusable. Per-block
//! failures never surface here; they end up in the block's outcome.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    ObjectStore(#[source] object_store::Error),

    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::ObjectStore(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Listing failed under {prefix}: {source}")]
    Listing {
        prefix: String,
        #[source]
        source: StorageError,
    },

    #[error("Discovery depth limit {limit} exceeded at {prefix}")]
    DepthLimitExceeded { prefix: String, limit: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
