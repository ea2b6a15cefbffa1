//! Error Types for blockmend-core
//!
//! - `InvalidBlockId`: a name that does not satisfy the block identifier predicate
//! - `Json`: a header payload could not be encoded or decoded

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid block id: {0}")]
    InvalidBlockId(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
