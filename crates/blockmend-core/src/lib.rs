//! Core types shared by the blockmend crates.
//!
//! A *block* is an immutable directory in the bucket, named by a sortable
//! unique identifier (a ULID in practice). This crate knows how to tell a
//! block directory apart from any other path segment, where a block's header
//! objects live, and what a synthesized header looks like.

pub mod block;
pub mod error;
pub mod header;

pub use block::{BlockId, BlockMatcher, BlockRef, DEFAULT_MIN_ID_LEN};
pub use error::{Error, Result};
pub use header::{ChunkMeta, HeaderState, IndexHeader, SparseIndexHeader};
