//! Block Identifiers and Prefixes
//!
//! Object storage has no real directories, so a "block directory" is nothing
//! more than a key prefix whose final segment looks like a block identifier.
//! Discovery never trusts the shape of the key space; it asks a
//! [`BlockMatcher`] about every candidate segment.
//!
//! ## Identifier Predicate
//!
//! ```text
//! ^[0-9A-Za-z]{12,}/$      applied to the final segment of a prefix
//!
//! 01FZXYZABCDEF12/         accepted
//! ab12/                    rejected (too short)
//! 01FZXYZ-ABCDEF12/        rejected (non-alphanumeric)
//! 01FZXYZABCDEF12          rejected (not a directory segment)
//! ```
//!
//! ## Key Layout
//!
//! ```text
//! <namespace>/.../<ULID>/
//! ├── chunks/
//! │   ├── 000001
//! │   └── 000002
//! ├── index-header             canonical header
//! ├── sparse-index-header      sparse companion
//! └── index-header.old         rotated header (consumed by the compactor)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::header::{CHUNKS_DIR, INDEX_HEADER, ROTATED_SUFFIX, SPARSE_INDEX_HEADER};

/// Minimum identifier length accepted by the default matcher.
pub const DEFAULT_MIN_ID_LEN: usize = 12;

/// A validated block identifier (the final segment of a block prefix,
/// without the trailing slash).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Parse an identifier with the default matcher.
    pub fn parse(name: &str) -> Result<Self> {
        BlockMatcher::default().parse(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The block identifier predicate.
///
/// Built once from configuration and handed to discovery; there is no
/// process-wide pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMatcher {
    min_len: usize,
}

impl Default for BlockMatcher {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_ID_LEN,
        }
    }
}

impl BlockMatcher {
    /// Create a matcher accepting alphanumeric names of at least `min_len`
    /// characters. A zero length is raised to one.
    pub fn new(min_len: usize) -> Self {
        Self {
            min_len: min_len.max(1),
        }
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Check a bare name (no slashes).
    pub fn matches_name(&self, name: &str) -> bool {
        name.len() >= self.min_len && name.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// Check a directory segment, which must carry its trailing `/`.
    pub fn matches_segment(&self, segment: &str) -> bool {
        match segment.strip_suffix('/') {
            Some(name) => self.matches_name(name),
            None => false,
        }
    }

    pub fn parse(&self, name: &str) -> Result<BlockId> {
        if self.matches_name(name) {
            Ok(BlockId(name.to_string()))
        } else {
            Err(Error::InvalidBlockId(name.to_string()))
        }
    }

    /// Interpret a full directory prefix (`a/b/<ULID>/`) as a block.
    ///
    /// Returns `None` when the prefix has no trailing slash or its final
    /// segment is not a block identifier.
    pub fn block_for_prefix(&self, prefix: &str) -> Option<BlockRef> {
        let trimmed = prefix.strip_suffix('/')?;
        let name = trimmed.rsplit('/').next()?;
        if !self.matches_name(name) {
            return None;
        }
        Some(BlockRef {
            prefix: prefix.to_string(),
            id: BlockId(name.to_string()),
        })
    }
}

/// A discovered block: its identifier and the prefix it lives under.
///
/// Ordering is by prefix, so sets of blocks iterate in key order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    prefix: String,
    id: BlockId,
}

impl BlockRef {
    /// Full prefix including the trailing slash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn id(&self) -> &BlockId {
        &self.id
    }

    pub fn header_key(&self) -> String {
        format!("{}{}", self.prefix, INDEX_HEADER)
    }

    pub fn sparse_header_key(&self) -> String {
        format!("{}{}", self.prefix, SPARSE_INDEX_HEADER)
    }

    pub fn rotated_header_key(&self) -> String {
        format!("{}{}{}", self.prefix, INDEX_HEADER, ROTATED_SUFFIX)
    }

    pub fn chunks_prefix(&self) -> String {
        format!("{}{}", self.prefix, CHUNKS_DIR)
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}
