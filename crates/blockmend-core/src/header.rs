//! Index Header Payloads
//!
//! The downstream compactor owns the real binary index-header format. When a
//! block has no header at all we write a minimal JSON placeholder derived from
//! the block's chunk listing, plus a sparse companion carrying only the time
//! range.
//!
//! ```json
//! index-header:        {"ulid":"01F...","minTime":100,"maxTime":500,"numChunks":3,"sizeBytes":60}
//! sparse-index-header: {"ulid":"01F...","minTime":100,"maxTime":500}
//! ```

use serde::{Deserialize, Serialize};

use crate::block::BlockId;
use crate::error::Result;

pub const INDEX_HEADER: &str = "index-header";
pub const SPARSE_INDEX_HEADER: &str = "sparse-index-header";
pub const ROTATED_SUFFIX: &str = ".old";
pub const CHUNKS_DIR: &str = "chunks/";

/// Where a block's header data currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderState {
    /// Neither the canonical nor the rotated header exists.
    Missing,
    /// The canonical header exists.
    Present,
    /// Only `index-header.old` exists; the compactor has not regenerated yet.
    RotatedOut,
}

/// Size and time range contributed by one chunk object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    pub key: String,
    pub min_time: i64,
    pub max_time: i64,
    pub size_bytes: u64,
}

impl ChunkMeta {
    /// Build from explicit values. The bounds are swapped if given reversed.
    pub fn new(key: impl Into<String>, min_time: i64, max_time: i64, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            min_time: min_time.min(max_time),
            max_time: min_time.max(max_time),
            size_bytes,
        }
    }

    /// Derive chunk metadata from a listing entry.
    ///
    /// A file name of the form `<minMs>-<maxMs>` carries its own time range;
    /// any other name falls back to the object's last-modified time.
    pub fn from_listing(key: &str, size_bytes: u64, last_modified_ms: i64) -> Self {
        let name = key.rsplit('/').next().unwrap_or(key);
        match parse_time_range(name) {
            Some((min_time, max_time)) => Self::new(key, min_time, max_time, size_bytes),
            None => Self::new(key, last_modified_ms, last_modified_ms, size_bytes),
        }
    }
}

fn parse_time_range(name: &str) -> Option<(i64, i64)> {
    let (min, max) = name.split_once('-')?;
    Some((min.parse().ok()?, max.parse().ok()?))
}

/// Synthesized placeholder header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexHeader {
    pub ulid: String,
    pub min_time: i64,
    pub max_time: i64,
    pub num_chunks: usize,
    pub size_bytes: u64,
}

/// Sparse companion of [`IndexHeader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndexHeader {
    pub ulid: String,
    pub min_time: i64,
    pub max_time: i64,
}

impl IndexHeader {
    /// Aggregate a header from a block's chunks.
    ///
    /// Returns `None` for an empty chunk set; a block without chunks is not
    /// ready and gets no header.
    pub fn from_chunks(id: &BlockId, chunks: &[ChunkMeta]) -> Option<Self> {
        let first = chunks.first()?;
        let (min_time, max_time, size_bytes) = chunks.iter().fold(
            (first.min_time, first.max_time, 0u64),
            |(min, max, size), chunk| {
                (
                    min.min(chunk.min_time),
                    max.max(chunk.max_time),
                    size.saturating_add(chunk.size_bytes),
                )
            },
        );

        Some(Self {
            ulid: id.to_string(),
            min_time,
            max_time,
            num_chunks: chunks.len(),
            size_bytes,
        })
    }

    pub fn sparse(&self) -> SparseIndexHeader {
        SparseIndexHeader {
            ulid: self.ulid.clone(),
            min_time: self.min_time,
            max_time: self.max_time,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl SparseIndexHeader {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_id() -> BlockId {
        BlockId::parse("01FZXYZABCDEF12").unwrap()
    }

    #[test]
    fn test_header_from_chunks() {
        let chunks = vec![
            ChunkMeta::new("b/chunks/000001", 100, 100, 10),
            ChunkMeta::new("b/chunks/000002", 500, 500, 20),
            ChunkMeta::new("b/chunks/000003", 300, 300, 30),
        ];

        let header = IndexHeader::from_chunks(&block_id(), &chunks).unwrap();
        assert_eq!(header.ulid, "01FZXYZABCDEF12");
        assert_eq!(header.min_time, 100);
        assert_eq!(header.max_time, 500);
        assert_eq!(header.num_chunks, 3);
        assert_eq!(header.size_bytes, 60);
    }

    #[test]
    fn test_header_from_empty_chunks() {
        assert!(IndexHeader::from_chunks(&block_id(), &[]).is_none());
    }

    #[test]
    fn test_header_uses_chunk_ranges() {
        let chunks = vec![
            ChunkMeta::new("c1", 200, 900, 1),
            ChunkMeta::new("c2", 50, 120, 1),
        ];
        let header = IndexHeader::from_chunks(&block_id(), &chunks).unwrap();
        assert_eq!(header.min_time, 50);
        assert_eq!(header.max_time, 900);
        assert!(header.min_time <= header.max_time);
    }

    #[test]
    fn test_chunk_meta_swaps_reversed_bounds() {
        let chunk = ChunkMeta::new("c", 900, 100, 0);
        assert_eq!(chunk.min_time, 100);
        assert_eq!(chunk.max_time, 900);
    }

    #[test]
    fn test_chunk_meta_from_listing_with_range_name() {
        let chunk = ChunkMeta::from_listing("t/01FZXYZABCDEF12/chunks/1000-2000", 64, 5);
        assert_eq!(chunk.min_time, 1000);
        assert_eq!(chunk.max_time, 2000);
        assert_eq!(chunk.size_bytes, 64);
    }

    #[test]
    fn test_chunk_meta_from_listing_falls_back_to_last_modified() {
        let chunk = ChunkMeta::from_listing("t/01FZXYZABCDEF12/chunks/000001", 64, 1_763_820_000_000);
        assert_eq!(chunk.min_time, 1_763_820_000_000);
        assert_eq!(chunk.max_time, 1_763_820_000_000);

        let chunk = ChunkMeta::from_listing("t/01FZXYZABCDEF12/chunks/abc-def", 1, 7);
        assert_eq!(chunk.min_time, 7);
    }

    #[test]
    fn test_header_json_shape() {
        let header = IndexHeader {
            ulid: "01FZXYZABCDEF12".to_string(),
            min_time: 100,
            max_time: 500,
            num_chunks: 3,
            size_bytes: 60,
        };

        let value: serde_json::Value = serde_json::from_slice(&header.to_json().unwrap()).unwrap();
        assert_eq!(value["ulid"], "01FZXYZABCDEF12");
        assert_eq!(value["minTime"], 100);
        assert_eq!(value["maxTime"], 500);
        assert_eq!(value["numChunks"], 3);
        assert_eq!(value["sizeBytes"], 60);

        let sparse: serde_json::Value =
            serde_json::from_slice(&header.sparse().to_json().unwrap()).unwrap();
        assert_eq!(sparse.as_object().unwrap().len(), 3);
        assert_eq!(sparse["minTime"], 100);
        assert_eq!(sparse["maxTime"], 500);
    }

    #[test]
    fn test_header_state_serde() {
        assert_eq!(
            serde_json::to_string(&HeaderState::RotatedOut).unwrap(),
            "\"rotated_out\""
        );
    }
}
