//! Header Inspector
//!
//! Works out where a block's header data lives:
//!
//! ```text
//! head(index-header)      found ──► Present
//!        │ not found
//!        ▼
//! head(index-header.old)  found ──► RotatedOut
//!        │ not found
//!        ▼
//!     Missing ──(list chunks/)──► Ready(chunks) | NoChunks
//! ```
//!
//! Only the gateway's not-found answer means "absent". Any other probe error
//! is returned to the caller and fails that one block.

use std::sync::Arc;

use blockmend_core::{BlockRef, ChunkMeta, HeaderState};
use tracing::debug;

use crate::gateway::{BlockStore, StorageResult};

/// What the transition engine needs to know about one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    Present,
    RotatedOut,
    /// Header missing; chunks were not examined.
    Missing,
    /// Header missing and the block has chunks to derive one from.
    Ready(Vec<ChunkMeta>),
    /// Header missing and `chunks/` is empty: the block is not ready yet.
    NoChunks,
}

impl Inspection {
    pub fn header_state(&self) -> HeaderState {
        match self {
            Inspection::Present => HeaderState::Present,
            Inspection::RotatedOut => HeaderState::RotatedOut,
            Inspection::Missing | Inspection::Ready(_) | Inspection::NoChunks => {
                HeaderState::Missing
            }
        }
    }
}

#[derive(Clone)]
pub struct HeaderInspector {
    store: Arc<dyn BlockStore>,
}

impl HeaderInspector {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self { store }
    }

    pub async fn header_state(&self, block: &BlockRef) -> StorageResult<HeaderState> {
        if self.store.exists(&block.header_key()).await? {
            return Ok(HeaderState::Present);
        }
        if self.store.exists(&block.rotated_header_key()).await? {
            return Ok(HeaderState::RotatedOut);
        }
        Ok(HeaderState::Missing)
    }

    /// Every chunk object under `<block>/chunks/`, across all pages.
    pub async fn chunks(&self, block: &BlockRef) -> StorageResult<Vec<ChunkMeta>> {
        let prefix = block.chunks_prefix();
        let mut chunks = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.store.list_objects(&prefix, token.as_deref()).await?;
            chunks.extend(
                page.items
                    .iter()
                    .filter(|entry| !entry.key.ends_with('/'))
                    .map(|entry| {
                        ChunkMeta::from_listing(&entry.key, entry.size, entry.last_modified_ms)
                    }),
            );

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(chunks)
    }

    /// Inspect a block. Chunks are listed only when the header is missing and
    /// `with_chunks` is set.
    pub async fn inspect(&self, block: &BlockRef, with_chunks: bool) -> StorageResult<Inspection> {
        let inspection = match self.header_state(block).await? {
            HeaderState::Present => Inspection::Present,
            HeaderState::RotatedOut => Inspection::RotatedOut,
            HeaderState::Missing if !with_chunks => Inspection::Missing,
            HeaderState::Missing => {
                let chunks = self.chunks(block).await?;
                if chunks.is_empty() {
                    Inspection::NoChunks
                } else {
                    Inspection::Ready(chunks)
                }
            }
        };

        debug!(block = %block, state = ?inspection.header_state(), "Inspected block");
        Ok(inspection)
    }
}
