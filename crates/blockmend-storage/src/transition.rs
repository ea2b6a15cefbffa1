//! Header Transition Engine
//!
//! Drives one block from its inspected state to a terminal outcome:
//!
//! ```text
//! Present ─────(rotates)──► copy → .old ──ok──► delete canonical ──ok──► Rotated
//!                                  │ err                  │ err
//!                                  ▼                      ▼
//!                               Failed                 Failed (both copies remain)
//!
//! Missing + chunks ─(synthesizes)─► put sparse-index-header ─► put index-header ─► Synthesized
//!
//! RotatedOut, NoChunks, or a state the mode leaves alone ─────────────────────► Skipped
//! ```
//!
//! Every mutation goes through [`retry_with_policy`]. The canonical header is
//! deleted only after the copy has returned success, so a block never ends a
//! run with no copy of its header. The one accepted gap: when the copy
//! succeeds and the delete keeps failing, both `index-header` and
//! `index-header.old` stay behind and the block reports `Failed`.

use std::fmt;
use std::sync::Arc;

use blockmend_core::{BlockRef, ChunkMeta, HeaderState, IndexHeader};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{RepairConfig, RunMode};
use crate::gateway::BlockStore;
use crate::inspector::{HeaderInspector, Inspection};
use crate::retry::{retry_with_policy, RetryError, RetryPolicy};

/// Why a block was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Canonical header exists and this mode does not rotate.
    HeaderPresent,
    /// Only `index-header.old` exists; rotated by an earlier run.
    AlreadyRotated,
    /// No header and this mode does not synthesize.
    HeaderMissing,
    /// No header and nothing under `chunks/` yet.
    NoChunks,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::HeaderPresent => write!(f, "header present"),
            SkipReason::AlreadyRotated => write!(f, "already rotated"),
            SkipReason::HeaderMissing => write!(f, "header missing"),
            SkipReason::NoChunks => write!(f, "no chunks"),
        }
    }
}

/// Terminal outcome of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Skipped { reason: SkipReason },
    Synthesized { header: IndexHeader },
    Rotated,
    Failed { error: String },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Skipped { .. } => "skipped",
            Outcome::Synthesized { .. } => "synthesized",
            Outcome::Rotated => "rotated",
            Outcome::Failed { .. } => "failed",
        }
    }
}

/// Outcome of one block, with the state it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockReport {
    pub block: String,
    /// `None` when the existence probe itself failed.
    pub state: Option<HeaderState>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Clone)]
pub struct HeaderTransition {
    store: Arc<dyn BlockStore>,
    inspector: HeaderInspector,
    retry: RetryPolicy,
    mode: RunMode,
}

impl HeaderTransition {
    pub fn new(store: Arc<dyn BlockStore>, retry: RetryPolicy, mode: RunMode) -> Self {
        Self {
            inspector: HeaderInspector::new(store.clone()),
            store,
            retry,
            mode,
        }
    }

    pub fn from_config(store: Arc<dyn BlockStore>, config: &RepairConfig) -> Self {
        Self::new(store, config.retry_policy(), config.mode)
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Inspect `block` and apply this mode's action. Never returns an error:
    /// every failure is folded into the report.
    pub async fn transition(&self, block: &BlockRef) -> BlockReport {
        let inspection = match self.inspector.inspect(block, self.mode.synthesizes()).await {
            Ok(inspection) => inspection,
            Err(e) => {
                let report = BlockReport {
                    block: block.to_string(),
                    state: None,
                    outcome: Outcome::Failed {
                        error: format!("inspect failed: {}", e),
                    },
                };
                log_report(&report);
                return report;
            }
        };

        let state = inspection.header_state();
        let outcome = match inspection {
            Inspection::RotatedOut => Outcome::Skipped {
                reason: SkipReason::AlreadyRotated,
            },
            Inspection::NoChunks => Outcome::Skipped {
                reason: SkipReason::NoChunks,
            },
            Inspection::Present if self.mode.rotates() => self.rotate(block).await,
            Inspection::Present => Outcome::Skipped {
                reason: SkipReason::HeaderPresent,
            },
            Inspection::Ready(chunks) if self.mode.synthesizes() => {
                self.synthesize(block, &chunks).await
            }
            Inspection::Ready(_) | Inspection::Missing => Outcome::Skipped {
                reason: SkipReason::HeaderMissing,
            },
        };

        let report = BlockReport {
            block: block.to_string(),
            state: Some(state),
            outcome,
        };
        log_report(&report);
        report
    }

    /// Write `sparse-index-header` then `index-header` derived from `chunks`.
    pub async fn synthesize(&self, block: &BlockRef, chunks: &[ChunkMeta]) -> Outcome {
        let header = match IndexHeader::from_chunks(block.id(), chunks) {
            Some(header) => header,
            None => {
                return Outcome::Skipped {
                    reason: SkipReason::NoChunks,
                }
            }
        };

        let (header_json, sparse_json) = match (header.to_json(), header.sparse().to_json()) {
            (Ok(h), Ok(s)) => (Bytes::from(h), Bytes::from(s)),
            (Err(e), _) | (_, Err(e)) => {
                return Outcome::Failed {
                    error: format!("encode header: {}", e),
                }
            }
        };

        // index-header last: it is the only key the inspector probes
        if let Err(e) = self.put(&block.sparse_header_key(), sparse_json).await {
            return Outcome::Failed {
                error: e.to_string(),
            };
        }
        if let Err(e) = self.put(&block.header_key(), header_json).await {
            return Outcome::Failed {
                error: e.to_string(),
            };
        }

        Outcome::Synthesized { header }
    }

    /// Move `index-header` to `index-header.old`: copy, then delete.
    pub async fn rotate(&self, block: &BlockRef) -> Outcome {
        let canonical = block.header_key();
        let rotated = block.rotated_header_key();

        let store = &self.store;
        let copied = retry_with_policy(&self.retry, "copy", &canonical, || {
            store.copy(&canonical, &rotated)
        })
        .await;
        if let Err(e) = copied {
            // canonical header untouched
            return Outcome::Failed {
                error: e.to_string(),
            };
        }

        let deleted =
            retry_with_policy(&self.retry, "delete", &canonical, || store.delete(&canonical))
                .await;
        match deleted {
            Ok(()) => Outcome::Rotated,
            Err(e) => Outcome::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), RetryError> {
        let store = &self.store;
        retry_with_policy(&self.retry, "put", key, || store.put(key, data.clone())).await
    }
}

fn log_report(report: &BlockReport) {
    match &report.outcome {
        Outcome::Skipped { reason } => {
            info!(block = %report.block, reason = %reason, "Block skipped")
        }
        Outcome::Synthesized { header } => info!(
            block = %report.block,
            num_chunks = header.num_chunks,
            size_bytes = header.size_bytes,
            "Header synthesized"
        ),
        Outcome::Rotated => info!(block = %report.block, "Header rotated"),
        Outcome::Failed { error } => {
            warn!(block = %report.block, error = %error, "Block failed")
        }
    }
}
