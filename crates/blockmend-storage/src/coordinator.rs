//! Concurrency Coordinator
//!
//! Runs one transition per block with at most `concurrency` blocks in flight.
//!
//! ## Architecture
//!
//! ```text
//! blocks ──► admission loop ──acquire permit──► spawn(transition(block)) ──┐
//!                 │                                   (permit held until   │
//!                 │ run cancelled                      the block finishes) │
//!                 ▼                                                        ▼
//!         remaining blocks ──► cancelled           reports ◄── mpsc ◄──────┘
//!
//! barrier: every spawned task is awaited before the summary is returned
//! ```
//!
//! Blocks share nothing but the permit pool. A failed or panicked block is
//! recorded as `Failed` and does not affect the scheduling of any other.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use blockmend_core::BlockRef;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::cancel::{RunCancel, StopReason};
use crate::config::{RepairConfig, RunMode};
use crate::gateway::BlockStore;
use crate::transition::{BlockReport, HeaderTransition, Outcome};

/// Per-outcome block counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub synthesized: usize,
    pub rotated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub total: usize,
    pub counts: OutcomeCounts,
    /// One report per admitted block, ordered by block prefix.
    pub reports: Vec<BlockReport>,
    /// Blocks never admitted because the run was cancelled.
    pub cancelled: Vec<String>,
    pub stopped_by: Option<StopReason>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            total: 0,
            counts: OutcomeCounts::default(),
            reports: Vec::new(),
            cancelled: Vec::new(),
            stopped_by: None,
            elapsed_ms: 0,
        }
    }

    pub fn record(&mut self, report: BlockReport) {
        match report.outcome {
            Outcome::Synthesized { .. } => self.counts.synthesized += 1,
            Outcome::Rotated => self.counts.rotated += 1,
            Outcome::Skipped { .. } => self.counts.skipped += 1,
            Outcome::Failed { .. } => self.counts.failed += 1,
        }
        self.total += 1;
        self.reports.push(report);
    }

    pub fn record_cancelled(&mut self, block: &BlockRef) {
        self.counts.cancelled += 1;
        self.total += 1;
        self.cancelled.push(block.to_string());
    }

    pub fn failures(&self) -> impl Iterator<Item = &BlockReport> {
        self.reports.iter().filter(|r| r.outcome.is_failed())
    }

    pub fn was_interrupted(&self) -> bool {
        self.counts.cancelled > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} blocks={} synthesized={} rotated={} skipped={} failed={} cancelled={} elapsed={}ms",
            self.mode,
            self.total,
            self.counts.synthesized,
            self.counts.rotated,
            self.counts.skipped,
            self.counts.failed,
            self.counts.cancelled,
            self.elapsed_ms
        )
    }
}

pub struct Coordinator {
    transition: HeaderTransition,
    concurrency: usize,
}

impl Coordinator {
    pub fn new(transition: HeaderTransition, concurrency: usize) -> Self {
        Self {
            transition,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(store: Arc<dyn BlockStore>, config: &RepairConfig) -> Self {
        Self::new(
            HeaderTransition::from_config(store, config),
            config.concurrency,
        )
    }

    /// Transition every block and wait for all of them.
    ///
    /// Once `cancel` fires no further block is admitted; blocks already
    /// running finish their transition.
    pub async fn run<I>(&self, blocks: I, cancel: RunCancel) -> RunSummary
    where
        I: IntoIterator<Item = BlockRef>,
    {
        let started = Instant::now();
        let mut summary = RunSummary::new(self.transition.mode());
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<BlockReport>();
        let mut handles = Vec::new();
        let mut blocks = blocks.into_iter();

        info!(
            mode = %self.transition.mode(),
            concurrency = self.concurrency,
            "Starting repair run"
        );

        while let Some(block) = blocks.next() {
            let permit = tokio::select! {
                biased;

                reason = cancel.cancelled() => {
                    warn!(reason = %reason, "Run cancelled, no further blocks admitted");
                    summary.stopped_by = Some(reason);
                    None
                }
                permit = permits.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                summary.record_cancelled(&block);
                for rest in blocks.by_ref() {
                    summary.record_cancelled(&rest);
                }
                break;
            };

            let transition = self.transition.clone();
            let tx = tx.clone();
            let prefix = block.to_string();
            let handle = tokio::spawn(async move {
                let report = transition.transition(&block).await;
                drop(permit);
                let _ = tx.send(report);
            });
            handles.push((prefix, handle));
        }
        drop(tx);

        // Barrier
        for (block, handle) in handles {
            if let Err(e) = handle.await {
                error!(block = %block, error = %e, "Block task did not complete");
                summary.record(BlockReport {
                    block,
                    state: None,
                    outcome: Outcome::Failed {
                        error: format!("task failed: {}", e),
                    },
                });
            }
        }
        while let Some(report) = rx.recv().await {
            summary.record(report);
        }

        summary.reports.sort_by(|a, b| a.block.cmp(&b.block));
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            blocks = summary.total,
            synthesized = summary.counts.synthesized,
            rotated = summary.counts.rotated,
            skipped = summary.counts.skipped,
            failed = summary.counts.failed,
            cancelled = summary.counts.cancelled,
            elapsed_ms = summary.elapsed_ms,
            "Repair run complete"
        );
        summary
    }
}
