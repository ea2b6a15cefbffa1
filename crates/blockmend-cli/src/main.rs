//! blockmend
//!
//! Repairs the index headers of storage blocks in an S3-compatible bucket.
//!
//! ## Overview
//!
//! A run discovers every block under a namespace prefix and, per block,
//! either synthesizes a missing `index-header` from the block's chunks,
//! rotates an existing one to `index-header.old` so the compactor
//! regenerates it, or both, depending on `--mode`.
//!
//! ## Quick Start
//!
//! ```bash
//! export BUCKET_NAME=blocks
//! export S3_ENDPOINT=http://localhost:9000
//! export S3_ACCESS_KEY=minioadmin
//! export S3_SECRET_KEY=minioadmin
//!
//! # Write placeholder headers where missing
//! blockmend --prefix tenant-a/
//!
//! # Force regeneration of every header
//! blockmend --prefix tenant-a/ --mode rotate --output json
//! ```
//!
//! ## Exit Status
//!
//! Invalid configuration or a failed discovery exits non-zero before any
//! block is touched. Per-block failures are reported in the summary and the
//! process still exits zero. Ctrl+C stops admitting new blocks; blocks in
//! flight finish first.

use std::sync::Arc;

use anyhow::{Context, Result};
use blockmend_storage::{
    cancel_on_signal, BlockDiscovery, BlockStore, Coordinator, ObjectStoreGateway, RunCancel,
};
use clap::Parser;
use tracing::info;

mod config;
mod format;

use config::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.repair_config();
    config.validate().context("invalid configuration")?;

    let namespace = config.namespace_prefix();
    info!(
        bucket = %cli.bucket,
        endpoint = %cli.endpoint,
        namespace = %namespace,
        mode = %config.mode,
        discovery = %config.discovery,
        concurrency = config.concurrency,
        "blockmend starting"
    );

    let object_store = cli.build_store()?;
    let store: Arc<dyn BlockStore> =
        Arc::new(ObjectStoreGateway::new(object_store).with_page_size(config.page_size));

    let blocks = BlockDiscovery::from_config(store.clone(), &config)
        .discover(&namespace, config.discovery)
        .await
        .with_context(|| format!("block discovery under '{}' failed", namespace))?;

    let cancel = RunCancel::new();
    let signals = cancel_on_signal(cancel.clone());

    let summary = Coordinator::from_config(store, &config)
        .run(blocks, cancel)
        .await;
    signals.abort();

    println!("{}", format::render_summary(&summary, cli.output)?);
    Ok(())
}
