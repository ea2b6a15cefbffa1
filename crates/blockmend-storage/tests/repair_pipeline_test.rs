//! End-to-end repair runs against an in-memory bucket.
//!
//! Every test drives discovery and the coordinator through
//! `ObjectStoreGateway` over `object_store::memory::InMemory`, the same path
//! a production run takes over S3.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;

use blockmend_core::{BlockRef, HeaderState, IndexHeader, SparseIndexHeader};
use blockmend_storage::{
    BlockDiscovery, BlockStore, Coordinator, DiscoveryStrategy, ObjectEntry, ObjectStoreGateway,
    Outcome, Page, RepairConfig, RunCancel, RunMode, SkipReason, StorageResult,
};

const A: &str = "01FZXYZABCDEF12";
const B: &str = "01HQ3K9ZP7T1B2C3";
const C: &str = "01J0000000000000AB";
const D: &str = "7ZZZZZZZZZZZ";

// ============================================================================
// Helpers
// ============================================================================

fn config(mode: RunMode) -> RepairConfig {
    RepairConfig {
        namespace: "anonymous/".to_string(),
        mode,
        retry_delay_ms: 1,
        ..Default::default()
    }
}

async fn seeded(objects: &[(String, usize)], page_size: usize) -> Arc<ObjectStoreGateway> {
    let gateway = ObjectStoreGateway::new(Arc::new(InMemory::new())).with_page_size(page_size);
    for (key, size) in objects {
        gateway
            .put(key, Bytes::from(vec![1u8; *size]))
            .await
            .unwrap();
    }
    Arc::new(gateway)
}

fn keys(keys: Vec<String>) -> Vec<(String, usize)> {
    keys.into_iter().map(|k| (k, 1)).collect()
}

async fn discover(
    store: Arc<dyn BlockStore>,
    config: &RepairConfig,
) -> BTreeSet<BlockRef> {
    BlockDiscovery::from_config(store, config)
        .discover(&config.namespace_prefix(), config.discovery)
        .await
        .unwrap()
}

/// Counts copy calls on top of another store.
struct CopyCounter {
    inner: Arc<dyn BlockStore>,
    copies: AtomicUsize,
}

#[async_trait]
impl BlockStore for CopyCounter {
    async fn list_prefixes(&self, prefix: &str, token: Option<&str>) -> StorageResult<Page<String>> {
        self.inner.list_prefixes(prefix, token).await
    }

    async fn list_objects(&self, prefix: &str, token: Option<&str>) -> StorageResult<Page<ObjectEntry>> {
        self.inner.list_objects(prefix, token).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectEntry> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.inner.copy(from, to).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }
}

// ============================================================================
// Discovery equivalence
// ============================================================================

/// Both strategies find the same blocks for a range of layouts and page sizes.
#[tokio::test]
async fn walk_and_scan_agree_on_synthetic_layouts() {
    let layouts: Vec<Vec<String>> = vec![
        vec![],
        vec![format!("anonymous/{A}/index-header")],
        vec![
            format!("anonymous/{A}/chunks/000001"),
            format!("anonymous/{B}/meta.json"),
            format!("anonymous/tenant-1/{C}/chunks/000001"),
            format!("anonymous/tenant-1/2024/05/{D}/index-header.old"),
            "anonymous/markers/deletion-mark.json".to_string(),
            "anonymous/short/chunks/000001".to_string(),
            "anonymous/not-a-block-id/x".to_string(),
        ],
        vec![
            // block nested inside a block belongs to the outer one
            format!("anonymous/{A}/{B}/chunks/000001"),
            format!("anonymous/x/{C}/{D}/meta.json"),
            "anonymous/bucket-index.json.gz".to_string(),
        ],
        (0..25)
            .map(|i| format!("anonymous/t{}/01FZXYZABC{:06}/chunks/000001", i % 4, i))
            .collect(),
    ];

    for layout in layouts {
        for page_size in [1, 3, 1000] {
            let store = seeded(&keys(layout.clone()), page_size).await;
            let discovery = BlockDiscovery::new(store, Default::default(), 64);

            let walked = discovery.walk("anonymous/").await.unwrap();
            let scanned = discovery.scan("anonymous/").await.unwrap();
            assert_eq!(walked, scanned, "layout {:?} page size {}", layout, page_size);
        }
    }
}

#[tokio::test]
async fn discovery_respects_namespace() {
    let store = seeded(
        &keys(vec![
            format!("anonymous/{A}/index-header"),
            format!("tenant-b/{B}/index-header"),
        ]),
        1000,
    )
    .await;

    let blocks = discover(store, &config(RunMode::Synthesize)).await;
    let prefixes: Vec<&str> = blocks.iter().map(|b| b.prefix()).collect();
    assert_eq!(prefixes, vec![format!("anonymous/{A}/")]);
}

// ============================================================================
// Full runs
// ============================================================================

/// Synthesize mode: only blocks missing a header (with chunks) are written.
#[tokio::test]
async fn synthesize_run_end_to_end() {
    let store = seeded(
        &[
            (format!("anonymous/{A}/index-header"), 64),
            (format!("anonymous/{A}/chunks/000001"), 5),
            (format!("anonymous/{B}/chunks/100-100"), 10),
            (format!("anonymous/{B}/chunks/500-500"), 20),
            (format!("anonymous/{B}/chunks/300-300"), 30),
            (format!("anonymous/{C}/meta.json"), 3),
            (format!("anonymous/{D}/index-header.old"), 64),
        ],
        2,
    )
    .await;
    let config = config(RunMode::Synthesize);

    let blocks = discover(store.clone(), &config).await;
    assert_eq!(blocks.len(), 4);

    let summary = Coordinator::from_config(store.clone(), &config)
        .run(blocks, RunCancel::new())
        .await;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.counts.synthesized, 1);
    assert_eq!(summary.counts.skipped, 3);
    assert_eq!(summary.counts.failed, 0);

    let header: IndexHeader = serde_json::from_slice(
        &store.get(&format!("anonymous/{B}/index-header")).await.unwrap(),
    )
    .unwrap();
    assert_eq!(header.ulid, B);
    assert_eq!(header.min_time, 100);
    assert_eq!(header.max_time, 500);
    assert_eq!(header.num_chunks, 3);
    assert_eq!(header.size_bytes, 60);

    let sparse: SparseIndexHeader = serde_json::from_slice(
        &store
            .get(&format!("anonymous/{B}/sparse-index-header"))
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(sparse, header.sparse());

    // Present header untouched, empty block left alone
    assert_eq!(
        store
            .get(&format!("anonymous/{A}/index-header"))
            .await
            .unwrap()
            .len(),
        64
    );
    assert!(!store
        .exists(&format!("anonymous/{C}/index-header"))
        .await
        .unwrap());
}

/// A block with no chunks and no header is skipped, never failed.
#[tokio::test]
async fn block_without_chunks_is_skipped() {
    let store = seeded(&keys(vec![format!("anonymous/{A}/meta.json")]), 1000).await;
    let config = config(RunMode::Auto);

    let blocks = discover(store.clone(), &config).await;
    let summary = Coordinator::from_config(store, &config)
        .run(blocks, RunCancel::new())
        .await;

    assert_eq!(summary.counts.failed, 0);
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].state, Some(HeaderState::Missing));
    assert_eq!(
        summary.reports[0].outcome,
        Outcome::Skipped {
            reason: SkipReason::NoChunks
        }
    );
}

/// Running rotate twice never rotates a block a second time.
#[tokio::test]
async fn rotation_is_idempotent() {
    let inner = seeded(
        &[
            (format!("anonymous/{A}/index-header"), 64),
            (format!("anonymous/2024/{B}/index-header"), 32),
        ],
        1000,
    )
    .await;
    let store = Arc::new(CopyCounter {
        inner,
        copies: AtomicUsize::new(0),
    });
    let config = config(RunMode::Rotate);

    let blocks = discover(store.clone(), &config).await;
    let coordinator = Coordinator::from_config(store.clone(), &config);

    let first = coordinator.run(blocks.clone(), RunCancel::new()).await;
    assert_eq!(first.counts.rotated, 2);
    assert_eq!(store.copies.load(Ordering::SeqCst), 2);

    let second = coordinator.run(blocks, RunCancel::new()).await;
    assert_eq!(second.counts.rotated, 0);
    assert_eq!(second.counts.skipped, 2);
    assert!(second.reports.iter().all(|r| r.outcome
        == Outcome::Skipped {
            reason: SkipReason::AlreadyRotated
        }));
    assert_eq!(store.copies.load(Ordering::SeqCst), 2);

    let rotated = store
        .get(&format!("anonymous/{A}/index-header.old"))
        .await
        .unwrap();
    assert_eq!(rotated.len(), 64);
    assert!(!store
        .exists(&format!("anonymous/{A}/index-header"))
        .await
        .unwrap());
}

/// Scan discovery feeds the same run as walk discovery.
#[tokio::test]
async fn scan_strategy_run() {
    let store = seeded(
        &keys(vec![
            format!("anonymous/x/{A}/chunks/10-20"),
            format!("anonymous/y/z/{B}/chunks/30-40"),
        ]),
        1,
    )
    .await;
    let config = RepairConfig {
        discovery: DiscoveryStrategy::Scan,
        ..config(RunMode::Synthesize)
    };

    let blocks = discover(store.clone(), &config).await;
    let summary = Coordinator::from_config(store.clone(), &config)
        .run(blocks, RunCancel::new())
        .await;

    assert_eq!(summary.counts.synthesized, 2);
    assert!(store
        .exists(&format!("anonymous/y/z/{B}/index-header"))
        .await
        .unwrap());
}
