//! Block Discovery
//!
//! Finds every block prefix under a namespace. Blocks can sit at any depth
//! and share the key space with directories that are not blocks (markers,
//! tenant folders, date partitions), so every candidate segment goes through
//! the [`BlockMatcher`].
//!
//! ## Strategies
//!
//! ```text
//! walk:  list_prefixes(ns/) ──► ns/a/  (no match, queue)
//!                           ──► ns/01FZXYZABCDEF12/ (match, stop)
//!        list_prefixes(ns/a/) ──► ...
//!
//! scan:  list_objects(ns/) ──► ns/a/01FZXYZABCDEF12/chunks/000001
//!                              └── first matching ancestor: ns/a/01FZXYZABCDEF12/
//! ```
//!
//! Both return the same set. `walk` costs one listing per directory; `scan`
//! costs one listing entry per object. Depth is counted in directory levels
//! below the namespace; no directory deeper than `max_depth` is examined and
//! meeting one fails discovery. Any listing error fails discovery as well:
//! a partial block set is never acted on.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use blockmend_core::{BlockMatcher, BlockRef};
use tracing::{debug, info};

use crate::config::{DiscoveryStrategy, RepairConfig};
use crate::error::{Error, Result};
use crate::gateway::BlockStore;

pub struct BlockDiscovery {
    store: Arc<dyn BlockStore>,
    matcher: BlockMatcher,
    max_depth: usize,
}

impl BlockDiscovery {
    pub fn new(store: Arc<dyn BlockStore>, matcher: BlockMatcher, max_depth: usize) -> Self {
        Self {
            store,
            matcher,
            max_depth: max_depth.max(1),
        }
    }

    pub fn from_config(store: Arc<dyn BlockStore>, config: &RepairConfig) -> Self {
        Self::new(store, config.matcher(), config.max_depth)
    }

    pub async fn discover(
        &self,
        root: &str,
        strategy: DiscoveryStrategy,
    ) -> Result<BTreeSet<BlockRef>> {
        let blocks = match strategy {
            DiscoveryStrategy::Walk => self.walk(root).await?,
            DiscoveryStrategy::Scan => self.scan(root).await?,
        };

        info!(
            root = %root,
            strategy = %strategy,
            blocks = blocks.len(),
            "Block discovery complete"
        );
        Ok(blocks)
    }

    /// Delimiter-bounded walk over an explicit worklist.
    pub async fn walk(&self, root: &str) -> Result<BTreeSet<BlockRef>> {
        let root = normalize_prefix(root);
        let mut blocks = BTreeSet::new();
        let mut pending: VecDeque<(String, usize)> = VecDeque::new();
        pending.push_back((root, 0));

        while let Some((prefix, depth)) = pending.pop_front() {
            let children = self.child_prefixes(&prefix).await?;
            let child_depth = depth + 1;

            for child in children {
                if child_depth > self.max_depth {
                    return Err(Error::DepthLimitExceeded {
                        prefix: child,
                        limit: self.max_depth,
                    });
                }

                match self.matcher.block_for_prefix(&child) {
                    Some(block) => {
                        debug!(block = %block, "Found block");
                        blocks.insert(block);
                    }
                    None => pending.push_back((child, child_depth)),
                }
            }
        }

        Ok(blocks)
    }

    /// Flat listing; each key contributes its shallowest block ancestor.
    pub async fn scan(&self, root: &str) -> Result<BTreeSet<BlockRef>> {
        let root = normalize_prefix(root);
        let mut blocks = BTreeSet::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .store
                .list_objects(&root, token.as_deref())
                .await
                .map_err(|source| Error::Listing {
                    prefix: root.clone(),
                    source,
                })?;

            for entry in &page.items {
                if let Some(block) = self.block_for_key(&root, &entry.key)? {
                    blocks.insert(block);
                }
            }

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(blocks)
    }

    async fn child_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        let mut children = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .store
                .list_prefixes(prefix, token.as_deref())
                .await
                .map_err(|source| Error::Listing {
                    prefix: prefix.to_string(),
                    source,
                })?;
            children.extend(page.items);

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(children)
    }

    fn block_for_key(&self, root: &str, key: &str) -> Result<Option<BlockRef>> {
        let rest = match key.strip_prefix(root) {
            Some(rest) => rest,
            None => return Ok(None),
        };

        // Every segment but the last is a directory.
        let mut end = root.len();
        let segments: Vec<&str> = rest.split('/').collect();
        let dir_count = segments.len().saturating_sub(1);

        for (i, segment) in segments[..dir_count].iter().enumerate() {
            end += segment.len() + 1;
            let dir = &key[..end];

            if i + 1 > self.max_depth {
                return Err(Error::DepthLimitExceeded {
                    prefix: dir.to_string(),
                    limit: self.max_depth,
                });
            }
            if let Some(block) = self.matcher.block_for_prefix(dir) {
                return Ok(Some(block));
            }
        }

        Ok(None)
    }
}

/// `ns`, `ns/` and `ns//` all become `ns/`; the root stays empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}
