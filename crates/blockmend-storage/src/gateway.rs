//! Storage Gateway
//!
//! `BlockStore` is the only way the rest of the crate touches the bucket: a
//! small capability set of list / head / get / put / copy / delete on string
//! keys. Listing is page-oriented; callers keep asking for the next page
//! until no continuation token is returned.
//!
//! ```text
//! Discovery ──┐
//! Inspector ──┼──► BlockStore ──► ObjectStoreGateway ──► object_store (S3 / InMemory)
//! Transition ─┘
//! ```
//!
//! `ObjectStoreGateway` adapts any `object_store::ObjectStore`. Object paging
//! follows S3 `start-after` semantics: the token is the last key of the
//! previous page and the next page starts strictly after it. A delimiter
//! listing already returns every child prefix in one call, so
//! `list_prefixes` answers with a single last page.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore};

use crate::error::StorageError;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// S3 `max-keys` default.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified_ms: i64,
}

impl From<ObjectMeta> for ObjectEntry {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            key: meta.location.to_string(),
            size: meta.size as u64,
            last_modified_ms: meta.last_modified.timestamp_millis(),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` on the last page.
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Capability interface over the bucket.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Immediate child prefixes of `prefix`, each ending in `/`.
    async fn list_prefixes(&self, prefix: &str, token: Option<&str>)
        -> StorageResult<Page<String>>;

    /// All object keys under `prefix`, at any depth.
    async fn list_objects(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> StorageResult<Page<ObjectEntry>>;

    async fn head(&self, key: &str) -> StorageResult<ObjectEntry>;

    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Existence probe: `Ok(false)` on not-found, `Err` on anything else.
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// `BlockStore` backed by an `object_store::ObjectStore`.
#[derive(Debug, Clone)]
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    page_size: usize,
}

impl ObjectStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// object_store paths never carry a trailing delimiter.
fn to_path(key: &str) -> Path {
    Path::from(key.trim_end_matches('/'))
}

fn to_prefix(prefix: &str) -> Option<Path> {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(Path::from(trimmed))
    }
}

#[async_trait]
impl BlockStore for ObjectStoreGateway {
    async fn list_prefixes(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> StorageResult<Page<String>> {
        let location = to_prefix(prefix);
        let result = self.store.list_with_delimiter(location.as_ref()).await?;

        let mut prefixes: Vec<String> = result
            .common_prefixes
            .into_iter()
            .map(|p| format!("{}/", p))
            .filter(|p| token.map_or(true, |after| p.as_str() > after))
            .collect();
        prefixes.sort();

        Ok(Page::last(prefixes))
    }

    async fn list_objects(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> StorageResult<Page<ObjectEntry>> {
        let location = to_prefix(prefix);
        let stream = match token {
            Some(after) => self
                .store
                .list_with_offset(location.as_ref(), &Path::from(after)),
            None => self.store.list(location.as_ref()),
        };

        // One extra entry tells us whether another page follows.
        let mut metas: Vec<ObjectMeta> = stream.take(self.page_size + 1).try_collect().await?;
        let has_more = metas.len() > self.page_size;
        metas.truncate(self.page_size);

        let items: Vec<ObjectEntry> = metas.into_iter().map(ObjectEntry::from).collect();
        let next = if has_more {
            items.last().map(|e| e.key.clone())
        } else {
            None
        };

        Ok(Page { items, next })
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectEntry> {
        let meta = self.store.head(&to_path(key)).await?;
        Ok(meta.into())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let result = self.store.get(&to_path(key)).await?;
        Ok(result.bytes().await?)
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.store.put(&to_path(key), data.into()).await?;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        self.store.copy(&to_path(from), &to_path(to)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.store.delete(&to_path(key)).await?;
        Ok(())
    }
}
