//! Block discovery and index-header repair against object storage.
//!
//! A repair run has three phases:
//!
//! 1. **Discovery** ([`discovery`]): find every block prefix under a
//!    namespace, by delimiter walk or flat scan.
//! 2. **Transition** ([`transition`]): per block, inspect where the header
//!    lives and rotate or synthesize it according to the [`RunMode`].
//! 3. **Coordination** ([`coordinator`]): run transitions with bounded
//!    concurrency and collect a [`RunSummary`].
//!
//! All bucket access goes through the [`BlockStore`] trait; production runs
//! use [`ObjectStoreGateway`] over S3, tests use it over `InMemory`.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use blockmend_storage::{BlockDiscovery, Coordinator, ObjectStoreGateway, RepairConfig, RunCancel};
//!
//! let config = RepairConfig::default();
//! config.validate()?;
//!
//! let store: Arc<dyn BlockStore> = Arc::new(ObjectStoreGateway::new(object_store));
//! let blocks = BlockDiscovery::from_config(store.clone(), &config)
//!     .discover(&config.namespace_prefix(), config.discovery)
//!     .await?;
//!
//! let summary = Coordinator::from_config(store, &config)
//!     .run(blocks, RunCancel::new())
//!     .await;
//! println!("{}", summary);
//! ```

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod inspector;
pub mod retry;
pub mod transition;

pub use cancel::{cancel_on_signal, RunCancel, StopReason};
pub use config::{DiscoveryStrategy, RepairConfig, RunMode};
pub use coordinator::{Coordinator, OutcomeCounts, RunSummary};
pub use discovery::BlockDiscovery;
pub use error::{Error, Result, StorageError};
pub use gateway::{BlockStore, ObjectEntry, ObjectStoreGateway, Page, StorageResult};
pub use inspector::{HeaderInspector, Inspection};
pub use retry::{retry_with_policy, RetryError, RetryPolicy};
pub use transition::{BlockReport, HeaderTransition, Outcome, SkipReason};
