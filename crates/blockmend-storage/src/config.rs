//! Repair Configuration
//!
//! Controls what a run does and how hard it pushes the bucket:
//!
//! - **namespace**: prefix to discover blocks under (default: `anonymous/`)
//! - **mode**: header policy for this deployment (default: `synthesize`)
//! - **discovery**: `walk` (delimiter listing per level) or `scan` (flat listing)
//! - **concurrency**: blocks in flight at once (default: 10)
//! - **retry_attempts** / **retry_delay_ms**: bounded retry around every
//!   mutating call (default: 3 attempts, 2s apart)
//! - **max_depth**: discovery depth cap below the namespace (default: 256)
//! - **min_id_len**: shortest accepted block identifier (default: 12)
//! - **page_size**: listing page size (default: 1000)
//!
//! ## Usage
//!
//! ```ignore
//! use blockmend_storage::{RepairConfig, RunMode};
//!
//! let config = RepairConfig {
//!     namespace: "tenant-a/".to_string(),
//!     mode: RunMode::Rotate,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use blockmend_core::BlockMatcher;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Header policy for blocks, chosen per deployment.
///
/// | State        | synthesize | rotate  | auto        |
/// |--------------|------------|---------|-------------|
/// | Present      | skip       | rotate  | rotate      |
/// | RotatedOut   | skip       | skip    | skip        |
/// | Missing      | synthesize | skip    | synthesize  |
/// | no chunks    | skip       | skip    | skip        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Leave existing headers alone, write placeholders for missing ones.
    #[default]
    Synthesize,
    /// Move existing headers to `.old` so the compactor regenerates them.
    Rotate,
    /// Rotate existing headers and synthesize missing ones.
    Auto,
}

impl RunMode {
    pub fn rotates(self) -> bool {
        matches!(self, RunMode::Rotate | RunMode::Auto)
    }

    pub fn synthesizes(self) -> bool {
        matches!(self, RunMode::Synthesize | RunMode::Auto)
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "synthesize" => Ok(RunMode::Synthesize),
            "rotate" => Ok(RunMode::Rotate),
            "auto" => Ok(RunMode::Auto),
            other => Err(Error::InvalidConfig(format!("unknown run mode: {}", other))),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Synthesize => write!(f, "synthesize"),
            RunMode::Rotate => write!(f, "rotate"),
            RunMode::Auto => write!(f, "auto"),
        }
    }
}

/// How block prefixes are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Delimiter listing, one level at a time.
    #[default]
    Walk,
    /// One flat listing of every key under the namespace.
    Scan,
}

impl FromStr for DiscoveryStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "walk" => Ok(DiscoveryStrategy::Walk),
            "scan" => Ok(DiscoveryStrategy::Scan),
            other => Err(Error::InvalidConfig(format!(
                "unknown discovery strategy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStrategy::Walk => write!(f, "walk"),
            DiscoveryStrategy::Scan => write!(f, "scan"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Prefix to discover blocks under; empty means the bucket root.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub mode: RunMode,

    #[serde(default)]
    pub discovery: DiscoveryStrategy,

    /// Maximum blocks transitioned concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per mutating call, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_min_id_len")]
    pub min_id_len: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            mode: RunMode::default(),
            discovery: DiscoveryStrategy::default(),
            concurrency: default_concurrency(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_depth: default_max_depth(),
            min_id_len: default_min_id_len(),
            page_size: default_page_size(),
        }
    }
}

impl RepairConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry attempts must be at least 1".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(Error::InvalidConfig("max depth must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(Error::InvalidConfig("page size must be at least 1".into()));
        }
        if self.namespace.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "namespace must be relative to the bucket root: {}",
                self.namespace
            )));
        }
        Ok(())
    }

    /// Namespace with exactly one trailing slash, or empty for the root.
    pub fn namespace_prefix(&self) -> String {
        let trimmed = self.namespace.trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        }
    }

    pub fn matcher(&self) -> BlockMatcher {
        BlockMatcher::new(self.min_id_len)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }
}

fn default_namespace() -> String {
    "anonymous/".to_string()
}

fn default_concurrency() -> usize {
    10
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_max_depth() -> usize {
    256
}

fn default_min_id_len() -> usize {
    blockmend_core::DEFAULT_MIN_ID_LEN
}

fn default_page_size() -> usize {
    crate::gateway::DEFAULT_PAGE_SIZE
}
