//! Command-line and environment configuration for `blockmend`

use std::sync::Arc;

use anyhow::{Context, Result};
use blockmend_storage::{DiscoveryStrategy, RepairConfig, RunMode};
use clap::{Parser, ValueEnum};
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One summary line plus one line per failed block
    Text,
    /// The full run report
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "blockmend")]
#[command(about = "Repair index headers of storage blocks in an S3 bucket", long_about = None)]
pub struct Cli {
    /// Bucket holding the blocks
    #[arg(long, env = "BUCKET_NAME")]
    pub bucket: String,

    /// S3-compatible endpoint URL
    #[arg(long, env = "S3_ENDPOINT")]
    pub endpoint: String,

    #[arg(long, env = "S3_ACCESS_KEY", hide_env_values = true)]
    pub access_key: String,

    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Allow plain HTTP (default: true for http:// endpoints)
    #[arg(long, env = "S3_ALLOW_HTTP")]
    pub allow_http: Option<bool>,

    /// Namespace prefix to discover blocks under
    #[arg(long, env = "BLOCKMEND_PREFIX", default_value = "anonymous/")]
    pub prefix: String,

    /// Header policy: synthesize, rotate or auto
    #[arg(long, env = "BLOCKMEND_MODE", default_value = "synthesize")]
    pub mode: RunMode,

    /// Discovery strategy: walk or scan
    #[arg(long, env = "BLOCKMEND_DISCOVERY", default_value = "walk")]
    pub discovery: DiscoveryStrategy,

    /// Blocks transitioned concurrently
    #[arg(long, env = "BLOCKMEND_CONCURRENCY", default_value_t = 10)]
    pub concurrency: usize,

    /// Attempts per mutating call, including the first
    #[arg(long, env = "BLOCKMEND_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: usize,

    /// Delay between attempts in milliseconds
    #[arg(long, env = "BLOCKMEND_RETRY_DELAY_MS", default_value_t = 2000)]
    pub retry_delay_ms: u64,

    /// Directory levels below the prefix discovery may descend
    #[arg(long, env = "BLOCKMEND_MAX_DEPTH", default_value_t = 256)]
    pub max_depth: usize,

    /// Listing page size
    #[arg(long, env = "BLOCKMEND_PAGE_SIZE", default_value_t = 1000)]
    pub page_size: usize,

    #[arg(long, env = "BLOCKMEND_OUTPUT", value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl Cli {
    pub fn repair_config(&self) -> RepairConfig {
        RepairConfig {
            namespace: self.prefix.clone(),
            mode: self.mode,
            discovery: self.discovery,
            concurrency: self.concurrency,
            retry_attempts: self.retry_attempts,
            retry_delay_ms: self.retry_delay_ms,
            max_depth: self.max_depth,
            page_size: self.page_size,
            ..Default::default()
        }
    }

    pub fn allow_http(&self) -> bool {
        self.allow_http
            .unwrap_or_else(|| self.endpoint.starts_with("http://"))
    }

    /// Path-style S3 client with static credentials.
    pub fn build_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let store = AmazonS3Builder::new()
            .with_bucket_name(&self.bucket)
            .with_endpoint(&self.endpoint)
            .with_region(&self.region)
            .with_access_key_id(&self.access_key)
            .with_secret_access_key(&self.secret_key)
            .with_allow_http(self.allow_http())
            .with_virtual_hosted_style_request(false)
            .build()
            .with_context(|| format!("failed to build S3 client for bucket {}", self.bucket))?;
        Ok(Arc::new(store))
    }
}
