//! Core configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Top-level configuration for the metadata core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoreConfig {
	pub reindex: ReindexConfig,
	pub partition_cache: PartitionCacheConfig,
	pub schema: SchemaConfig,
}

impl CoreConfig {
	/// Load configuration from a TOML file, falling back to defaults when
	/// the file does not exist.
	pub fn load_or_default(path: &Path) -> Result<Self> {
		if !path.exists() {
			info!("No config file at {:?}, using defaults", path);
			return Ok(Self::default());
		}
		let raw = std::fs::read_to_string(path)
			.with_context(|| format!("failed to read config at {}", path.display()))?;
		let config = toml::from_str(&raw)
			.with_context(|| format!("failed to parse config at {}", path.display()))?;
		Ok(config)
	}
}

/// Reindex pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexConfig {
	/// Maximum instances per watermark range.
	pub batch_size: u64,
	/// Maximum ranges planned (and executed concurrently) per round.
	pub max_parallel_batches: u64,
	/// Object-level worker count inside one batch activity.
	pub instance_workers: usize,
	/// Batch size for the tag delete drain.
	pub delete_batch_size: u64,
	pub retry: RetryConfig,
}

impl Default for ReindexConfig {
	fn default() -> Self {
		Self {
			batch_size: 100,
			max_parallel_batches: 4,
			instance_workers: 8,
			delete_batch_size: 1000,
			retry: RetryConfig::default(),
		}
	}
}

/// Bounded retry policy applied around each pipeline activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub initial_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub multiplier: f64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_backoff_ms: 100,
			max_backoff_ms: 5_000,
			multiplier: 2.0,
		}
	}
}

impl RetryConfig {
	pub fn backoff(&self) -> backoff::ExponentialBackoff {
		backoff::ExponentialBackoff {
			initial_interval: Duration::from_millis(self.initial_backoff_ms),
			max_interval: Duration::from_millis(self.max_backoff_ms),
			multiplier: self.multiplier,
			max_elapsed_time: None,
			..Default::default()
		}
	}

	pub fn max_interval(&self) -> Duration {
		Duration::from_millis(self.max_backoff_ms)
	}
}

/// Partition cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionCacheConfig {
	pub ttl_secs: u64,
}

impl Default for PartitionCacheConfig {
	fn default() -> Self {
		Self { ttl_secs: 600 }
	}
}

impl PartitionCacheConfig {
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_secs)
	}
}

/// Schema version oracle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
	/// How long a cached schema version read stays valid.
	pub refresh_interval_secs: u64,
}

impl Default for SchemaConfig {
	fn default() -> Self {
		Self {
			refresh_interval_secs: 60,
		}
	}
}

impl SchemaConfig {
	pub fn refresh_interval(&self) -> Duration {
		Duration::from_secs(self.refresh_interval_secs)
	}
}
