//! The schema version oracle: where the currently active schema version
//! comes from.
//!
//! The active version is read rarely relative to call volume, so the SQL
//! oracle caches it and refreshes on a bounded interval or on explicit
//! invalidation, never per call.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{from_db_err, Error, Result};
use crate::infrastructure::database::entities::schema_version;
use crate::schema::version::SchemaVersion;

/// Source of the currently active schema version.
#[async_trait]
pub trait SchemaVersionOracle: Send + Sync {
	/// The currently active schema version.
	async fn current(&self) -> Result<SchemaVersion>;

	/// Drop any cached version so the next read goes to the source. Called
	/// when an upgrade is known to have happened.
	async fn invalidate(&self);
}

/// Reads the active version from the `schema_version` table, cached between
/// refreshes.
pub struct SqlSchemaVersionOracle {
	conn: DatabaseConnection,
	refresh_interval: Duration,
	cached: RwLock<Option<(SchemaVersion, Instant)>>,
}

impl SqlSchemaVersionOracle {
	pub fn new(conn: DatabaseConnection, refresh_interval: Duration) -> Arc<Self> {
		Arc::new(Self {
			conn,
			refresh_interval,
			cached: RwLock::new(None),
		})
	}

	async fn fetch(&self) -> Result<SchemaVersion> {
		let row: Option<i32> = schema_version::Entity::find()
			.select_only()
			.column(schema_version::Column::Version)
			.order_by_desc(schema_version::Column::Version)
			.into_tuple()
			.one(&self.conn)
			.await
			.map_err(from_db_err)?;

		let raw = row.ok_or_else(|| Error::Store("schema version table is empty".to_string()))?;
		SchemaVersion::try_from_i32(raw).ok_or(Error::UnsupportedSchemaVersion { version: raw })
	}
}

#[async_trait]
impl SchemaVersionOracle for SqlSchemaVersionOracle {
	async fn current(&self) -> Result<SchemaVersion> {
		if let Some((version, read_at)) = *self.cached.read().await {
			if read_at.elapsed() < self.refresh_interval {
				return Ok(version);
			}
		}

		let version = self.fetch().await?;
		debug!("Active schema version is {}", version);
		*self.cached.write().await = Some((version, Instant::now()));
		Ok(version)
	}

	async fn invalidate(&self) {
		*self.cached.write().await = None;
	}
}

/// Fixed-version oracle for wiring tests and tools that pin a version.
pub struct FixedSchemaVersionOracle {
	version: RwLock<SchemaVersion>,
}

impl FixedSchemaVersionOracle {
	pub fn new(version: SchemaVersion) -> Arc<Self> {
		Arc::new(Self {
			version: RwLock::new(version),
		})
	}

	pub async fn set(&self, version: SchemaVersion) {
		*self.version.write().await = version;
	}
}

#[async_trait]
impl SchemaVersionOracle for FixedSchemaVersionOracle {
	async fn current(&self) -> Result<SchemaVersion> {
		Ok(*self.version.read().await)
	}

	async fn invalidate(&self) {}
}
