//! Partition store: tenant partition records.
//!
//! Two implementations cover the live-upgrade window: the pre-partition
//! schema only knows the built-in default partition and answers creation
//! with a deterministic upgrade-required error, so a caller can never get
//! silently wrong results from a node that has not been migrated yet.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::partition::Partition;
use crate::error::{from_db_err, is_unique_violation, Error, Result};
use crate::infrastructure::database::entities::partition;
use crate::schema::version::SchemaVersion;

/// Access to partition records.
#[async_trait]
pub trait PartitionStore: Send + Sync {
	/// Create a partition. Fails with `PartitionAlreadyExists` on duplicate
	/// name.
	async fn create(&self, name: &str) -> Result<Partition>;

	/// Fetch a partition by name.
	async fn get(&self, name: &str) -> Result<Option<Partition>>;

	/// All partitions.
	async fn list(&self) -> Result<Vec<Partition>>;
}

/// SQL-backed partition store for schemas with partition support.
pub struct SqlPartitionStore {
	conn: DatabaseConnection,
}

impl SqlPartitionStore {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}
}

#[async_trait]
impl PartitionStore for SqlPartitionStore {
	async fn create(&self, name: &str) -> Result<Partition> {
		let model = partition::ActiveModel {
			name: Set(name.to_string()),
			created_date: Set(Utc::now()),
			..Default::default()
		};

		let inserted = model.insert(&self.conn).await.map_err(|e| {
			if is_unique_violation(&e) {
				Error::PartitionAlreadyExists {
					name: name.to_string(),
				}
			} else {
				from_db_err(e)
			}
		})?;
		Ok(inserted.into())
	}

	async fn get(&self, name: &str) -> Result<Option<Partition>> {
		let model = partition::Entity::find()
			.filter(partition::Column::Name.eq(name))
			.one(&self.conn)
			.await
			.map_err(from_db_err)?;
		Ok(model.map(Into::into))
	}

	async fn list(&self) -> Result<Vec<Partition>> {
		let models = partition::Entity::find()
			.order_by_asc(partition::Column::Key)
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;
		Ok(models.into_iter().map(Into::into).collect())
	}
}

/// Partition store for pre-partition schemas (V1-V3): only the built-in
/// default partition exists, and creating anything else needs the V4
/// upgrade first.
pub struct PartitionStoreV1;

#[async_trait]
impl PartitionStore for PartitionStoreV1 {
	async fn create(&self, _name: &str) -> Result<Partition> {
		Err(Error::SchemaUpgradeRequired {
			required: SchemaVersion::V4,
		})
	}

	async fn get(&self, name: &str) -> Result<Option<Partition>> {
		let default = Partition::default_partition();
		Ok((name == default.name).then_some(default))
	}

	async fn list(&self) -> Result<Vec<Partition>> {
		Ok(vec![Partition::default_partition()])
	}
}
