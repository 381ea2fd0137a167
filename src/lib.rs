//! pacs-core
//!
//! Metadata indexing core for a DICOM metadata server: extended-tag
//! lifecycle and reindexing, schema-version-aware store resolution, tenant
//! partition caching, and the typed query filter model.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod operations;
pub mod query;
pub mod schema;
pub mod services;
pub mod stores;

pub use error::{Error, Result};

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::CoreConfig;
use crate::domain::dataset::DicomDataset;
use crate::domain::tag::QueryTag;
use crate::infrastructure::database::Database;
use crate::operations::reindex::{
	activities::{self, ReindexActivities},
	ReindexOrchestrator, ReindexService,
};
use crate::query::QueryService;
use crate::schema::oracle::SqlSchemaVersionOracle;
use crate::schema::resolver::VersionedResolver;
use crate::schema::version::SchemaVersion;
use crate::services::{PartitionService, QueryTagService, TagService};
use crate::stores::{
	ExtendedTagStore, IndexStore, InstanceRecord, InstanceStore, OperationStore, PartitionStore,
	PartitionStoreV1, SqlExtendedTagStore, SqlExtendedTagStoreV2, SqlIndexStore, SqlInstanceStore,
	SqlOperationStore, SqlPartitionStore,
};

/// The main context for the metadata core: owns the database and wires the
/// versioned stores into the services exposed to the API layer.
pub struct PacsCore {
	db: Arc<Database>,

	/// Extended tag registration and removal.
	pub tags: Arc<TagService>,

	/// Merged core + ready extended tag view.
	pub query_tags: Arc<QueryTagService>,

	/// Tenant partitions.
	pub partitions: Arc<PartitionService>,

	/// Reindex operations.
	pub reindex: Arc<ReindexService>,

	/// Filtered instance queries.
	pub query: Arc<QueryService>,

	instance_store: Arc<dyn InstanceStore>,
	index_store: Arc<VersionedResolver<dyn IndexStore>>,
}

impl PacsCore {
	/// Create a new database at `path`, run migrations and wire the core.
	pub async fn create(path: &Path, config: CoreConfig) -> Result<Self> {
		let db = Database::create(path)
			.await
			.map_err(crate::error::from_db_err)?;
		db.migrate().await.map_err(crate::error::from_db_err)?;
		Ok(Self::wire(db, config))
	}

	/// Open an existing database at `path`, applying any pending
	/// migrations.
	pub async fn open(path: &Path, config: CoreConfig) -> Result<Self> {
		let db = Database::open(path)
			.await
			.map_err(crate::error::from_db_err)?;
		db.migrate().await.map_err(crate::error::from_db_err)?;
		Ok(Self::wire(db, config))
	}

	/// Wire the core against an arbitrary database URL. Used by tests with
	/// `sqlite::memory:`.
	pub async fn connect(url: &str, config: CoreConfig) -> Result<Self> {
		let db = Database::connect(url)
			.await
			.map_err(crate::error::from_db_err)?;
		db.migrate().await.map_err(crate::error::from_db_err)?;
		Ok(Self::wire(db, config))
	}

	fn wire(db: Database, config: CoreConfig) -> Self {
		let conn = db.conn().clone();

		let oracle = SqlSchemaVersionOracle::new(conn.clone(), config.schema.refresh_interval());

		// Store implementations register per supported schema version; the
		// resolvers pick the one matching the active version at call time.
		let tag_store: Arc<VersionedResolver<dyn ExtendedTagStore>> = Arc::new(
			VersionedResolver::<dyn ExtendedTagStore>::new(oracle.clone())
				.register(
					SchemaVersion::V2,
					Arc::new(SqlExtendedTagStoreV2::new(conn.clone())),
				)
				.register_range(
					&[SchemaVersion::V3, SchemaVersion::V4],
					Arc::new(SqlExtendedTagStore::new(conn.clone())),
				),
		);
		let index_store: Arc<VersionedResolver<dyn IndexStore>> = Arc::new(
			VersionedResolver::new(oracle.clone()).register_range(
				&[SchemaVersion::V2, SchemaVersion::V3, SchemaVersion::V4],
				Arc::new(SqlIndexStore::new(conn.clone())),
			),
		);
		let partition_store: Arc<VersionedResolver<dyn PartitionStore>> = Arc::new(
			VersionedResolver::<dyn PartitionStore>::new(oracle.clone())
				.register_range(
					&[SchemaVersion::V1, SchemaVersion::V2, SchemaVersion::V3],
					Arc::new(PartitionStoreV1),
				)
				.register(
					SchemaVersion::V4,
					Arc::new(SqlPartitionStore::new(conn.clone())),
				),
		);

		let instance_store: Arc<dyn InstanceStore> =
			Arc::new(SqlInstanceStore::new(conn.clone()));
		let operation_store: Arc<dyn OperationStore> =
			Arc::new(SqlOperationStore::new(conn.clone()));

		let query_tags = Arc::new(QueryTagService::new(tag_store.clone()));
		let tags = Arc::new(TagService::new(
			tag_store.clone(),
			index_store.clone(),
			query_tags.clone(),
			config.reindex.delete_batch_size,
		));

		let activities = Arc::new(ReindexActivities::new(
			tag_store,
			index_store.clone(),
			instance_store.clone(),
			operation_store.clone(),
			config.reindex.instance_workers,
		));
		let orchestrator = Arc::new(ReindexOrchestrator::new(
			activities.clone(),
			config.reindex.clone(),
		));
		let reindex = Arc::new(ReindexService::new(
			orchestrator,
			activities,
			operation_store,
			query_tags.clone(),
		));

		let partitions = Arc::new(PartitionService::new(
			partition_store,
			config.partition_cache.ttl(),
		));
		let query = Arc::new(QueryService::new(conn));

		info!("Metadata core wired (schema latest: {})", SchemaVersion::LATEST);

		Self {
			db: Arc::new(db),
			tags,
			query_tags,
			partitions,
			reindex,
			query,
			instance_store,
			index_store,
		}
	}

	/// Ingest one instance into a partition: store the metadata row, mark it
	/// `Created`, and index every currently `Ready` extended tag inline so
	/// new data never needs a reindex.
	pub async fn ingest_instance(
		&self,
		partition_name: &str,
		dataset: DicomDataset,
	) -> Result<i64> {
		let partition = self.partitions.get_or_create(partition_name).await?;
		let watermark = self
			.instance_store
			.insert_instance(partition.key, &dataset)
			.await?;
		self.instance_store.mark_created(watermark).await?;

		let ready: Vec<_> = self
			.query_tags
			.get_all_tags()
			.await?
			.iter()
			.filter_map(|tag| match tag {
				QueryTag::Extended(entry) => Some(entry.clone()),
				QueryTag::Core(_) => None,
			})
			.collect();

		if !ready.is_empty() {
			let record = InstanceRecord {
				watermark,
				partition_key: partition.key,
				study_instance_uid: dataset.get("0020000D").unwrap_or_default().to_string(),
				series_instance_uid: dataset.get("0020000E").unwrap_or_default().to_string(),
				sop_instance_uid: dataset.get("00080018").unwrap_or_default().to_string(),
				dataset,
			};
			let store = self.index_store.resolve().await?;
			activities::index_instance(store.as_ref(), &record, &ready).await?;
		}

		Ok(watermark)
	}

	/// Direct access to the instance store.
	pub fn instances(&self) -> Arc<dyn InstanceStore> {
		self.instance_store.clone()
	}

	/// The underlying database handle.
	pub fn database(&self) -> Arc<Database> {
		self.db.clone()
	}
}
