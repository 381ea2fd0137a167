//! Instance store: ingested imaging objects and the watermark-based batch
//! planning the reindex pipeline runs on.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
	QuerySelect, Set,
};

use crate::domain::dataset::DicomDataset;
use crate::domain::watermark::WatermarkRange;
use crate::error::{from_db_err, Error, Result, ValidationError};
use crate::infrastructure::database::entities::{index_status, instance};

/// Index status of an instance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
	Creating,
	Created,
}

impl IndexStatus {
	pub fn as_i32(self) -> i32 {
		match self {
			IndexStatus::Creating => index_status::CREATING,
			IndexStatus::Created => index_status::CREATED,
		}
	}
}

/// An instance row as read by the pipeline: identifiers plus the attribute
/// bag tag values are extracted from.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
	pub watermark: i64,
	pub partition_key: i32,
	pub study_instance_uid: String,
	pub series_instance_uid: String,
	pub sop_instance_uid: String,
	pub dataset: DicomDataset,
}

/// Access to ingested instances.
#[async_trait]
pub trait InstanceStore: Send + Sync {
	/// Insert a new instance in status `Creating` and return its watermark.
	/// The study/series/SOP instance UIDs are read from the dataset.
	async fn insert_instance(&self, partition_key: i32, dataset: &DicomDataset) -> Result<i64>;

	/// Flip an instance to `Created`, making it visible to batch planning.
	async fn mark_created(&self, watermark: i64) -> Result<()>;

	/// Highest watermark among instances with the given status.
	async fn max_watermark(&self, status: IndexStatus) -> Result<Option<i64>>;

	/// Partition the qualifying watermarks at or below `max_watermark` into
	/// up to `max_parallel` contiguous ranges of at most `batch_size`
	/// instances each, ordered descending from the high-water mark. An empty
	/// result means no qualifying instances remain.
	async fn get_batches(
		&self,
		batch_size: u64,
		max_parallel: u64,
		status: IndexStatus,
		max_watermark: Option<i64>,
	) -> Result<Vec<WatermarkRange>>;

	/// All instances with the given status inside `range`, ascending.
	async fn get_instances_in_range(
		&self,
		range: WatermarkRange,
		status: IndexStatus,
	) -> Result<Vec<InstanceRecord>>;
}

/// SQL-backed instance store.
pub struct SqlInstanceStore {
	conn: DatabaseConnection,
}

impl SqlInstanceStore {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}
}

#[async_trait]
impl InstanceStore for SqlInstanceStore {
	async fn insert_instance(&self, partition_key: i32, dataset: &DicomDataset) -> Result<i64> {
		let uid = |path: &str| -> Result<String> {
			dataset
				.get(path)
				.map(str::to_string)
				.ok_or_else(|| ValidationError::MissingAttribute(path.to_string()).into())
		};

		let model = instance::ActiveModel {
			partition_key: Set(partition_key),
			study_instance_uid: Set(uid("0020000D")?),
			series_instance_uid: Set(uid("0020000E")?),
			sop_instance_uid: Set(uid("00080018")?),
			status: Set(index_status::CREATING),
			metadata: Set(serde_json::to_value(dataset)
				.map_err(|e| Error::Store(e.to_string()))?),
			created_at: Set(Utc::now()),
			..Default::default()
		};

		let inserted = model.insert(&self.conn).await.map_err(from_db_err)?;
		Ok(inserted.watermark)
	}

	async fn mark_created(&self, watermark: i64) -> Result<()> {
		let updated = instance::Entity::update_many()
			.col_expr(
				instance::Column::Status,
				sea_orm::sea_query::Expr::value(index_status::CREATED),
			)
			.filter(instance::Column::Watermark.eq(watermark))
			.exec(&self.conn)
			.await
			.map_err(from_db_err)?;

		if updated.rows_affected == 0 {
			return Err(Error::NotFound(format!("instance {watermark}")));
		}
		Ok(())
	}

	async fn max_watermark(&self, status: IndexStatus) -> Result<Option<i64>> {
		let row: Option<i64> = instance::Entity::find()
			.select_only()
			.column(instance::Column::Watermark)
			.filter(instance::Column::Status.eq(status.as_i32()))
			.order_by_desc(instance::Column::Watermark)
			.limit(1)
			.into_tuple()
			.one(&self.conn)
			.await
			.map_err(from_db_err)?;
		Ok(row)
	}

	async fn get_batches(
		&self,
		batch_size: u64,
		max_parallel: u64,
		status: IndexStatus,
		max_watermark: Option<i64>,
	) -> Result<Vec<WatermarkRange>> {
		let mut query = instance::Entity::find()
			.select_only()
			.column(instance::Column::Watermark)
			.filter(instance::Column::Status.eq(status.as_i32()))
			.order_by_desc(instance::Column::Watermark)
			.limit(batch_size * max_parallel);

		if let Some(max) = max_watermark {
			query = query.filter(instance::Column::Watermark.lte(max));
		}

		let watermarks: Vec<i64> = query
			.into_tuple()
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;

		// Watermarks arrive descending; each chunk becomes one inclusive
		// range from its last (lowest) to its first (highest) element.
		let ranges = watermarks
			.chunks(batch_size as usize)
			.map(|chunk| WatermarkRange::new(chunk[chunk.len() - 1], chunk[0]))
			.collect();
		Ok(ranges)
	}

	async fn get_instances_in_range(
		&self,
		range: WatermarkRange,
		status: IndexStatus,
	) -> Result<Vec<InstanceRecord>> {
		let models = instance::Entity::find()
			.filter(instance::Column::Status.eq(status.as_i32()))
			.filter(instance::Column::Watermark.between(range.start, range.end))
			.order_by_asc(instance::Column::Watermark)
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;

		models
			.into_iter()
			.map(|model| {
				let dataset: DicomDataset = serde_json::from_value(model.metadata)
					.map_err(|e| Error::Store(format!("corrupt instance metadata: {e}")))?;
				Ok(InstanceRecord {
					watermark: model.watermark,
					partition_key: model.partition_key,
					study_instance_uid: model.study_instance_uid,
					series_instance_uid: model.series_instance_uid,
					sop_instance_uid: model.sop_instance_uid,
					dataset,
				})
			})
			.collect()
	}
}
