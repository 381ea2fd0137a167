//! Index store: typed tag-value rows and tag-error rows.
//!
//! Writes are idempotent upserts keyed on (tag, watermark) so a retried
//! batch overwrites rather than fails; deletes are capped per call to serve
//! the drain loop.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
	ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
};

use crate::domain::dataset::AttributeValue;
use crate::domain::tag::TagLevel;
use crate::error::{from_db_err, Result};
use crate::infrastructure::database::entities::{tag_error, tag_value};
use crate::stores::instance::InstanceRecord;

/// One extracted tag value destined for the index.
#[derive(Debug, Clone, PartialEq)]
pub struct TagValueWrite {
	pub tag_key: i64,
	pub level: TagLevel,
	pub value: AttributeValue,
}

/// Access to index and error rows.
#[async_trait]
pub trait IndexStore: Send + Sync {
	/// Write index rows for one instance. Writing a row that already exists
	/// overwrites it; retrying a batch is a no-op in effect.
	async fn upsert_tag_values(
		&self,
		instance: &InstanceRecord,
		values: &[TagValueWrite],
	) -> Result<()>;

	/// Record an extraction failure for (tag, instance). Idempotent.
	async fn record_tag_error(&self, tag_key: i64, watermark: i64, message: &str) -> Result<()>;

	/// Delete up to `limit` index rows for a tag; returns how many went.
	async fn delete_tag_values(&self, tag_key: i64, limit: u64) -> Result<u64>;

	/// Delete up to `limit` error rows for a tag; returns how many went.
	async fn delete_tag_errors(&self, tag_key: i64, limit: u64) -> Result<u64>;

	/// Remaining (index, error) row counts for a tag.
	async fn tag_row_counts(&self, tag_key: i64) -> Result<(u64, u64)>;
}

/// SQL-backed index store.
pub struct SqlIndexStore {
	conn: DatabaseConnection,
}

impl SqlIndexStore {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}
}

#[async_trait]
impl IndexStore for SqlIndexStore {
	async fn upsert_tag_values(
		&self,
		instance: &InstanceRecord,
		values: &[TagValueWrite],
	) -> Result<()> {
		if values.is_empty() {
			return Ok(());
		}

		let models: Vec<tag_value::ActiveModel> = values
			.iter()
			.map(|write| {
				let mut model = tag_value::ActiveModel {
					tag_key: Set(write.tag_key),
					watermark: Set(instance.watermark),
					partition_key: Set(instance.partition_key),
					tag_level: Set(write.level.to_string()),
					value_string: Set(None),
					value_long: Set(None),
					value_double: Set(None),
					value_date: Set(None),
				};
				match &write.value {
					AttributeValue::String(v) => model.value_string = Set(Some(v.clone())),
					AttributeValue::Long(v) => model.value_long = Set(Some(*v)),
					AttributeValue::Double(v) => model.value_double = Set(Some(*v)),
					AttributeValue::Date(v) => model.value_date = Set(Some(*v)),
				}
				model
			})
			.collect();

		tag_value::Entity::insert_many(models)
			.on_conflict(
				OnConflict::columns([tag_value::Column::TagKey, tag_value::Column::Watermark])
					.update_columns([
						tag_value::Column::PartitionKey,
						tag_value::Column::TagLevel,
						tag_value::Column::ValueString,
						tag_value::Column::ValueLong,
						tag_value::Column::ValueDouble,
						tag_value::Column::ValueDate,
					])
					.to_owned(),
			)
			.exec_without_returning(&self.conn)
			.await
			.map_err(from_db_err)?;
		Ok(())
	}

	async fn record_tag_error(&self, tag_key: i64, watermark: i64, message: &str) -> Result<()> {
		let model = tag_error::ActiveModel {
			tag_key: Set(tag_key),
			watermark: Set(watermark),
			message: Set(message.to_string()),
			created_at: Set(Utc::now()),
		};

		tag_error::Entity::insert(model)
			.on_conflict(
				OnConflict::columns([tag_error::Column::TagKey, tag_error::Column::Watermark])
					.update_columns([tag_error::Column::Message, tag_error::Column::CreatedAt])
					.to_owned(),
			)
			.exec_without_returning(&self.conn)
			.await
			.map_err(from_db_err)?;
		Ok(())
	}

	async fn delete_tag_values(&self, tag_key: i64, limit: u64) -> Result<u64> {
		let victims: Vec<i64> = tag_value::Entity::find()
			.select_only()
			.column(tag_value::Column::Watermark)
			.filter(tag_value::Column::TagKey.eq(tag_key))
			.limit(limit)
			.into_tuple()
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;

		if victims.is_empty() {
			return Ok(0);
		}

		let deleted = tag_value::Entity::delete_many()
			.filter(tag_value::Column::TagKey.eq(tag_key))
			.filter(tag_value::Column::Watermark.is_in(victims))
			.exec(&self.conn)
			.await
			.map_err(from_db_err)?;
		Ok(deleted.rows_affected)
	}

	async fn delete_tag_errors(&self, tag_key: i64, limit: u64) -> Result<u64> {
		let victims: Vec<i64> = tag_error::Entity::find()
			.select_only()
			.column(tag_error::Column::Watermark)
			.filter(tag_error::Column::TagKey.eq(tag_key))
			.limit(limit)
			.into_tuple()
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;

		if victims.is_empty() {
			return Ok(0);
		}

		let deleted = tag_error::Entity::delete_many()
			.filter(tag_error::Column::TagKey.eq(tag_key))
			.filter(tag_error::Column::Watermark.is_in(victims))
			.exec(&self.conn)
			.await
			.map_err(from_db_err)?;
		Ok(deleted.rows_affected)
	}

	async fn tag_row_counts(&self, tag_key: i64) -> Result<(u64, u64)> {
		let values = tag_value::Entity::find()
			.filter(tag_value::Column::TagKey.eq(tag_key))
			.count(&self.conn)
			.await
			.map_err(from_db_err)?;
		let errors = tag_error::Entity::find()
			.filter(tag_error::Column::TagKey.eq(tag_key))
			.count(&self.conn)
			.await
			.map_err(from_db_err)?;
		Ok((values, errors))
	}
}
