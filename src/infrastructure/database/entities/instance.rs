//! Instance entity: one row per ingested imaging object. The watermark is
//! the monotonically increasing row id assigned at ingest.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "instance")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub watermark: i64,
	pub partition_key: i32,
	pub study_instance_uid: String,
	pub series_instance_uid: String,
	pub sop_instance_uid: String,
	/// See [`super::index_status`].
	pub status: i32,
	/// Raw attribute bag captured at ingest, deserialized into a
	/// `DicomDataset` by the instance store.
	pub metadata: Json,
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::tag_value::Entity")]
	TagValue,
}

impl Related<super::tag_value::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::TagValue.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
