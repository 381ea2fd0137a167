//! Reindex operation entity: the durable progress record of one reindexing
//! run.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reindex_operation")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub operation_id: Uuid,
	pub status: String,
	pub start_watermark: Option<i64>,
	pub end_watermark: Option<i64>,
	pub error_class: Option<String>,
	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
