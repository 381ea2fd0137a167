//! Tag error entity: extraction failures recorded during reindexing, one
//! row per (tag, instance) pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tag_error")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub tag_key: i64,
	#[sea_orm(primary_key, auto_increment = false)]
	pub watermark: i64,
	pub message: String,
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::extended_query_tag::Entity",
		from = "Column::TagKey",
		to = "super::extended_query_tag::Column::Key"
	)]
	ExtendedQueryTag,
}

impl Related<super::extended_query_tag::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::ExtendedQueryTag.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
