//! Extended query tag entity: one row per user-registered searchable
//! attribute. Paths are stored normalized (uppercase), which makes the
//! unique index on `path` case-insensitive in effect.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "extended_query_tag")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub key: i64,
	pub path: String,
	pub vr: String,
	pub private_creator: Option<String>,
	pub level: String,
	pub status: String,
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::tag_value::Entity")]
	TagValue,
	#[sea_orm(has_many = "super::tag_error::Entity")]
	TagError,
	#[sea_orm(has_one = "super::tag_operation::Entity")]
	TagOperation,
}

impl Related<super::tag_value::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::TagValue.def()
	}
}

impl Related<super::tag_error::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::TagError.def()
	}
}

impl Related<super::tag_operation::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::TagOperation.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
