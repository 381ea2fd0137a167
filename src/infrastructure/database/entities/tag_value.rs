//! Tag value entity: one index row per (tag, instance) pair. Exactly one of
//! the typed value columns is populated, selected by the tag's VR domain.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tag_value")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub tag_key: i64,
	#[sea_orm(primary_key, auto_increment = false)]
	pub watermark: i64,
	pub partition_key: i32,
	pub tag_level: String,
	pub value_string: Option<String>,
	pub value_long: Option<i64>,
	pub value_double: Option<f64>,
	pub value_date: Option<Date>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::extended_query_tag::Entity",
		from = "Column::TagKey",
		to = "super::extended_query_tag::Column::Key"
	)]
	ExtendedQueryTag,
	#[sea_orm(
		belongs_to = "super::instance::Entity",
		from = "Column::Watermark",
		to = "super::instance::Column::Watermark"
	)]
	Instance,
}

impl Related<super::extended_query_tag::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::ExtendedQueryTag.def()
	}
}

impl Related<super::instance::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Instance.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
