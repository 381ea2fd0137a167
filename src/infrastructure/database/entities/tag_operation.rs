//! Tag operation entity: the reindex claim table. The primary key on
//! `tag_key` is the storage-level uniqueness constraint that prevents two
//! reindex runs from racing on one tag.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tag_operation")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub tag_key: i64,
	pub operation_id: Uuid,
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
