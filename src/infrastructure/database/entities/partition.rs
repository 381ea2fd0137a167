//! Partition entity. The default partition row is seeded by the partition
//! migration and is always present.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "partition")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub key: i32,
	pub name: String,
	pub created_date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::domain::Partition {
	fn from(model: Model) -> Self {
		Self {
			key: model.key,
			name: model.name,
			created_date: model.created_date,
		}
	}
}
