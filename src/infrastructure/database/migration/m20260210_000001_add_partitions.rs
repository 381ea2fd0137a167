//! Partitions: the tenant partition table, seeded with the well-known
//! default partition.

use sea_orm_migration::prelude::*;

use super::stamp_version;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Partition::Table)
					.if_not_exists()
					.col(ColumnDef::new(Partition::Key).integer().not_null().auto_increment().primary_key())
					.col(ColumnDef::new(Partition::Name).string().not_null())
					.col(ColumnDef::new(Partition::CreatedDate).timestamp_with_time_zone().not_null())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("uq_partition_name")
					.table(Partition::Table)
					.col(Partition::Name)
					.unique()
					.to_owned(),
			)
			.await?;

		// Key 1 is reserved for the default partition in every deployment.
		manager
			.exec_stmt(
				Query::insert()
					.into_table(Partition::Table)
					.columns([Partition::Key, Partition::Name, Partition::CreatedDate])
					.values_panic([1.into(), "Default".into(), chrono::Utc::now().into()])
					.to_owned(),
			)
			.await?;

		stamp_version(manager, 4).await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(Partition::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum Partition {
	Table,
	Key,
	Name,
	CreatedDate,
}
