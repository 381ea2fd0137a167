//! Initial migration: instance table and the schema version ledger.

use sea_orm_migration::prelude::*;

use super::{stamp_version, SchemaVersion};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(SchemaVersion::Table)
					.if_not_exists()
					.col(ColumnDef::new(SchemaVersion::Version).integer().not_null().primary_key())
					.col(ColumnDef::new(SchemaVersion::AppliedAt).timestamp_with_time_zone().not_null())
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Instance::Table)
					.if_not_exists()
					.col(ColumnDef::new(Instance::Watermark).big_integer().not_null().auto_increment().primary_key())
					.col(ColumnDef::new(Instance::PartitionKey).integer().not_null().default(1))
					.col(ColumnDef::new(Instance::StudyInstanceUid).string().not_null())
					.col(ColumnDef::new(Instance::SeriesInstanceUid).string().not_null())
					.col(ColumnDef::new(Instance::SopInstanceUid).string().not_null())
					.col(ColumnDef::new(Instance::Status).integer().not_null().default(0))
					.col(ColumnDef::new(Instance::Metadata).json().not_null())
					.col(ColumnDef::new(Instance::CreatedAt).timestamp_with_time_zone().not_null())
					.to_owned(),
			)
			.await?;

		// Batch planning scans Created instances in descending watermark order.
		manager
			.create_index(
				Index::create()
					.name("ix_instance_status_watermark")
					.table(Instance::Table)
					.col(Instance::Status)
					.col(Instance::Watermark)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("uq_instance_partition_sop")
					.table(Instance::Table)
					.col(Instance::PartitionKey)
					.col(Instance::SopInstanceUid)
					.unique()
					.to_owned(),
			)
			.await?;

		stamp_version(manager, 1).await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(Instance::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(SchemaVersion::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum Instance {
	Table,
	Watermark,
	PartitionKey,
	StudyInstanceUid,
	SeriesInstanceUid,
	SopInstanceUid,
	Status,
	Metadata,
	CreatedAt,
}
