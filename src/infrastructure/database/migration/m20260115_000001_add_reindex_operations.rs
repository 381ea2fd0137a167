//! Reindex operations: the claim table and the durable progress record.

use sea_orm_migration::prelude::*;

use super::stamp_version;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		// The primary key on tag_key is the storage-level conflict check
		// behind claim assignment: a second operation inserting a claim for
		// the same tag hits a unique violation.
		manager
			.create_table(
				Table::create()
					.table(TagOperation::Table)
					.if_not_exists()
					.col(ColumnDef::new(TagOperation::TagKey).big_integer().not_null().primary_key())
					.col(ColumnDef::new(TagOperation::OperationId).uuid().not_null())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("ix_tag_operation_operation_id")
					.table(TagOperation::Table)
					.col(TagOperation::OperationId)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(ReindexOperation::Table)
					.if_not_exists()
					.col(ColumnDef::new(ReindexOperation::OperationId).uuid().not_null().primary_key())
					.col(ColumnDef::new(ReindexOperation::Status).string().not_null())
					.col(ColumnDef::new(ReindexOperation::StartWatermark).big_integer())
					.col(ColumnDef::new(ReindexOperation::EndWatermark).big_integer())
					.col(ColumnDef::new(ReindexOperation::ErrorClass).string())
					.col(ColumnDef::new(ReindexOperation::CreatedAt).timestamp_with_time_zone().not_null())
					.col(ColumnDef::new(ReindexOperation::UpdatedAt).timestamp_with_time_zone().not_null())
					.to_owned(),
			)
			.await?;

		stamp_version(manager, 3).await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(ReindexOperation::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(TagOperation::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum TagOperation {
	Table,
	TagKey,
	OperationId,
}

#[derive(DeriveIden)]
enum ReindexOperation {
	Table,
	OperationId,
	Status,
	StartWatermark,
	EndWatermark,
	ErrorClass,
	CreatedAt,
	UpdatedAt,
}
