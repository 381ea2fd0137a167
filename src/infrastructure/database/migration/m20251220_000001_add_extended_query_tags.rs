//! Extended query tags: the tag registry plus the typed index and error
//! tables.

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
					.table(ExtendedQueryTag::Table)
					.if_not_exists()
					.col(ColumnDef::new(ExtendedQueryTag::Key).big_integer().not_null().auto_increment().primary_key())
					.col(ColumnDef::new(ExtendedQueryTag::Path).string().not_null())
					.col(ColumnDef::new(ExtendedQueryTag::Vr).string().not_null())
					.col(ColumnDef::new(ExtendedQueryTag::PrivateCreator).string())
					.col(ColumnDef::new(ExtendedQueryTag::Level).string().not_null())
					.col(ColumnDef::new(ExtendedQueryTag::Status).string().not_null())
					.col(ColumnDef::new(ExtendedQueryTag::CreatedAt).timestamp_with_time_zone().not_null())
					.to_owned(),
			)
			.await?;

		// Paths are stored normalized, so this index enforces the
		// case-insensitive uniqueness the registration contract requires.
		manager
			.create_index(
				Index::create()
					.name("uq_extended_query_tag_path")
					.table(ExtendedQueryTag::Table)
					.col(ExtendedQueryTag::Path)
					.unique()
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(TagValue::Table)
					.if_not_exists()
					.col(ColumnDef::new(TagValue::TagKey).big_integer().not_null())
					.col(ColumnDef::new(TagValue::Watermark).big_integer().not_null())
					.col(ColumnDef::new(TagValue::PartitionKey).integer().not_null().default(1))
					.col(ColumnDef::new(TagValue::TagLevel).string().not_null())
					.col(ColumnDef::new(TagValue::ValueString).string())
					.col(ColumnDef::new(TagValue::ValueLong).big_integer())
					.col(ColumnDef::new(TagValue::ValueDouble).double())
					.col(ColumnDef::new(TagValue::ValueDate).date())
					.primary_key(
						Index::create()
							.col(TagValue::TagKey)
							.col(TagValue::Watermark),
					)
					.foreign_key(
						ForeignKey::create()
							.from(TagValue::Table, TagValue::TagKey)
							.to(ExtendedQueryTag::Table, ExtendedQueryTag::Key),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(TagError::Table)
					.if_not_exists()
					.col(ColumnDef::new(TagError::TagKey).big_integer().not_null())
					.col(ColumnDef::new(TagError::Watermark).big_integer().not_null())
					.col(ColumnDef::new(TagError::Message).string().not_null())
					.col(ColumnDef::new(TagError::CreatedAt).timestamp_with_time_zone().not_null())
					.primary_key(
						Index::create()
							.col(TagError::TagKey)
							.col(TagError::Watermark),
					)
					.foreign_key(
						ForeignKey::create()
							.from(TagError::Table, TagError::TagKey)
							.to(ExtendedQueryTag::Table, ExtendedQueryTag::Key),
					)
					.to_owned(),
			)
			.await?;

		stamp_version(manager, 2).await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(TagError::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(TagValue::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(ExtendedQueryTag::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum ExtendedQueryTag {
	Table,
	Key,
	Path,
	Vr,
	PrivateCreator,
	Level,
	Status,
	CreatedAt,
}

#[derive(DeriveIden)]
enum TagValue {
	Table,
	TagKey,
	Watermark,
	PartitionKey,
	TagLevel,
	ValueString,
	ValueLong,
	ValueDouble,
	ValueDate,
}

#[derive(DeriveIden)]
enum TagError {
	Table,
	TagKey,
	Watermark,
	Message,
	CreatedAt,
}
