//! Database migrations. Each migration stamps the `schema_version` table;
//! the version oracle reads the highest applied version.

use sea_orm_migration::prelude::*;

mod m20251104_000001_create_initial_tables;
mod m20251220_000001_add_extended_query_tags;
mod m20260115_000001_add_reindex_operations;
mod m20260210_000001_add_partitions;

pub struct Migrator;

impl MigratorTrait for Migrator {
	fn migrations() -> Vec<Box<dyn MigrationTrait>> {
		vec![
			Box::new(m20251104_000001_create_initial_tables::Migration),
			Box::new(m20251220_000001_add_extended_query_tags::Migration),
			Box::new(m20260115_000001_add_reindex_operations::Migration),
			Box::new(m20260210_000001_add_partitions::Migration),
		]
	}
}

/// Record an applied schema version.
pub(crate) async fn stamp_version(manager: &SchemaManager<'_>, version: i32) -> Result<(), DbErr> {
	manager
		.exec_stmt(
			Query::insert()
				.into_table(SchemaVersion::Table)
				.columns([SchemaVersion::Version, SchemaVersion::AppliedAt])
				.values_panic([version.into(), chrono::Utc::now().into()])
				.to_owned(),
		)
		.await
}

#[derive(DeriveIden)]
pub(crate) enum SchemaVersion {
	Table,
	Version,
	AppliedAt,
}
