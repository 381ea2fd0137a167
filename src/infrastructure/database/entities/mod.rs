//! SeaORM entity definitions.

pub mod extended_query_tag;
pub mod instance;
pub mod partition;
pub mod reindex_operation;
pub mod schema_version;
pub mod tag_error;
pub mod tag_operation;
pub mod tag_value;

/// Index status values stored on instance rows.
pub mod index_status {
	/// Metadata row exists but the object is not yet fully persisted.
	pub const CREATING: i32 = 0;
	/// The object is fully persisted and eligible for (re)indexing.
	pub const CREATED: i32 = 1;
}
