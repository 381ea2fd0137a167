//! Extended tag store: registration, lifecycle transitions and the reindex
//! claim that serializes runs per tag.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
	PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::domain::tag::{ExtendedTagEntry, TagLevel, TagStatus, ValidatedTagInput, Vr};
use crate::error::{from_db_err, is_unique_violation, Error, Result};
use crate::infrastructure::database::entities::{
	extended_query_tag, tag_error, tag_operation, tag_value,
};
use crate::schema::version::SchemaVersion;

/// Access to extended tag metadata.
#[async_trait]
pub trait ExtendedTagStore: Send + Sync + std::fmt::Debug {
	/// Insert all entries atomically in status `Adding`. Fails with
	/// `TagAlreadyExists` if any path is already registered.
	async fn add_tags(&self, entries: &[ValidatedTagInput]) -> Result<Vec<ExtendedTagEntry>>;

	/// All registered tags, every status.
	async fn get_tags(&self) -> Result<Vec<ExtendedTagEntry>>;

	/// Single tag by normalized path.
	async fn get_tag_by_path(&self, path: &str) -> Result<ExtendedTagEntry>;

	/// Single tag by key.
	async fn get_tag(&self, key: i64) -> Result<ExtendedTagEntry>;

	/// All tags with the given status.
	async fn get_tags_by_status(&self, status: TagStatus) -> Result<Vec<ExtendedTagEntry>>;

	/// Atomically claim a set of `Adding` tags for one reindex operation.
	///
	/// The claim is a storage-level conflict check: a tag already claimed by
	/// a different in-flight operation fails with `TagBusy`. Re-claiming by
	/// the same operation is a no-op, which makes activity retries safe.
	/// With `return_if_completed`, tags that are already `Ready` are
	/// returned without re-claiming.
	async fn assign_reindex_operation(
		&self,
		tag_keys: &[i64],
		operation_id: Uuid,
		return_if_completed: bool,
	) -> Result<Vec<ExtendedTagEntry>>;

	/// Tags currently claimed by an operation.
	async fn get_tags_by_operation(&self, operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>>;

	/// Flip every `Adding` tag claimed by the operation to `Ready` and drop
	/// the claims. Tags that moved to `Deleting` mid-reindex keep their
	/// status; their claims are dropped too.
	async fn complete_reindex(&self, operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>>;

	/// Apply a lifecycle transition, enforcing the state machine.
	async fn update_status(&self, tag_key: i64, status: TagStatus) -> Result<ExtendedTagEntry>;

	/// Remove a tag row. Fails unless the tag is `Deleting` and its index
	/// and error rows are fully drained.
	async fn delete_entry(&self, tag_key: i64) -> Result<()>;
}

/// SQL-backed extended tag store for schemas with reindex-operation support.
#[derive(Debug)]
pub struct SqlExtendedTagStore {
	conn: DatabaseConnection,
}

impl SqlExtendedTagStore {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}

	async fn find_tags_by_keys(
		txn: &DatabaseTransaction,
		tag_keys: &[i64],
	) -> Result<Vec<extended_query_tag::Model>> {
		let models = extended_query_tag::Entity::find()
			.filter(extended_query_tag::Column::Key.is_in(tag_keys.to_vec()))
			.all(txn)
			.await
			.map_err(from_db_err)?;

		for key in tag_keys {
			if !models.iter().any(|m| m.key == *key) {
				return Err(Error::NotFound(format!("extended tag {key}")));
			}
		}
		Ok(models)
	}
}

#[async_trait]
impl ExtendedTagStore for SqlExtendedTagStore {
	async fn add_tags(&self, entries: &[ValidatedTagInput]) -> Result<Vec<ExtendedTagEntry>> {
		let txn = self.conn.begin().await.map_err(from_db_err)?;

		let mut created = Vec::with_capacity(entries.len());
		for entry in entries {
			let model = extended_query_tag::ActiveModel {
				path: Set(entry.path.clone()),
				vr: Set(entry.vr.to_string()),
				private_creator: Set(entry.private_creator.clone()),
				level: Set(entry.level.to_string()),
				status: Set(TagStatus::Adding.to_string()),
				created_at: Set(Utc::now()),
				..Default::default()
			};

			let inserted = model.insert(&txn).await.map_err(|e| {
				if is_unique_violation(&e) {
					Error::TagAlreadyExists {
						path: entry.path.clone(),
					}
				} else {
					from_db_err(e)
				}
			})?;
			created.push(to_entry(inserted)?);
		}

		txn.commit().await.map_err(from_db_err)?;
		Ok(created)
	}

	async fn get_tags(&self) -> Result<Vec<ExtendedTagEntry>> {
		let models = extended_query_tag::Entity::find()
			.order_by_asc(extended_query_tag::Column::Key)
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;
		models.into_iter().map(to_entry).collect()
	}

	async fn get_tag_by_path(&self, path: &str) -> Result<ExtendedTagEntry> {
		let model = extended_query_tag::Entity::find()
			.filter(extended_query_tag::Column::Path.eq(path))
			.one(&self.conn)
			.await
			.map_err(from_db_err)?
			.ok_or_else(|| Error::NotFound(format!("extended tag '{path}'")))?;
		to_entry(model)
	}

	async fn get_tag(&self, key: i64) -> Result<ExtendedTagEntry> {
		let model = extended_query_tag::Entity::find_by_id(key)
			.one(&self.conn)
			.await
			.map_err(from_db_err)?
			.ok_or_else(|| Error::NotFound(format!("extended tag {key}")))?;
		to_entry(model)
	}

	async fn get_tags_by_status(&self, status: TagStatus) -> Result<Vec<ExtendedTagEntry>> {
		let models = extended_query_tag::Entity::find()
			.filter(extended_query_tag::Column::Status.eq(status.to_string()))
			.order_by_asc(extended_query_tag::Column::Key)
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;
		models.into_iter().map(to_entry).collect()
	}

	async fn assign_reindex_operation(
		&self,
		tag_keys: &[i64],
		operation_id: Uuid,
		return_if_completed: bool,
	) -> Result<Vec<ExtendedTagEntry>> {
		let txn = self.conn.begin().await.map_err(from_db_err)?;
		let models = Self::find_tags_by_keys(&txn, tag_keys).await?;

		let mut assigned = Vec::new();
		for model in models {
			let status: TagStatus = model
				.status
				.parse()
				.map_err(|_| corrupt_status(&model.status))?;
			match status {
				TagStatus::Adding => {
					let claim = tag_operation::ActiveModel {
						tag_key: Set(model.key),
						operation_id: Set(operation_id),
					};
					match claim.insert(&txn).await {
						Ok(_) => assigned.push(to_entry(model)?),
						Err(e) if is_unique_violation(&e) => {
							let existing = tag_operation::Entity::find_by_id(model.key)
								.one(&txn)
								.await
								.map_err(from_db_err)?;
							match existing {
								Some(claim) if claim.operation_id == operation_id => {
									assigned.push(to_entry(model)?);
								}
								Some(claim) => {
									return Err(Error::TagBusy {
										key: model.key,
										operation_id: claim.operation_id,
									});
								}
								// Claim row vanished between insert and read;
								// treat as contention and let the caller retry.
								None => {
									return Err(Error::Transient(format!(
										"claim for tag {} changed concurrently",
										model.key
									)));
								}
							}
						}
						Err(e) => return Err(from_db_err(e)),
					}
				}
				TagStatus::Ready if return_if_completed => assigned.push(to_entry(model)?),
				// Ready without the flag, or Deleting: nothing to reindex.
				TagStatus::Ready | TagStatus::Deleting => {}
			}
		}

		txn.commit().await.map_err(from_db_err)?;
		Ok(assigned)
	}

	async fn get_tags_by_operation(&self, operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>> {
		let claims = tag_operation::Entity::find()
			.filter(tag_operation::Column::OperationId.eq(operation_id))
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;

		let keys: Vec<i64> = claims.iter().map(|c| c.tag_key).collect();
		if keys.is_empty() {
			return Ok(Vec::new());
		}

		let models = extended_query_tag::Entity::find()
			.filter(extended_query_tag::Column::Key.is_in(keys))
			.order_by_asc(extended_query_tag::Column::Key)
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;
		models.into_iter().map(to_entry).collect()
	}

	async fn complete_reindex(&self, operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>> {
		let txn = self.conn.begin().await.map_err(from_db_err)?;

		let claims = tag_operation::Entity::find()
			.filter(tag_operation::Column::OperationId.eq(operation_id))
			.all(&txn)
			.await
			.map_err(from_db_err)?;
		let keys: Vec<i64> = claims.iter().map(|c| c.tag_key).collect();

		let mut completed = Vec::new();
		if !keys.is_empty() {
			let models = extended_query_tag::Entity::find()
				.filter(extended_query_tag::Column::Key.is_in(keys.clone()))
				.all(&txn)
				.await
				.map_err(from_db_err)?;

			for model in models {
				let status: TagStatus = model
					.status
					.parse()
					.map_err(|_| corrupt_status(&model.status))?;
				// A tag moved to Deleting mid-reindex stays Deleting; the
				// queryability gate must not reopen for it.
				if status == TagStatus::Adding {
					let mut active: extended_query_tag::ActiveModel = model.into();
					active.status = Set(TagStatus::Ready.to_string());
					let updated = active.update(&txn).await.map_err(from_db_err)?;
					completed.push(to_entry(updated)?);
				}
			}

			tag_operation::Entity::delete_many()
				.filter(tag_operation::Column::OperationId.eq(operation_id))
				.exec(&txn)
				.await
				.map_err(from_db_err)?;
		}

		txn.commit().await.map_err(from_db_err)?;
		Ok(completed)
	}

	async fn update_status(&self, tag_key: i64, status: TagStatus) -> Result<ExtendedTagEntry> {
		let txn = self.conn.begin().await.map_err(from_db_err)?;

		let model = extended_query_tag::Entity::find_by_id(tag_key)
			.one(&txn)
			.await
			.map_err(from_db_err)?
			.ok_or_else(|| Error::NotFound(format!("extended tag {tag_key}")))?;

		let current: TagStatus = model
			.status
			.parse()
			.map_err(|_| corrupt_status(&model.status))?;
		if !current.can_transition_to(status) {
			return Err(Error::InvalidStateTransition {
				from: current,
				to: status,
			});
		}

		let mut active: extended_query_tag::ActiveModel = model.into();
		active.status = Set(status.to_string());
		let updated = active.update(&txn).await.map_err(from_db_err)?;

		txn.commit().await.map_err(from_db_err)?;
		to_entry(updated)
	}

	async fn delete_entry(&self, tag_key: i64) -> Result<()> {
		let txn = self.conn.begin().await.map_err(from_db_err)?;

		let model = extended_query_tag::Entity::find_by_id(tag_key)
			.one(&txn)
			.await
			.map_err(from_db_err)?
			.ok_or_else(|| Error::NotFound(format!("extended tag {tag_key}")))?;

		let status: TagStatus = model
			.status
			.parse()
			.map_err(|_| corrupt_status(&model.status))?;
		if status != TagStatus::Deleting {
			return Err(Error::TagNotRemovable {
				key: tag_key,
				status,
			});
		}

		let values = tag_value::Entity::find()
			.filter(tag_value::Column::TagKey.eq(tag_key))
			.count(&txn)
			.await
			.map_err(from_db_err)?;
		let errors = tag_error::Entity::find()
			.filter(tag_error::Column::TagKey.eq(tag_key))
			.count(&txn)
			.await
			.map_err(from_db_err)?;
		if values > 0 || errors > 0 {
			return Err(Error::TagNotDrained { key: tag_key });
		}

		tag_operation::Entity::delete_many()
			.filter(tag_operation::Column::TagKey.eq(tag_key))
			.exec(&txn)
			.await
			.map_err(from_db_err)?;
		extended_query_tag::Entity::delete_by_id(tag_key)
			.exec(&txn)
			.await
			.map_err(from_db_err)?;

		txn.commit().await.map_err(from_db_err)?;
		Ok(())
	}
}

/// Extended tag store for pre-reindex schemas (V2): tag CRUD works, but
/// anything touching reindex operations needs the V3 upgrade first.
#[derive(Debug)]
pub struct SqlExtendedTagStoreV2 {
	inner: SqlExtendedTagStore,
}

impl SqlExtendedTagStoreV2 {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self {
			inner: SqlExtendedTagStore::new(conn),
		}
	}

	fn upgrade_required<T>() -> Result<T> {
		Err(Error::SchemaUpgradeRequired {
			required: SchemaVersion::V3,
		})
	}
}

#[async_trait]
impl ExtendedTagStore for SqlExtendedTagStoreV2 {
	async fn add_tags(&self, entries: &[ValidatedTagInput]) -> Result<Vec<ExtendedTagEntry>> {
		self.inner.add_tags(entries).await
	}

	async fn get_tags(&self) -> Result<Vec<ExtendedTagEntry>> {
		self.inner.get_tags().await
	}

	async fn get_tag_by_path(&self, path: &str) -> Result<ExtendedTagEntry> {
		self.inner.get_tag_by_path(path).await
	}

	async fn get_tag(&self, key: i64) -> Result<ExtendedTagEntry> {
		self.inner.get_tag(key).await
	}

	async fn get_tags_by_status(&self, status: TagStatus) -> Result<Vec<ExtendedTagEntry>> {
		self.inner.get_tags_by_status(status).await
	}

	async fn assign_reindex_operation(
		&self,
		_tag_keys: &[i64],
		_operation_id: Uuid,
		_return_if_completed: bool,
	) -> Result<Vec<ExtendedTagEntry>> {
		Self::upgrade_required()
	}

	async fn get_tags_by_operation(&self, _operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>> {
		Self::upgrade_required()
	}

	async fn complete_reindex(&self, _operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>> {
		Self::upgrade_required()
	}

	async fn update_status(&self, tag_key: i64, status: TagStatus) -> Result<ExtendedTagEntry> {
		self.inner.update_status(tag_key, status).await
	}

	async fn delete_entry(&self, tag_key: i64) -> Result<()> {
		self.inner.delete_entry(tag_key).await
	}
}

fn to_entry(model: extended_query_tag::Model) -> Result<ExtendedTagEntry> {
	let vr: Vr = model
		.vr
		.parse()
		.map_err(|_| Error::Store(format!("corrupt tag row: unknown vr '{}'", model.vr)))?;
	let level: TagLevel = model
		.level
		.parse()
		.map_err(|_| Error::Store(format!("corrupt tag row: unknown level '{}'", model.level)))?;
	let status: TagStatus = model
		.status
		.parse()
		.map_err(|_| corrupt_status(&model.status))?;

	Ok(ExtendedTagEntry {
		key: model.key,
		path: model.path,
		vr,
		private_creator: model.private_creator,
		level,
		status,
	})
}

fn corrupt_status(raw: &str) -> Error {
	Error::Store(format!("corrupt tag row: unknown status '{raw}'"))
}
