//! Tag service: the extended-tag CRUD surface exposed to the API layer.

use std::sync::Arc;
use tracing::info;

use crate::domain::tag::{ExtendedTagEntry, ExtendedTagInput, TagStatus, ValidatedTagInput};
use crate::error::{Result, ValidationError};
use crate::operations::drain::drain_tag;
use crate::schema::resolver::VersionedResolver;
use crate::services::query_tags::QueryTagService;
use crate::stores::extended_tag::ExtendedTagStore;
use crate::stores::index::IndexStore;

/// Extended-tag registration, lookup and removal.
pub struct TagService {
	tag_store: Arc<VersionedResolver<dyn ExtendedTagStore>>,
	index_store: Arc<VersionedResolver<dyn IndexStore>>,
	query_tags: Arc<QueryTagService>,
	delete_batch_size: u64,
}

impl TagService {
	pub fn new(
		tag_store: Arc<VersionedResolver<dyn ExtendedTagStore>>,
		index_store: Arc<VersionedResolver<dyn IndexStore>>,
		query_tags: Arc<QueryTagService>,
		delete_batch_size: u64,
	) -> Self {
		Self {
			tag_store,
			index_store,
			query_tags,
			delete_batch_size,
		}
	}

	/// Register new extended tags in status `Adding`. They become queryable
	/// only after a reindex operation completes.
	pub async fn add_tags(&self, inputs: &[ExtendedTagInput]) -> Result<Vec<ExtendedTagEntry>> {
		if inputs.is_empty() {
			return Err(ValidationError::NoTags.into());
		}
		let validated: Vec<ValidatedTagInput> = inputs
			.iter()
			.map(ExtendedTagInput::validate)
			.collect::<std::result::Result<_, _>>()?;

		let store = self.tag_store.resolve().await?;
		let created = store.add_tags(&validated).await?;
		info!("Registered {} extended tags", created.len());
		Ok(created)
	}

	/// All registered tags, every status.
	pub async fn get_tags(&self) -> Result<Vec<ExtendedTagEntry>> {
		let store = self.tag_store.resolve().await?;
		store.get_tags().await
	}

	/// Single tag by attribute path.
	pub async fn get_tag(&self, path: &str) -> Result<ExtendedTagEntry> {
		let normalized = crate::domain::tag::normalize_tag_path(path)?;
		let store = self.tag_store.resolve().await?;
		store.get_tag_by_path(&normalized).await
	}

	/// Remove a tag: flip it to `Deleting` (closing the queryability gate
	/// immediately, even mid-reindex), drain its index and error rows in
	/// capped batches, then delete the entry itself.
	pub async fn delete_tag(&self, path: &str) -> Result<()> {
		let entry = self.get_tag(path).await?;

		let tag_store = self.tag_store.resolve().await?;
		let index_store = self.index_store.resolve().await?;

		if entry.status != TagStatus::Deleting {
			tag_store.update_status(entry.key, TagStatus::Deleting).await?;
			self.query_tags.invalidate().await;
		}

		let summary = drain_tag(index_store.as_ref(), entry.key, self.delete_batch_size).await?;
		info!(
			"Drained tag {}: {} index rows, {} error rows in {} rounds",
			entry.key, summary.values_deleted, summary.errors_deleted, summary.rounds
		);

		tag_store.delete_entry(entry.key).await?;
		Ok(())
	}
}
