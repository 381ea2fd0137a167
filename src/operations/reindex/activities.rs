//! Pipeline activities: stateless, idempotent, input-to-output functions
//! invoked (and retried) by the orchestration driver.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::operation::OperationStatus;
use crate::domain::tag::ExtendedTagEntry;
use crate::domain::watermark::WatermarkRange;
use crate::error::{Error, Result};
use crate::schema::resolver::VersionedResolver;
use crate::stores::extended_tag::ExtendedTagStore;
use crate::stores::index::{IndexStore, TagValueWrite};
use crate::stores::instance::{IndexStatus, InstanceRecord, InstanceStore};
use crate::stores::operation::OperationStore;

/// Counters reported by one batch execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
	pub instances_processed: u64,
	pub values_written: u64,
	pub errors_recorded: u64,
}

impl BatchOutcome {
	pub(crate) fn absorb(&mut self, other: BatchOutcome) {
		self.instances_processed += other.instances_processed;
		self.values_written += other.values_written;
		self.errors_recorded += other.errors_recorded;
	}
}

/// Result of the start activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
	/// The operation already reached a terminal status on a prior attempt.
	Terminal(OperationStatus),
	/// There is nothing to index; the operation can complete immediately.
	NoInstances,
	/// The captured high-water mark to reindex down from.
	Started(i64),
}

/// The activity set backing one reindex deployment. Every method is safe to
/// call again with the same inputs: claims tolerate re-claiming by the same
/// operation, index writes overwrite, progress updates are absolute.
pub struct ReindexActivities {
	tag_store: Arc<VersionedResolver<dyn ExtendedTagStore>>,
	index_store: Arc<VersionedResolver<dyn IndexStore>>,
	instance_store: Arc<dyn InstanceStore>,
	operation_store: Arc<dyn OperationStore>,
	instance_workers: usize,
}

impl ReindexActivities {
	pub fn new(
		tag_store: Arc<VersionedResolver<dyn ExtendedTagStore>>,
		index_store: Arc<VersionedResolver<dyn IndexStore>>,
		instance_store: Arc<dyn InstanceStore>,
		operation_store: Arc<dyn OperationStore>,
		instance_workers: usize,
	) -> Self {
		Self {
			tag_store,
			index_store,
			instance_store,
			operation_store,
			instance_workers: instance_workers.max(1),
		}
	}

	/// Claim the tags for this operation. Tags already completed by an
	/// earlier attempt of the same operation are returned as-is.
	pub async fn claim_tags(
		&self,
		operation_id: Uuid,
		tag_keys: &[i64],
	) -> Result<Vec<ExtendedTagEntry>> {
		let store = self.tag_store.resolve().await?;
		store
			.assign_reindex_operation(tag_keys, operation_id, true)
			.await
	}

	/// Ensure the progress record exists and capture the starting high-water
	/// mark. On a replay the previously captured interval (or terminal
	/// status) is honored instead of being recomputed.
	pub async fn start_operation(&self, operation_id: Uuid) -> Result<StartOutcome> {
		let checkpoint = self.operation_store.create(operation_id).await?;

		if checkpoint.status.is_terminal() {
			return Ok(StartOutcome::Terminal(checkpoint.status));
		}
		if checkpoint.status == OperationStatus::Running {
			return Ok(match checkpoint.start_watermark {
				Some(start) => StartOutcome::Started(start),
				None => StartOutcome::NoInstances,
			});
		}

		let max = self
			.instance_store
			.max_watermark(IndexStatus::Created)
			.await?;
		match max {
			Some(max) => {
				self.operation_store.start(operation_id, max).await?;
				Ok(StartOutcome::Started(max))
			}
			None => Ok(StartOutcome::NoInstances),
		}
	}

	/// Plan the next round of watermark ranges. Returns an empty list when
	/// no qualifying instances remain below the cursor, or when the
	/// operation is no longer running (cancellation).
	pub async fn plan_batches(
		&self,
		operation_id: Uuid,
		batch_size: u64,
		max_parallel: u64,
	) -> Result<Vec<WatermarkRange>> {
		let Some(checkpoint) = self.operation_store.get(operation_id).await? else {
			warn!("Progress record for {} is gone, stopping", operation_id);
			return Ok(Vec::new());
		};
		if checkpoint.status != OperationStatus::Running {
			debug!(
				"Operation {} is {}, not planning further batches",
				operation_id, checkpoint.status
			);
			return Ok(Vec::new());
		}

		let Some(cursor) = checkpoint.end_watermark else {
			return Ok(Vec::new());
		};
		if cursor < 1 {
			return Ok(Vec::new());
		}

		self.instance_store
			.get_batches(batch_size, max_parallel, IndexStatus::Created, Some(cursor))
			.await
	}

	/// Index every instance in `range` for every tag in the set. Attribute
	/// values that fail to parse under the tag's VR become error rows; the
	/// batch itself still succeeds.
	pub async fn execute_batch(
		&self,
		range: WatermarkRange,
		tags: Arc<Vec<ExtendedTagEntry>>,
	) -> Result<BatchOutcome> {
		let index_store = self.index_store.resolve().await?;
		let instances = self
			.instance_store
			.get_instances_in_range(range, IndexStatus::Created)
			.await?;

		let mut results = stream::iter(instances.into_iter().map(|instance| {
			let index_store = index_store.clone();
			let tags = tags.clone();
			async move { index_instance(index_store.as_ref(), &instance, &tags).await }
		}))
		.buffer_unordered(self.instance_workers);

		let mut outcome = BatchOutcome::default();
		while let Some(result) = results.next().await {
			outcome.absorb(result?);
		}

		debug!(
			"Batch {} done: {} instances, {} values, {} errors",
			range, outcome.instances_processed, outcome.values_written, outcome.errors_recorded
		);
		Ok(outcome)
	}

	/// Durably record that every range of the round has been processed, by
	/// lowering the remaining-work cursor below the round's lowest start.
	pub async fn record_round(&self, operation_id: Uuid, ranges: &[WatermarkRange]) -> Result<()> {
		let lowest = ranges
			.iter()
			.map(|r| r.start)
			.min()
			.ok_or_else(|| Error::Store("cannot record progress for an empty round".into()))?;
		self.operation_store
			.record_progress(operation_id, lowest - 1)
			.await
	}

	/// Tags currently claimed by the operation.
	pub async fn claimed_tags(&self, operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>> {
		let store = self.tag_store.resolve().await?;
		store.get_tags_by_operation(operation_id).await
	}

	/// Flip every claimed tag to `Ready`, drop the claims and clear the
	/// progress record.
	pub async fn complete(&self, operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>> {
		let store = self.tag_store.resolve().await?;
		let completed = store.complete_reindex(operation_id).await?;
		self.operation_store
			.finish(operation_id, OperationStatus::Completed, None)
			.await?;
		Ok(completed)
	}

	/// Record terminal failure. Claimed tags stay in `Adding`; the
	/// queryability gate stays closed.
	pub async fn fail(&self, operation_id: Uuid, error: &Error) -> Result<()> {
		self.operation_store
			.finish(operation_id, OperationStatus::Failed, Some(error.class()))
			.await
	}
}

/// Extract and write the tag values of a single instance. Also used on the
/// ingest path so newly stored objects never need a reindex.
pub(crate) async fn index_instance(
	index_store: &dyn IndexStore,
	instance: &InstanceRecord,
	tags: &[ExtendedTagEntry],
) -> Result<BatchOutcome> {
	let mut writes = Vec::new();
	let mut errors = 0u64;

	for tag in tags {
		match instance.dataset.extract(&tag.path, tag.vr) {
			Some(Ok(value)) => writes.push(TagValueWrite {
				tag_key: tag.key,
				level: tag.level,
				value,
			}),
			Some(Err(e)) => {
				index_store
					.record_tag_error(tag.key, instance.watermark, &e.to_string())
					.await?;
				errors += 1;
			}
			None => {}
		}
	}

	let values_written = writes.len() as u64;
	index_store.upsert_tag_values(instance, &writes).await?;

	Ok(BatchOutcome {
		instances_processed: 1,
		values_written,
		errors_recorded: errors,
	})
}
