//! Delete drain: removes a tag's index and error rows in capped batches.

use tracing::debug;

use crate::error::Result;
use crate::stores::index::IndexStore;

/// Outcome of a drain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainSummary {
	pub values_deleted: u64,
	pub errors_deleted: u64,
	pub rounds: u64,
}

/// Repeatedly delete up to `batch_size` index rows and up to `batch_size`
/// error rows for the tag until both calls return fewer rows than requested.
///
/// Termination assumes the store's per-call deletion count drops below
/// `batch_size` once the rows are exhausted; concurrent inserts during the
/// drain could in principle keep a round saturated indefinitely.
pub async fn drain_tag(
	store: &dyn IndexStore,
	tag_key: i64,
	batch_size: u64,
) -> Result<DrainSummary> {
	let mut summary = DrainSummary::default();

	loop {
		let values = store.delete_tag_values(tag_key, batch_size).await?;
		let errors = store.delete_tag_errors(tag_key, batch_size).await?;
		summary.values_deleted += values;
		summary.errors_deleted += errors;
		summary.rounds += 1;

		debug!(
			"Drain round {} for tag {}: {} values, {} errors",
			summary.rounds, tag_key, values, errors
		);

		if values < batch_size && errors < batch_size {
			return Ok(summary);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicU64, Ordering};

	use crate::stores::index::TagValueWrite;
	use crate::stores::instance::InstanceRecord;

	/// Index store fake with fixed numbers of remaining rows.
	struct CountingStore {
		values: AtomicU64,
		errors: AtomicU64,
	}

	impl CountingStore {
		fn new(values: u64, errors: u64) -> Self {
			Self {
				values: AtomicU64::new(values),
				errors: AtomicU64::new(errors),
			}
		}

		fn take(counter: &AtomicU64, limit: u64) -> u64 {
			let remaining = counter.load(Ordering::SeqCst);
			let taken = remaining.min(limit);
			counter.store(remaining - taken, Ordering::SeqCst);
			taken
		}
	}

	#[async_trait]
	impl IndexStore for CountingStore {
		async fn upsert_tag_values(
			&self,
			_instance: &InstanceRecord,
			_values: &[TagValueWrite],
		) -> Result<()> {
			unimplemented!("not used by the drain")
		}

		async fn record_tag_error(
			&self,
			_tag_key: i64,
			_watermark: i64,
			_message: &str,
		) -> Result<()> {
			unimplemented!("not used by the drain")
		}

		async fn delete_tag_values(&self, _tag_key: i64, limit: u64) -> Result<u64> {
			Ok(Self::take(&self.values, limit))
		}

		async fn delete_tag_errors(&self, _tag_key: i64, limit: u64) -> Result<u64> {
			Ok(Self::take(&self.errors, limit))
		}

		async fn tag_row_counts(&self, _tag_key: i64) -> Result<(u64, u64)> {
			Ok((
				self.values.load(Ordering::SeqCst),
				self.errors.load(Ordering::SeqCst),
			))
		}
	}

	#[tokio::test]
	async fn drains_everything_in_finite_rounds() {
		let store = CountingStore::new(250, 42);
		let summary = drain_tag(&store, 1, 100).await.unwrap();

		assert_eq!(summary.values_deleted, 250);
		assert_eq!(summary.errors_deleted, 42);
		// Rounds: 100/100, 100/0, 50/0 -> third round is the first where
		// both deletions come back under the cap.
		assert_eq!(summary.rounds, 3);
		assert_eq!(store.tag_row_counts(1).await.unwrap(), (0, 0));
	}

	#[tokio::test]
	async fn empty_tag_terminates_immediately() {
		let store = CountingStore::new(0, 0);
		let summary = drain_tag(&store, 1, 100).await.unwrap();
		assert_eq!(summary.rounds, 1);
		assert_eq!(summary.values_deleted, 0);
	}

	#[tokio::test]
	async fn exact_multiple_needs_one_extra_round() {
		// 200 rows at batch size 100: two saturated rounds, then a final
		// empty round proves exhaustion.
		let store = CountingStore::new(200, 0);
		let summary = drain_tag(&store, 1, 100).await.unwrap();
		assert_eq!(summary.rounds, 3);
		assert_eq!(summary.values_deleted, 200);
	}
}
