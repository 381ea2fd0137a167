//! The reindex driver loop and the service facade exposed to the API layer.
//!
//! The loop drives the activity state machine — claim, start, then plan and
//! execute rounds until planning comes back empty — wrapping each activity
//! in the bounded retry policy. Rounds are strictly sequential: a round only
//! starts after the prior round's progress is durably recorded. Batches
//! within a round run concurrently and may finish in any order.

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{ReindexConfig, RetryConfig};
use crate::domain::operation::{parse_operation_id, OperationStatus, ReindexOperation};
use crate::domain::tag::ExtendedTagEntry;
use crate::error::{Error, Result};
use crate::operations::reindex::activities::{BatchOutcome, ReindexActivities, StartOutcome};
use crate::services::query_tags::QueryTagService;
use crate::stores::operation::OperationStore;

/// Outcome of a finished pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReindexSummary {
	pub operation_id: Uuid,
	pub status: OperationStatus,
	/// Tags flipped to `Ready` by this run.
	pub completed_tags: Vec<ExtendedTagEntry>,
	pub outcome: BatchOutcome,
	pub rounds: u64,
}

/// Drives one reindex operation to a terminal state.
pub struct ReindexOrchestrator {
	activities: Arc<ReindexActivities>,
	config: ReindexConfig,
}

impl ReindexOrchestrator {
	pub fn new(activities: Arc<ReindexActivities>, config: ReindexConfig) -> Self {
		Self { activities, config }
	}

	/// Run the pipeline for `operation_id` over `tag_keys`. Safe to call
	/// again with the same inputs after an interruption: every activity is
	/// idempotent and the loop resumes from the recorded cursor.
	pub async fn run(&self, operation_id: Uuid, tag_keys: &[i64]) -> Result<ReindexSummary> {
		match self.drive(operation_id, tag_keys).await {
			Ok(summary) => Ok(summary),
			Err(e) => {
				error!("Reindex operation {} failed: {}", operation_id, e);
				// Best effort: the record may be gone or the store down; the
				// original failure is what matters.
				if let Err(mark) = self.activities.fail(operation_id, &e).await {
					warn!("Could not record failure for {}: {}", operation_id, mark);
				}
				Err(Error::OperationFailed {
					operation_id,
					class: e.class(),
				})
			}
		}
	}

	async fn drive(&self, operation_id: Uuid, tag_keys: &[i64]) -> Result<ReindexSummary> {
		let retry = &self.config.retry;

		let tags = with_retry("claim_tags", retry, || {
			self.activities.claim_tags(operation_id, tag_keys)
		})
		.await?;

		info!(
			"Operation {} claimed {} tags: {:?}",
			operation_id,
			tags.len(),
			tags.iter().map(|t| t.path.as_str()).collect::<Vec<_>>()
		);

		let start = with_retry("start_operation", retry, || {
			self.activities.start_operation(operation_id)
		})
		.await?;

		match start {
			StartOutcome::Terminal(status) => {
				return Ok(ReindexSummary {
					operation_id,
					status,
					completed_tags: Vec::new(),
					outcome: BatchOutcome::default(),
					rounds: 0,
				});
			}
			StartOutcome::NoInstances => {
				let completed = with_retry("complete", retry, || {
					self.activities.complete(operation_id)
				})
				.await?;
				return Ok(ReindexSummary {
					operation_id,
					status: OperationStatus::Completed,
					completed_tags: completed,
					outcome: BatchOutcome::default(),
					rounds: 0,
				});
			}
			StartOutcome::Started(start_watermark) => {
				info!(
					"Operation {} reindexing down from watermark {}",
					operation_id, start_watermark
				);
			}
		}

		let tags = Arc::new(tags);
		let mut total = BatchOutcome::default();
		let mut rounds = 0u64;

		loop {
			let ranges = with_retry("plan_batches", retry, || {
				self.activities.plan_batches(
					operation_id,
					self.config.batch_size,
					self.config.max_parallel_batches,
				)
			})
			.await?;

			if ranges.is_empty() {
				break;
			}
			rounds += 1;

			// Batches of one round execute concurrently, each with its own
			// retry budget; order within the round does not matter.
			let mut executions = stream::iter(ranges.iter().copied().map(|range| {
				let tags = tags.clone();
				async move {
					with_retry("execute_batch", retry, || {
						self.activities.execute_batch(range, tags.clone())
					})
					.await
				}
			}))
			.buffer_unordered(self.config.max_parallel_batches.max(1) as usize);

			while let Some(result) = executions.next().await {
				total.absorb(result?);
			}
			drop(executions);

			with_retry("record_round", retry, || {
				self.activities.record_round(operation_id, &ranges)
			})
			.await?;
		}

		let completed =
			with_retry("complete", retry, || self.activities.complete(operation_id)).await?;
		info!(
			"Operation {} completed: {} tags ready after {} rounds",
			operation_id,
			completed.len(),
			rounds
		);

		Ok(ReindexSummary {
			operation_id,
			status: OperationStatus::Completed,
			completed_tags: completed,
			outcome: total,
			rounds,
		})
	}
}

/// Retry `op` under the bounded policy: transient failures back off and try
/// again up to the attempt budget; anything else surfaces immediately.
pub(crate) async fn with_retry<T, F, Fut>(name: &str, policy: &RetryConfig, mut op: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	use backoff::backoff::Backoff;

	let mut delays = policy.backoff();
	let mut attempt = 1u32;
	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(e) if e.is_transient() && attempt < policy.max_attempts => {
				let delay = delays.next_backoff().unwrap_or_else(|| policy.max_interval());
				warn!(
					"Activity {} failed transiently (attempt {}/{}), retrying in {:?}: {}",
					name, attempt, policy.max_attempts, delay, e
				);
				sleep(delay).await;
				attempt += 1;
			}
			Err(e) => return Err(e),
		}
	}
}

/// API-facing facade: starts runs in the background, reports status, and
/// accepts cancellation.
pub struct ReindexService {
	orchestrator: Arc<ReindexOrchestrator>,
	activities: Arc<ReindexActivities>,
	operation_store: Arc<dyn OperationStore>,
	query_tags: Arc<QueryTagService>,
}

impl ReindexService {
	pub fn new(
		orchestrator: Arc<ReindexOrchestrator>,
		activities: Arc<ReindexActivities>,
		operation_store: Arc<dyn OperationStore>,
		query_tags: Arc<QueryTagService>,
	) -> Self {
		Self {
			orchestrator,
			activities,
			operation_store,
			query_tags,
		}
	}

	/// Start a reindex run for the given tags in the background and return
	/// its operation id.
	pub async fn start_reindex(&self, tag_keys: Vec<i64>) -> Result<Uuid> {
		let operation_id = Uuid::new_v4();
		self.operation_store.create(operation_id).await?;
		self.spawn_run(operation_id, tag_keys);
		Ok(operation_id)
	}

	/// Start a run under an externally assigned operation id (the
	/// orchestration host's instance id), validating its format first.
	pub async fn start_reindex_with_id(&self, raw_id: &str, tag_keys: Vec<i64>) -> Result<Uuid> {
		let operation_id = parse_operation_id(raw_id)?;
		self.operation_store.create(operation_id).await?;
		self.spawn_run(operation_id, tag_keys);
		Ok(operation_id)
	}

	/// Run a reindex operation to completion on the caller's task. Used by
	/// activity hosts and tests that need the terminal result.
	pub async fn run_to_completion(
		&self,
		operation_id: Uuid,
		tag_keys: &[i64],
	) -> Result<ReindexSummary> {
		let summary = self.orchestrator.run(operation_id, tag_keys).await?;
		if !summary.completed_tags.is_empty() {
			// Newly Ready tags must become visible to the query engine.
			self.query_tags.invalidate().await;
		}
		Ok(summary)
	}

	/// Current status of an operation.
	pub async fn get_operation(&self, operation_id: Uuid) -> Result<ReindexOperation> {
		let checkpoint = self
			.operation_store
			.get(operation_id)
			.await?
			.ok_or_else(|| Error::NotFound(format!("operation {operation_id}")))?;

		let tag_paths = match self.claimed_tag_paths(operation_id).await {
			Ok(paths) => paths,
			// Pre-reindex schema or cleared claims: status still renders.
			Err(Error::SchemaUpgradeRequired { .. }) => Vec::new(),
			Err(e) => return Err(e),
		};

		Ok(ReindexOperation {
			checkpoint,
			tag_paths,
		})
	}

	/// Request cancellation. In-flight batches run to completion; the next
	/// planning round observes the status and stops.
	pub async fn cancel(&self, operation_id: Uuid) -> Result<()> {
		let checkpoint = self
			.operation_store
			.get(operation_id)
			.await?
			.ok_or_else(|| Error::NotFound(format!("operation {operation_id}")))?;
		if checkpoint.status.is_terminal() {
			return Ok(());
		}
		self.operation_store
			.finish(operation_id, OperationStatus::Canceled, None)
			.await
	}

	fn spawn_run(&self, operation_id: Uuid, tag_keys: Vec<i64>) {
		let orchestrator = self.orchestrator.clone();
		let query_tags = self.query_tags.clone();
		tokio::spawn(async move {
			match orchestrator.run(operation_id, &tag_keys).await {
				Ok(summary) if !summary.completed_tags.is_empty() => {
					query_tags.invalidate().await;
				}
				Ok(_) => {}
				Err(e) => error!("Background reindex {} failed: {}", operation_id, e),
			}
		});
	}

	async fn claimed_tag_paths(&self, operation_id: Uuid) -> Result<Vec<String>> {
		let tags = self.activities.claimed_tags(operation_id).await?;
		Ok(tags.into_iter().map(|t| t.path).collect())
	}
}
