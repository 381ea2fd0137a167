//! Operation store: durable reindex progress records.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use crate::domain::operation::{OperationStatus, ReindexCheckpoint};
use crate::error::{from_db_err, is_unique_violation, Error, ErrorClass, Result};
use crate::infrastructure::database::entities::reindex_operation;

/// Access to reindex progress records. The pipeline owns these for the
/// lifetime of a run; cancellation is expressed through them.
#[async_trait]
pub trait OperationStore: Send + Sync {
	/// Create the progress record for a new run in status `NotStarted`.
	/// Idempotent for the same operation id.
	async fn create(&self, operation_id: Uuid) -> Result<ReindexCheckpoint>;

	/// Fetch a progress record.
	async fn get(&self, operation_id: Uuid) -> Result<Option<ReindexCheckpoint>>;

	/// Mark the run started and record the captured watermark interval.
	async fn start(&self, operation_id: Uuid, start_watermark: i64) -> Result<()>;

	/// Lower the remaining-work cursor after a completed planning round.
	async fn record_progress(&self, operation_id: Uuid, end_watermark: i64) -> Result<()>;

	/// Terminal transition: `Completed` clears the watermark progress,
	/// `Failed` records the error class, `Canceled` stops future planning.
	async fn finish(
		&self,
		operation_id: Uuid,
		status: OperationStatus,
		error_class: Option<ErrorClass>,
	) -> Result<()>;
}

/// SQL-backed operation store.
pub struct SqlOperationStore {
	conn: DatabaseConnection,
}

impl SqlOperationStore {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}

	async fn fetch(&self, operation_id: Uuid) -> Result<reindex_operation::Model> {
		reindex_operation::Entity::find_by_id(operation_id)
			.one(&self.conn)
			.await
			.map_err(from_db_err)?
			.ok_or_else(|| Error::NotFound(format!("operation {operation_id}")))
	}
}

#[async_trait]
impl OperationStore for SqlOperationStore {
	async fn create(&self, operation_id: Uuid) -> Result<ReindexCheckpoint> {
		let now = Utc::now();
		let model = reindex_operation::ActiveModel {
			operation_id: Set(operation_id),
			status: Set(OperationStatus::NotStarted.to_string()),
			start_watermark: Set(None),
			end_watermark: Set(None),
			error_class: Set(None),
			created_at: Set(now),
			updated_at: Set(now),
		};

		match model.insert(&self.conn).await {
			Ok(inserted) => to_checkpoint(inserted),
			// A replayed orchestration recreates its own record; hand the
			// existing one back.
			Err(e) if is_unique_violation(&e) => to_checkpoint(self.fetch(operation_id).await?),
			Err(e) => Err(from_db_err(e)),
		}
	}

	async fn get(&self, operation_id: Uuid) -> Result<Option<ReindexCheckpoint>> {
		let model = reindex_operation::Entity::find_by_id(operation_id)
			.one(&self.conn)
			.await
			.map_err(from_db_err)?;
		model.map(to_checkpoint).transpose()
	}

	async fn start(&self, operation_id: Uuid, start_watermark: i64) -> Result<()> {
		let model = self.fetch(operation_id).await?;
		let mut active: reindex_operation::ActiveModel = model.into();
		active.status = Set(OperationStatus::Running.to_string());
		active.start_watermark = Set(Some(start_watermark));
		active.end_watermark = Set(Some(start_watermark));
		active.updated_at = Set(Utc::now());
		active.update(&self.conn).await.map_err(from_db_err)?;
		Ok(())
	}

	async fn record_progress(&self, operation_id: Uuid, end_watermark: i64) -> Result<()> {
		let model = self.fetch(operation_id).await?;
		let mut active: reindex_operation::ActiveModel = model.into();
		active.end_watermark = Set(Some(end_watermark));
		active.updated_at = Set(Utc::now());
		active.update(&self.conn).await.map_err(from_db_err)?;
		Ok(())
	}

	async fn finish(
		&self,
		operation_id: Uuid,
		status: OperationStatus,
		error_class: Option<ErrorClass>,
	) -> Result<()> {
		debug_assert!(status.is_terminal());

		let model = self.fetch(operation_id).await?;
		let mut active: reindex_operation::ActiveModel = model.into();
		active.status = Set(status.to_string());
		active.error_class = Set(error_class.map(|c| c.to_string()));
		if status == OperationStatus::Completed {
			// The progress record has served its purpose; completed
			// operations report 100% from status alone.
			active.start_watermark = Set(None);
			active.end_watermark = Set(None);
		}
		active.updated_at = Set(Utc::now());
		active.update(&self.conn).await.map_err(from_db_err)?;
		Ok(())
	}
}

fn to_checkpoint(model: reindex_operation::Model) -> Result<ReindexCheckpoint> {
	let status: OperationStatus = model
		.status
		.parse()
		.map_err(|_| Error::Store(format!("corrupt operation row: status '{}'", model.status)))?;
	let error_class = model
		.error_class
		.as_deref()
		.map(|raw| {
			raw.parse::<ErrorClass>().map_err(|_| {
				Error::Store(format!("corrupt operation row: error class '{raw}'"))
			})
		})
		.transpose()?;

	Ok(ReindexCheckpoint {
		operation_id: model.operation_id,
		status,
		start_watermark: model.start_watermark,
		end_watermark: model.end_watermark,
		error_class,
		created_at: model.created_at,
		updated_at: model.updated_at,
	})
}
