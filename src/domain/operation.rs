//! Reindex operation state: the mutable progress record of one reindexing
//! run and the status shape exposed to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorClass, ValidationError};

/// Current status of a reindex operation.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
)]
pub enum OperationStatus {
	NotStarted,
	Running,
	Completed,
	Failed,
	Canceled,
}

impl OperationStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Canceled)
	}
}

/// The durable progress record of one reindexing run.
///
/// `end_watermark` is the cursor below which work remains: it is lowered
/// after each successfully completed planning round, which is what makes an
/// interrupted run resumable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReindexCheckpoint {
	pub operation_id: Uuid,
	pub status: OperationStatus,
	/// High-water mark captured when the operation started.
	pub start_watermark: Option<i64>,
	/// Cursor of remaining work; planning only considers watermarks at or
	/// below this value.
	pub end_watermark: Option<i64>,
	pub error_class: Option<ErrorClass>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl ReindexCheckpoint {
	/// Progress as a percentage of the watermark interval covered so far.
	pub fn percent_complete(&self) -> u8 {
		if self.status == OperationStatus::Completed {
			return 100;
		}
		match (self.start_watermark, self.end_watermark) {
			(Some(start), Some(end)) if start > 0 => {
				let done = (start - end).clamp(0, start);
				((done * 100) / start) as u8
			}
			_ => 0,
		}
	}
}

/// One reindexing run together with the tags it covers. This is the shape
/// returned to the API layer for status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReindexOperation {
	pub checkpoint: ReindexCheckpoint,
	/// Paths of the tags covered by this run, for resource links in status
	/// responses.
	pub tag_paths: Vec<String>,
}

impl ReindexOperation {
	pub fn status(&self) -> OperationStatus {
		self.checkpoint.status
	}

	pub fn percent_complete(&self) -> u8 {
		self.checkpoint.percent_complete()
	}
}

/// Operation ids are externally supplied by the orchestration host; validate
/// the fixed format before using one as a key.
pub fn parse_operation_id(raw: &str) -> Result<Uuid, ValidationError> {
	Uuid::parse_str(raw).map_err(|_| ValidationError::InvalidOperationId(raw.to_string()))
}
