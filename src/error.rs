//! Error taxonomy for the metadata core.
//!
//! Storage-layer failures are translated at the store boundary so callers can
//! make uniform retry/stop decisions; raw driver errors never cross a store
//! trait. Every variant is cheap to clone, which lets shared futures hand the
//! same failure to every concurrent caller.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::domain::tag::TagStatus;
use crate::schema::version::SchemaVersion;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error taxonomy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
	/// Malformed input. Surfaced to the caller, never retried.
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// A tag with the same path is already registered.
	#[error("extended tag '{path}' already exists")]
	TagAlreadyExists { path: String },

	/// The tag is claimed by another in-flight reindex operation.
	#[error("extended tag {key} is busy with operation {operation_id}")]
	TagBusy { key: i64, operation_id: uuid::Uuid },

	/// A partition with the same name already exists.
	#[error("partition '{name}' already exists")]
	PartitionAlreadyExists { name: String },

	/// Illegal tag status transition.
	#[error("cannot transition extended tag from {from} to {to}")]
	InvalidStateTransition { from: TagStatus, to: TagStatus },

	/// The tag is not in a state that allows removal.
	#[error("extended tag {key} is {status} and cannot be removed")]
	TagNotRemovable { key: i64, status: TagStatus },

	/// The tag still has index or error rows; the drain has not finished.
	#[error("extended tag {key} still has index or error rows")]
	TagNotDrained { key: i64 },

	/// The active schema version matches no registered store implementation.
	#[error("schema version {version} is not supported by this deployment")]
	UnsupportedSchemaVersion { version: i32 },

	/// The operation needs a newer schema than the one currently deployed.
	#[error("operation requires schema version {required} or later")]
	SchemaUpgradeRequired { required: SchemaVersion },

	/// Requested entity does not exist. Surfaced, not retried.
	#[error("{0} not found")]
	NotFound(String),

	/// Connectivity or contention failure; retried by the activity policy.
	#[error("transient store error: {0}")]
	Transient(String),

	/// Non-transient storage failure.
	#[error("store error: {0}")]
	Store(String),

	/// A pipeline run exhausted its retry budget or hit a fatal activity error.
	#[error("operation {operation_id} failed: {class}")]
	OperationFailed {
		operation_id: uuid::Uuid,
		class: ErrorClass,
	},
}

impl Error {
	/// Whether the activity retry policy should retry this failure.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_))
	}

	/// Coarse classification exposed through operation status. Raw store
	/// error text stays out of user-visible state.
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Validation(_) => ErrorClass::Validation,
			Self::TagAlreadyExists { .. }
			| Self::TagBusy { .. }
			| Self::PartitionAlreadyExists { .. }
			| Self::InvalidStateTransition { .. }
			| Self::TagNotRemovable { .. }
			| Self::TagNotDrained { .. } => ErrorClass::Conflict,
			Self::UnsupportedSchemaVersion { .. } | Self::SchemaUpgradeRequired { .. } => {
				ErrorClass::SchemaNotReady
			}
			Self::NotFound(_) => ErrorClass::NotFound,
			Self::Transient(_) => ErrorClass::Transient,
			Self::Store(_) => ErrorClass::Store,
			Self::OperationFailed { class, .. } => *class,
		}
	}
}

/// Error classes surfaced through operation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display, strum::EnumString)]
pub enum ErrorClass {
	Validation,
	Conflict,
	SchemaNotReady,
	NotFound,
	Transient,
	Store,
}

/// Input validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	#[error("'{0}' is not a valid attribute level")]
	InvalidLevel(String),

	#[error("'{0}' is not an indexable value representation")]
	UnsupportedVr(String),

	#[error("'{0}' is not a valid attribute path")]
	InvalidTagPath(String),

	#[error("'{0}' is a core attribute and is always indexed")]
	CoreAttribute(String),

	#[error("value '{value}' cannot be parsed as {vr}")]
	InvalidAttributeValue { vr: String, value: String },

	#[error("required attribute '{0}' is missing")]
	MissingAttribute(String),

	#[error("'{0}' is not a valid operation id")]
	InvalidOperationId(String),

	#[error("range minimum '{min}' exceeds maximum '{max}'")]
	InvalidRange { min: String, max: String },

	#[error("attribute '{0}' cannot be filtered here")]
	UnsupportedFilterAttribute(String),

	#[error("no tags were supplied")]
	NoTags,

	#[error("'{0}' is not a valid partition name")]
	InvalidPartitionName(String),
}

/// Translate a driver error into the taxonomy. Conflict-specific mapping
/// (unique violations) happens at the call site where the context is known;
/// anything that reaches this function is either transient or a plain store
/// failure.
pub fn from_db_err(err: DbErr) -> Error {
	match &err {
		DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Error::Transient(err.to_string()),
		_ => match err.sql_err() {
			// Lock contention on SQLite surfaces as a busy/locked execution
			// error, which the driver folds into the generic variants; treat
			// explicit constraint violations as non-transient.
			Some(SqlErr::UniqueConstraintViolation(msg)) => Error::Store(msg),
			_ => Error::Store(err.to_string()),
		},
	}
}

/// Whether a driver error is a unique-constraint violation. Used by store
/// adapters to map conflicts onto the taxonomy with call-site context.
pub fn is_unique_violation(err: &DbErr) -> bool {
	matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
