//! Tenant partitions: named namespace boundaries under which instances and
//! tags are scoped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Key of the well-known default partition.
pub const DEFAULT_PARTITION_KEY: i32 = 1;

/// Name of the well-known default partition.
pub const DEFAULT_PARTITION_NAME: &str = "Default";

/// A tenant partition. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
	pub key: i32,
	pub name: String,
	pub created_date: DateTime<Utc>,
}

impl Partition {
	/// The well-known default partition, present in every deployment.
	pub fn default_partition() -> Self {
		Self {
			key: DEFAULT_PARTITION_KEY,
			name: DEFAULT_PARTITION_NAME.to_string(),
			created_date: DateTime::UNIX_EPOCH,
		}
	}

	pub fn is_default(&self) -> bool {
		self.key == DEFAULT_PARTITION_KEY
	}
}

/// Partition names are non-empty alphanumeric identifiers (dots, dashes and
/// underscores allowed), at most 64 characters.
pub fn validate_partition_name(name: &str) -> Result<(), ValidationError> {
	let valid = !name.is_empty()
		&& name.len() <= 64
		&& name
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
	if valid {
		Ok(())
	} else {
		Err(ValidationError::InvalidPartitionName(name.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn name_validation() {
		assert!(validate_partition_name("Default").is_ok());
		assert!(validate_partition_name("clinic-42_a.b").is_ok());
		assert!(validate_partition_name("").is_err());
		assert!(validate_partition_name("has space").is_err());
		assert!(validate_partition_name(&"x".repeat(65)).is_err());
	}
}
