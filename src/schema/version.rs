//! Ordered schema version identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A deployed persistent-schema version. Ordered; higher versions are strict
/// supersets of lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SchemaVersion {
	/// Instance table only.
	V1 = 1,
	/// Extended query tags with typed index and error tables.
	V2 = 2,
	/// Reindex operations: claim table and durable progress records.
	V3 = 3,
	/// Tenant partitions.
	V4 = 4,
}

impl SchemaVersion {
	/// The newest version this build of the service understands.
	pub const LATEST: SchemaVersion = SchemaVersion::V4;

	/// The oldest version this build of the service can run against.
	pub const MIN: SchemaVersion = SchemaVersion::V1;

	pub fn as_i32(self) -> i32 {
		self as i32
	}

	pub fn try_from_i32(value: i32) -> Option<Self> {
		match value {
			1 => Some(Self::V1),
			2 => Some(Self::V2),
			3 => Some(Self::V3),
			4 => Some(Self::V4),
			_ => None,
		}
	}
}

impl fmt::Display for SchemaVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "V{}", self.as_i32())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ordering_follows_numbering() {
		assert!(SchemaVersion::V1 < SchemaVersion::V2);
		assert!(SchemaVersion::V3 < SchemaVersion::LATEST);
	}

	#[test]
	fn round_trips_through_i32() {
		for v in [
			SchemaVersion::V1,
			SchemaVersion::V2,
			SchemaVersion::V3,
			SchemaVersion::V4,
		] {
			assert_eq!(SchemaVersion::try_from_i32(v.as_i32()), Some(v));
		}
		assert_eq!(SchemaVersion::try_from_i32(0), None);
		assert_eq!(SchemaVersion::try_from_i32(99), None);
	}
}
