//! Searchable attribute model: the built-in core tags and user-registered
//! extended tags, plus the value-representation mapping that decides which
//! typed index column a value lands in.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Attribute level a tag is scoped to.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
)]
pub enum TagLevel {
	Study,
	Series,
	Instance,
}

impl TagLevel {
	/// Parse a caller-supplied level, rejecting unknown values.
	pub fn parse(value: &str) -> Result<Self, ValidationError> {
		value
			.parse()
			.map_err(|_| ValidationError::InvalidLevel(value.to_string()))
	}
}

/// Extended tag lifecycle status.
///
/// A tag is only queryable while `Ready`; the pipeline flips `Adding` tags to
/// `Ready` on successful completion and never on failure.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
)]
pub enum TagStatus {
	Adding,
	Ready,
	Deleting,
}

impl TagStatus {
	/// The status state machine: `Adding -> Ready`, `Adding|Ready -> Deleting`.
	pub fn can_transition_to(self, next: TagStatus) -> bool {
		matches!(
			(self, next),
			(TagStatus::Adding, TagStatus::Ready)
				| (TagStatus::Adding, TagStatus::Deleting)
				| (TagStatus::Ready, TagStatus::Deleting)
		)
	}
}

/// Value representations accepted for indexable attributes.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
)]
pub enum Vr {
	AE,
	AS,
	CS,
	DA,
	DS,
	DT,
	FL,
	FD,
	IS,
	LO,
	PN,
	SH,
	SL,
	SS,
	TM,
	UI,
	UL,
	US,
}

impl Vr {
	/// Parse a caller-supplied VR code, rejecting anything outside the
	/// indexable set.
	pub fn parse(value: &str) -> Result<Self, ValidationError> {
		value
			.to_ascii_uppercase()
			.parse()
			.map_err(|_| ValidationError::UnsupportedVr(value.to_string()))
	}

	/// The value domain this VR is indexed under.
	pub fn domain(self) -> ValueDomain {
		match self {
			Vr::AE | Vr::AS | Vr::CS | Vr::DT | Vr::LO | Vr::PN | Vr::SH | Vr::TM | Vr::UI => {
				ValueDomain::String
			}
			Vr::IS | Vr::SL | Vr::SS | Vr::UL | Vr::US => ValueDomain::Long,
			Vr::DS | Vr::FL | Vr::FD => ValueDomain::Double,
			Vr::DA => ValueDomain::Date,
		}
	}
}

/// The four typed index columns a tag value can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueDomain {
	String,
	Long,
	Double,
	Date,
}

/// A user-registered searchable attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedTagEntry {
	/// Store-assigned unique key.
	pub key: i64,
	/// Normalized attribute path, e.g. `00080090`.
	pub path: String,
	pub vr: Vr,
	pub private_creator: Option<String>,
	pub level: TagLevel,
	pub status: TagStatus,
}

/// Registration request for a new extended tag, as received from the API
/// layer. Validated and normalized before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedTagInput {
	pub path: String,
	pub vr: String,
	pub private_creator: Option<String>,
	pub level: String,
}

impl ExtendedTagInput {
	/// Validate and normalize the request: uppercase the path so uniqueness
	/// comparisons are case-insensitive, and reject unknown VRs, unknown
	/// levels and paths already covered by the core attribute set.
	pub fn validate(&self) -> Result<ValidatedTagInput, ValidationError> {
		let path = normalize_tag_path(&self.path)?;
		if core_tag(&path).is_some() {
			return Err(ValidationError::CoreAttribute(path));
		}
		let vr = Vr::parse(&self.vr)?;
		let level = TagLevel::parse(&self.level)?;
		Ok(ValidatedTagInput {
			path,
			vr,
			private_creator: self.private_creator.clone(),
			level,
		})
	}
}

/// A validated, normalized tag registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTagInput {
	pub path: String,
	pub vr: Vr,
	pub private_creator: Option<String>,
	pub level: TagLevel,
}

/// An attribute path is a sequence of one or more 8-digit hex group/element
/// pairs separated by dots (nested sequences), normalized to uppercase.
pub fn normalize_tag_path(raw: &str) -> Result<String, ValidationError> {
	let normalized = raw.trim().to_ascii_uppercase();
	let valid = !normalized.is_empty()
		&& normalized
			.split('.')
			.all(|part| part.len() == 8 && part.chars().all(|c| c.is_ascii_hexdigit()));
	if valid {
		Ok(normalized)
	} else {
		Err(ValidationError::InvalidTagPath(raw.to_string()))
	}
}

/// A built-in searchable attribute. Core tags never expire or change at
/// runtime.
#[derive(Debug, PartialEq, Eq)]
pub struct CoreTag {
	pub path: &'static str,
	pub keyword: &'static str,
	pub vr: Vr,
	pub level: TagLevel,
}

/// The fixed core attribute set merged with `Ready` extended tags by the
/// query-tag service.
pub const CORE_TAGS: &[CoreTag] = &[
	CoreTag {
		path: "0020000D",
		keyword: "StudyInstanceUID",
		vr: Vr::UI,
		level: TagLevel::Study,
	},
	CoreTag {
		path: "00080020",
		keyword: "StudyDate",
		vr: Vr::DA,
		level: TagLevel::Study,
	},
	CoreTag {
		path: "00080050",
		keyword: "AccessionNumber",
		vr: Vr::SH,
		level: TagLevel::Study,
	},
	CoreTag {
		path: "00100010",
		keyword: "PatientName",
		vr: Vr::PN,
		level: TagLevel::Study,
	},
	CoreTag {
		path: "00100020",
		keyword: "PatientID",
		vr: Vr::LO,
		level: TagLevel::Study,
	},
	CoreTag {
		path: "00080090",
		keyword: "ReferringPhysicianName",
		vr: Vr::PN,
		level: TagLevel::Study,
	},
	CoreTag {
		path: "0020000E",
		keyword: "SeriesInstanceUID",
		vr: Vr::UI,
		level: TagLevel::Series,
	},
	CoreTag {
		path: "00080060",
		keyword: "Modality",
		vr: Vr::CS,
		level: TagLevel::Series,
	},
	CoreTag {
		path: "00400244",
		keyword: "PerformedProcedureStepStartDate",
		vr: Vr::DA,
		level: TagLevel::Series,
	},
	CoreTag {
		path: "00080018",
		keyword: "SOPInstanceUID",
		vr: Vr::UI,
		level: TagLevel::Instance,
	},
	CoreTag {
		path: "00200013",
		keyword: "InstanceNumber",
		vr: Vr::IS,
		level: TagLevel::Instance,
	},
];

/// Look up a core tag by path.
pub fn core_tag(path: &str) -> Option<&'static CoreTag> {
	CORE_TAGS.iter().find(|t| t.path == path)
}

/// Immutable wrapper unifying core tags and `Ready` extended tags.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTag {
	Core(&'static CoreTag),
	Extended(ExtendedTagEntry),
}

impl QueryTag {
	pub fn path(&self) -> &str {
		match self {
			QueryTag::Core(tag) => tag.path,
			QueryTag::Extended(entry) => &entry.path,
		}
	}

	pub fn vr(&self) -> Vr {
		match self {
			QueryTag::Core(tag) => tag.vr,
			QueryTag::Extended(entry) => entry.vr,
		}
	}

	pub fn level(&self) -> TagLevel {
		match self {
			QueryTag::Core(tag) => tag.level,
			QueryTag::Extended(entry) => entry.level,
		}
	}

	/// The store key, present only for extended tags.
	pub fn key(&self) -> Option<i64> {
		match self {
			QueryTag::Core(_) => None,
			QueryTag::Extended(entry) => Some(entry.key),
		}
	}

	pub fn is_extended(&self) -> bool {
		matches!(self, QueryTag::Extended(_))
	}
}

impl fmt::Display for QueryTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			QueryTag::Core(tag) => write!(f, "{} ({})", tag.keyword, tag.path),
			QueryTag::Extended(entry) => write!(f, "{}", entry.path),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_transitions() {
		assert!(TagStatus::Adding.can_transition_to(TagStatus::Ready));
		assert!(TagStatus::Adding.can_transition_to(TagStatus::Deleting));
		assert!(TagStatus::Ready.can_transition_to(TagStatus::Deleting));

		assert!(!TagStatus::Ready.can_transition_to(TagStatus::Adding));
		assert!(!TagStatus::Deleting.can_transition_to(TagStatus::Ready));
		assert!(!TagStatus::Deleting.can_transition_to(TagStatus::Adding));
		assert!(!TagStatus::Adding.can_transition_to(TagStatus::Adding));
	}

	#[test]
	fn path_normalization() {
		assert_eq!(normalize_tag_path("0008002b").unwrap(), "0008002B");
		assert_eq!(
			normalize_tag_path("00081250.00080050").unwrap(),
			"00081250.00080050"
		);
		assert!(normalize_tag_path("").is_err());
		assert!(normalize_tag_path("0008").is_err());
		assert!(normalize_tag_path("0008002g").is_err());
	}

	#[test]
	fn unknown_level_is_a_validation_error() {
		let input = ExtendedTagInput {
			path: "00081048".into(),
			vr: "PN".into(),
			private_creator: None,
			level: "Volume".into(),
		};
		assert!(matches!(
			input.validate(),
			Err(ValidationError::InvalidLevel(_))
		));
	}

	#[test]
	fn core_attributes_cannot_be_registered() {
		let input = ExtendedTagInput {
			path: "00080090".into(),
			vr: "PN".into(),
			private_creator: None,
			level: "Study".into(),
		};
		assert!(matches!(
			input.validate(),
			Err(ValidationError::CoreAttribute(_))
		));
	}

	#[test]
	fn vr_domains() {
		assert_eq!(Vr::PN.domain(), ValueDomain::String);
		assert_eq!(Vr::IS.domain(), ValueDomain::Long);
		assert_eq!(Vr::DS.domain(), ValueDomain::Double);
		assert_eq!(Vr::DA.domain(), ValueDomain::Date);
	}
}
