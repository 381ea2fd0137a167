//! Minimal attribute-bag view of an imaging object's metadata, the value
//! source batch execution extracts tag values from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::tag::{ValueDomain, Vr};
use crate::error::ValidationError;

/// Raw attribute values keyed by normalized attribute path. Stored as the
/// instance's metadata payload at ingest time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicomDataset(BTreeMap<String, String>);

impl DicomDataset {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&mut self, path: impl Into<String>, value: impl Into<String>) -> &mut Self {
		self.0.insert(path.into(), value.into());
		self
	}

	pub fn get(&self, path: &str) -> Option<&str> {
		self.0.get(path).map(String::as_str)
	}

	/// Extract the value at `path` typed per `vr`.
	///
	/// Returns `None` when the attribute is absent (the tag is simply not
	/// indexed for this object) and `Some(Err)` when the raw value does not
	/// parse under the tag's VR (recorded as a tag error row).
	pub fn extract(&self, path: &str, vr: Vr) -> Option<Result<AttributeValue, ValidationError>> {
		let raw = self.get(path)?.trim();
		if raw.is_empty() {
			return None;
		}
		Some(parse_value(raw, vr))
	}
}

/// A typed attribute value, one per index value domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
	String(String),
	Long(i64),
	Double(f64),
	Date(NaiveDate),
}

impl AttributeValue {
	pub fn domain(&self) -> ValueDomain {
		match self {
			AttributeValue::String(_) => ValueDomain::String,
			AttributeValue::Long(_) => ValueDomain::Long,
			AttributeValue::Double(_) => ValueDomain::Double,
			AttributeValue::Date(_) => ValueDomain::Date,
		}
	}
}

fn parse_value(raw: &str, vr: Vr) -> Result<AttributeValue, ValidationError> {
	let invalid = || ValidationError::InvalidAttributeValue {
		vr: vr.to_string(),
		value: raw.to_string(),
	};
	match vr.domain() {
		ValueDomain::String => Ok(AttributeValue::String(raw.to_string())),
		ValueDomain::Long => raw.parse::<i64>().map(AttributeValue::Long).map_err(|_| invalid()),
		ValueDomain::Double => raw
			.parse::<f64>()
			.map(AttributeValue::Double)
			.map_err(|_| invalid()),
		// DICOM DA format: YYYYMMDD.
		ValueDomain::Date => NaiveDate::parse_from_str(raw, "%Y%m%d")
			.map(AttributeValue::Date)
			.map_err(|_| invalid()),
	}
}
