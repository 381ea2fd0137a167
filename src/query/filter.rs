//! Query filter conditions: a closed set of typed match conditions over
//! query tags, visited by the predicate builder through double dispatch so
//! no call site ever switches on condition type.

use chrono::NaiveDate;

use crate::domain::tag::{QueryTag, TagLevel, ValueDomain};
use crate::error::ValidationError;

/// Equality against a single typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleValueMatch<T> {
	pub tag: QueryTag,
	pub value: T,
}

/// Inclusive range over a comparable value domain.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeValueMatch<T> {
	pub tag: QueryTag,
	pub min: T,
	pub max: T,
}

/// The closed set of filter conditions the query engine evaluates.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilterCondition {
	StringSingle(SingleValueMatch<String>),
	StringRange(RangeValueMatch<String>),
	LongSingle(SingleValueMatch<i64>),
	LongRange(RangeValueMatch<i64>),
	DoubleSingle(SingleValueMatch<f64>),
	DoubleRange(RangeValueMatch<f64>),
	DateSingle(SingleValueMatch<NaiveDate>),
	DateRange(RangeValueMatch<NaiveDate>),
}

/// Type-directed visitation over filter conditions.
pub trait QueryFilterVisitor {
	fn visit_string_single(&mut self, condition: &SingleValueMatch<String>);
	fn visit_string_range(&mut self, condition: &RangeValueMatch<String>);
	fn visit_long_single(&mut self, condition: &SingleValueMatch<i64>);
	fn visit_long_range(&mut self, condition: &RangeValueMatch<i64>);
	fn visit_double_single(&mut self, condition: &SingleValueMatch<f64>);
	fn visit_double_range(&mut self, condition: &RangeValueMatch<f64>);
	fn visit_date_single(&mut self, condition: &SingleValueMatch<NaiveDate>);
	fn visit_date_range(&mut self, condition: &RangeValueMatch<NaiveDate>);
}

impl QueryFilterCondition {
	/// Dispatch to the visitor method for this condition's concrete type.
	pub fn accept(&self, visitor: &mut dyn QueryFilterVisitor) {
		match self {
			Self::StringSingle(c) => visitor.visit_string_single(c),
			Self::StringRange(c) => visitor.visit_string_range(c),
			Self::LongSingle(c) => visitor.visit_long_single(c),
			Self::LongRange(c) => visitor.visit_long_range(c),
			Self::DoubleSingle(c) => visitor.visit_double_single(c),
			Self::DoubleRange(c) => visitor.visit_double_range(c),
			Self::DateSingle(c) => visitor.visit_date_single(c),
			Self::DateRange(c) => visitor.visit_date_range(c),
		}
	}

	pub fn tag(&self) -> &QueryTag {
		match self {
			Self::StringSingle(c) => &c.tag,
			Self::StringRange(c) => &c.tag,
			Self::LongSingle(c) => &c.tag,
			Self::LongRange(c) => &c.tag,
			Self::DoubleSingle(c) => &c.tag,
			Self::DoubleRange(c) => &c.tag,
			Self::DateSingle(c) => &c.tag,
			Self::DateRange(c) => &c.tag,
		}
	}

	/// The attribute level the condition applies at, governing which scope
	/// its predicate joins against.
	pub fn level(&self) -> TagLevel {
		self.tag().level()
	}

	/// Build an equality condition, parsing `raw` under the tag's VR.
	pub fn equals(tag: QueryTag, raw: &str) -> Result<Self, ValidationError> {
		let vr = tag.vr();
		let invalid = || ValidationError::InvalidAttributeValue {
			vr: vr.to_string(),
			value: raw.to_string(),
		};
		Ok(match vr.domain() {
			ValueDomain::String => Self::StringSingle(SingleValueMatch {
				tag,
				value: raw.to_string(),
			}),
			ValueDomain::Long => Self::LongSingle(SingleValueMatch {
				tag,
				value: raw.parse().map_err(|_| invalid())?,
			}),
			ValueDomain::Double => Self::DoubleSingle(SingleValueMatch {
				tag,
				value: raw.parse().map_err(|_| invalid())?,
			}),
			ValueDomain::Date => Self::DateSingle(SingleValueMatch {
				tag,
				value: parse_date(raw).ok_or_else(invalid)?,
			}),
		})
	}

	/// Build an inclusive range condition, parsing both bounds under the
	/// tag's VR and rejecting inverted ranges.
	pub fn between(tag: QueryTag, raw_min: &str, raw_max: &str) -> Result<Self, ValidationError> {
		let vr = tag.vr();
		let invalid = |raw: &str| ValidationError::InvalidAttributeValue {
			vr: vr.to_string(),
			value: raw.to_string(),
		};
		let inverted = || ValidationError::InvalidRange {
			min: raw_min.to_string(),
			max: raw_max.to_string(),
		};

		Ok(match vr.domain() {
			ValueDomain::String => {
				if raw_min > raw_max {
					return Err(inverted());
				}
				Self::StringRange(RangeValueMatch {
					tag,
					min: raw_min.to_string(),
					max: raw_max.to_string(),
				})
			}
			ValueDomain::Long => {
				let min: i64 = raw_min.parse().map_err(|_| invalid(raw_min))?;
				let max: i64 = raw_max.parse().map_err(|_| invalid(raw_max))?;
				if min > max {
					return Err(inverted());
				}
				Self::LongRange(RangeValueMatch { tag, min, max })
			}
			ValueDomain::Double => {
				let min: f64 = raw_min.parse().map_err(|_| invalid(raw_min))?;
				let max: f64 = raw_max.parse().map_err(|_| invalid(raw_max))?;
				if min > max {
					return Err(inverted());
				}
				Self::DoubleRange(RangeValueMatch { tag, min, max })
			}
			ValueDomain::Date => {
				let min = parse_date(raw_min).ok_or_else(|| invalid(raw_min))?;
				let max = parse_date(raw_max).ok_or_else(|| invalid(raw_max))?;
				if min > max {
					return Err(inverted());
				}
				Self::DateRange(RangeValueMatch { tag, min, max })
			}
		})
	}
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
	NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}
