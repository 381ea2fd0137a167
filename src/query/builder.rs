//! Predicate building and query execution over indexed tag values.
//!
//! The predicate builder is the visitor side of the filter model: each
//! condition type maps onto the typed index column for its value domain.
//! Core UID attributes are served straight from instance columns.

use chrono::NaiveDate;
use sea_orm::sea_query::Condition;
use sea_orm::{
	ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::collections::BTreeSet;

use crate::domain::tag::{QueryTag, TagStatus};
use crate::error::{from_db_err, Error, Result, ValidationError};
use crate::infrastructure::database::entities::{instance, tag_value};
use crate::query::filter::{
	QueryFilterCondition, QueryFilterVisitor, RangeValueMatch, SingleValueMatch,
};
use crate::stores::instance::IndexStatus;

/// Identifiers of an instance matched by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentifier {
	pub watermark: i64,
	pub partition_key: i32,
	pub study_instance_uid: String,
	pub series_instance_uid: String,
	pub sop_instance_uid: String,
}

/// Builds a `tag_value` predicate from one filter condition via the visitor
/// dispatch. Only extended tags carry index rows; a core tag reaching this
/// builder is a caller error surfaced from [`Self::build`].
#[derive(Default)]
pub struct TagValuePredicateBuilder {
	condition: Option<Condition>,
	error: Option<ValidationError>,
}

impl TagValuePredicateBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn build(self) -> Result<Condition> {
		if let Some(error) = self.error {
			return Err(error.into());
		}
		self.condition
			.ok_or_else(|| Error::Store("predicate builder visited no condition".into()))
	}

	fn push(&mut self, tag: &QueryTag, value_predicate: Condition) {
		let Some(key) = tag.key() else {
			self.error = Some(ValidationError::UnsupportedFilterAttribute(
				tag.path().to_string(),
			));
			return;
		};
		self.condition = Some(
			Condition::all()
				.add(tag_value::Column::TagKey.eq(key))
				.add(tag_value::Column::TagLevel.eq(tag.level().to_string()))
				.add(value_predicate),
		);
	}
}

impl QueryFilterVisitor for TagValuePredicateBuilder {
	fn visit_string_single(&mut self, c: &SingleValueMatch<String>) {
		self.push(
			&c.tag,
			Condition::all().add(tag_value::Column::ValueString.eq(c.value.clone())),
		);
	}

	fn visit_string_range(&mut self, c: &RangeValueMatch<String>) {
		self.push(
			&c.tag,
			Condition::all()
				.add(tag_value::Column::ValueString.gte(c.min.clone()))
				.add(tag_value::Column::ValueString.lte(c.max.clone())),
		);
	}

	fn visit_long_single(&mut self, c: &SingleValueMatch<i64>) {
		self.push(
			&c.tag,
			Condition::all().add(tag_value::Column::ValueLong.eq(c.value)),
		);
	}

	fn visit_long_range(&mut self, c: &RangeValueMatch<i64>) {
		self.push(
			&c.tag,
			Condition::all()
				.add(tag_value::Column::ValueLong.gte(c.min))
				.add(tag_value::Column::ValueLong.lte(c.max)),
		);
	}

	fn visit_double_single(&mut self, c: &SingleValueMatch<f64>) {
		self.push(
			&c.tag,
			Condition::all().add(tag_value::Column::ValueDouble.eq(c.value)),
		);
	}

	fn visit_double_range(&mut self, c: &RangeValueMatch<f64>) {
		self.push(
			&c.tag,
			Condition::all()
				.add(tag_value::Column::ValueDouble.gte(c.min))
				.add(tag_value::Column::ValueDouble.lte(c.max)),
		);
	}

	fn visit_date_single(&mut self, c: &SingleValueMatch<NaiveDate>) {
		self.push(
			&c.tag,
			Condition::all().add(tag_value::Column::ValueDate.eq(c.value)),
		);
	}

	fn visit_date_range(&mut self, c: &RangeValueMatch<NaiveDate>) {
		self.push(
			&c.tag,
			Condition::all()
				.add(tag_value::Column::ValueDate.gte(c.min))
				.add(tag_value::Column::ValueDate.lte(c.max)),
		);
	}
}

/// Evaluates filter conditions against the index.
pub struct QueryService {
	conn: DatabaseConnection,
}

impl QueryService {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}

	/// Instances in `partition_key` matching every condition.
	///
	/// Extended-tag conditions are evaluated against their index rows; core
	/// UID attributes map onto instance columns. A condition on an extended
	/// tag that is not `Ready` is rejected: tags mid-registration or
	/// mid-removal are never queryable.
	pub async fn query_instances(
		&self,
		partition_key: i32,
		conditions: &[QueryFilterCondition],
	) -> Result<Vec<InstanceIdentifier>> {
		let mut instance_filter = Condition::all()
			.add(instance::Column::PartitionKey.eq(partition_key))
			.add(instance::Column::Status.eq(IndexStatus::Created.as_i32()));
		let mut watermark_sets: Vec<BTreeSet<i64>> = Vec::new();

		for condition in conditions {
			match condition.tag() {
				QueryTag::Core(core) => {
					instance_filter =
						instance_filter.add(core_uid_predicate(core.path, condition)?);
				}
				QueryTag::Extended(entry) => {
					if entry.status != TagStatus::Ready {
						return Err(ValidationError::UnsupportedFilterAttribute(
							entry.path.clone(),
						)
						.into());
					}
					let mut builder = TagValuePredicateBuilder::new();
					condition.accept(&mut builder);
					let predicate = builder.build()?;

					let watermarks: Vec<i64> = tag_value::Entity::find()
						.select_only()
						.column(tag_value::Column::Watermark)
						.filter(tag_value::Column::PartitionKey.eq(partition_key))
						.filter(predicate)
						.into_tuple()
						.all(&self.conn)
						.await
						.map_err(from_db_err)?;
					watermark_sets.push(watermarks.into_iter().collect());
				}
			}
		}

		// Every extended-tag condition must hold, so intersect their
		// watermark sets before touching the instance table.
		if let Some(intersection) = intersect(watermark_sets) {
			if intersection.is_empty() {
				return Ok(Vec::new());
			}
			instance_filter = instance_filter
				.add(instance::Column::Watermark.is_in(intersection.into_iter().collect::<Vec<_>>()));
		}

		let models = instance::Entity::find()
			.filter(instance_filter)
			.order_by_asc(instance::Column::Watermark)
			.all(&self.conn)
			.await
			.map_err(from_db_err)?;

		Ok(models
			.into_iter()
			.map(|m| InstanceIdentifier {
				watermark: m.watermark,
				partition_key: m.partition_key,
				study_instance_uid: m.study_instance_uid,
				series_instance_uid: m.series_instance_uid,
				sop_instance_uid: m.sop_instance_uid,
			})
			.collect())
	}
}

/// Core attributes answerable from instance columns. Anything else belongs
/// to the full attribute tables of the outer query engine.
fn core_uid_predicate(path: &str, condition: &QueryFilterCondition) -> Result<Condition> {
	let column = match path {
		"0020000D" => instance::Column::StudyInstanceUid,
		"0020000E" => instance::Column::SeriesInstanceUid,
		"00080018" => instance::Column::SopInstanceUid,
		_ => {
			return Err(ValidationError::UnsupportedFilterAttribute(path.to_string()).into());
		}
	};
	match condition {
		QueryFilterCondition::StringSingle(c) => {
			Ok(Condition::all().add(column.eq(c.value.clone())))
		}
		_ => Err(ValidationError::UnsupportedFilterAttribute(path.to_string()).into()),
	}
}

fn intersect(sets: Vec<BTreeSet<i64>>) -> Option<BTreeSet<i64>> {
	let mut iter = sets.into_iter();
	let first = iter.next()?;
	Some(iter.fold(first, |acc, set| acc.intersection(&set).copied().collect()))
}
