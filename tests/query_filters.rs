//! Query execution over indexed tag values: typed predicates, range
//! conditions, core UID fast paths and the queryability gate.

use uuid::Uuid;

use pacs_core::config::CoreConfig;
use pacs_core::domain::dataset::DicomDataset;
use pacs_core::domain::tag::{core_tag, ExtendedTagInput, QueryTag};
use pacs_core::query::QueryFilterCondition;
use pacs_core::{Error, PacsCore};

fn dataset(index: usize, study_date: &str, exposure: i64) -> DicomDataset {
	let mut dataset = DicomDataset::new();
	dataset
		.set("0020000D", format!("1.2.3.{index}"))
		.set("0020000E", format!("1.2.4.{index}"))
		.set("00080018", format!("1.2.5.{index}"))
		.set("00080022", study_date)
		.set("00181152", exposure.to_string());
	dataset
}

async fn seeded_core() -> (PacsCore, QueryTag, QueryTag) {
	let core = PacsCore::connect("sqlite::memory:", CoreConfig::default())
		.await
		.unwrap();

	core.ingest_instance("Default", dataset(1, "20240101", 80))
		.await
		.unwrap();
	core.ingest_instance("Default", dataset(2, "20240115", 120))
		.await
		.unwrap();
	core.ingest_instance("Default", dataset(3, "20240301", 200))
		.await
		.unwrap();

	let created = core
		.tags
		.add_tags(&[
			ExtendedTagInput {
				path: "00080022".into(),
				vr: "DA".into(),
				private_creator: None,
				level: "Study".into(),
			},
			ExtendedTagInput {
				path: "00181152".into(),
				vr: "IS".into(),
				private_creator: None,
				level: "Instance".into(),
			},
		])
		.await
		.unwrap();
	let keys: Vec<i64> = created.iter().map(|t| t.key).collect();
	core.reindex
		.run_to_completion(Uuid::new_v4(), &keys)
		.await
		.unwrap();

	let tags = core.query_tags.get_all_tags().await.unwrap();
	let date_tag = tags.iter().find(|t| t.path() == "00080022" && t.is_extended()).unwrap().clone();
	let exposure_tag = tags.iter().find(|t| t.path() == "00181152").unwrap().clone();
	(core, date_tag, exposure_tag)
}

#[tokio::test]
async fn date_range_conditions_match_inclusively() {
	let (core, date_tag, _) = seeded_core().await;

	let condition = QueryFilterCondition::between(date_tag, "20240101", "20240131").unwrap();
	let matched = core.query.query_instances(1, &[condition]).await.unwrap();

	let watermarks: Vec<i64> = matched.iter().map(|m| m.watermark).collect();
	assert_eq!(watermarks, vec![1, 2]);
}

#[tokio::test]
async fn long_equality_matches_single_instance() {
	let (core, _, exposure_tag) = seeded_core().await;

	let condition = QueryFilterCondition::equals(exposure_tag, "120").unwrap();
	let matched = core.query.query_instances(1, &[condition]).await.unwrap();
	assert_eq!(matched.len(), 1);
	assert_eq!(matched[0].sop_instance_uid, "1.2.5.2");
}

#[tokio::test]
async fn multiple_conditions_intersect() {
	let (core, date_tag, exposure_tag) = seeded_core().await;

	let date = QueryFilterCondition::between(date_tag, "20240101", "20241231").unwrap();
	let exposure = QueryFilterCondition::between(exposure_tag, "100", "300").unwrap();
	let matched = core
		.query
		.query_instances(1, &[date, exposure])
		.await
		.unwrap();

	let watermarks: Vec<i64> = matched.iter().map(|m| m.watermark).collect();
	assert_eq!(watermarks, vec![2, 3]);
}

#[tokio::test]
async fn core_uid_condition_combines_with_extended_conditions() {
	let (core, _, exposure_tag) = seeded_core().await;

	let study = QueryFilterCondition::equals(
		QueryTag::Core(core_tag("0020000D").unwrap()),
		"1.2.3.3",
	)
	.unwrap();
	let exposure = QueryFilterCondition::between(exposure_tag, "1", "1000").unwrap();

	let matched = core
		.query
		.query_instances(1, &[study, exposure])
		.await
		.unwrap();
	assert_eq!(matched.len(), 1);
	assert_eq!(matched[0].watermark, 3);
}

#[tokio::test]
async fn conditions_on_non_ready_tags_are_rejected() {
	let core = PacsCore::connect("sqlite::memory:", CoreConfig::default())
		.await
		.unwrap();
	core.ingest_instance("Default", dataset(1, "20240101", 80))
		.await
		.unwrap();

	let created = core
		.tags
		.add_tags(&[ExtendedTagInput {
			path: "00181152".into(),
			vr: "IS".into(),
			private_creator: None,
			level: "Instance".into(),
		}])
		.await
		.unwrap();

	// Build a condition against the Adding tag directly: the executor must
	// refuse it, keeping unfinished tags invisible to queries.
	let condition =
		QueryFilterCondition::equals(QueryTag::Extended(created[0].clone()), "80").unwrap();
	let err = core
		.query
		.query_instances(1, &[condition])
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn unsupported_core_attributes_are_rejected() {
	let (core, _, _) = seeded_core().await;

	// PatientName is served by the outer query engine's attribute tables,
	// not by instance columns.
	let condition = QueryFilterCondition::equals(
		QueryTag::Core(core_tag("00100010").unwrap()),
		"Doe^Jane",
	)
	.unwrap();
	let err = core
		.query
		.query_instances(1, &[condition])
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn conditions_scope_to_their_partition() {
	let (core, _, exposure_tag) = seeded_core().await;

	// Same attribute value ingested under another partition.
	core.ingest_instance("clinic-b", dataset(9, "20240110", 120))
		.await
		.unwrap();

	let condition = QueryFilterCondition::equals(exposure_tag, "120").unwrap();
	let matched = core.query.query_instances(1, &[condition]).await.unwrap();
	assert_eq!(matched.len(), 1);
	assert_eq!(matched[0].partition_key, 1);
}
