//! On-disk database lifecycle: create, reopen, and survive a restart with
//! tag state intact.

use std::sync::Once;
use uuid::Uuid;

use pacs_core::config::CoreConfig;
use pacs_core::domain::dataset::DicomDataset;
use pacs_core::domain::tag::{ExtendedTagInput, TagStatus};
use pacs_core::PacsCore;

static TRACING: Once = Once::new();

fn init_tracing() {
	TRACING.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(
				tracing_subscriber::EnvFilter::try_from_default_env()
					.unwrap_or_else(|_| "warn".into()),
			)
			.try_init();
	});
}

fn dataset(index: usize) -> DicomDataset {
	let mut dataset = DicomDataset::new();
	dataset
		.set("0020000D", format!("1.2.3.{index}"))
		.set("0020000E", format!("1.2.4.{index}"))
		.set("00080018", format!("1.2.5.{index}"))
		.set("00181063", "2.5");
	dataset
}

#[tokio::test]
async fn reopened_database_keeps_tag_state() {
	init_tracing();
	let dir = tempfile::TempDir::new().unwrap();
	let db_path = dir.path().join("metadata.db");

	{
		let core = PacsCore::create(&db_path, CoreConfig::default())
			.await
			.unwrap();
		for i in 1..=3 {
			core.ingest_instance("Default", dataset(i)).await.unwrap();
		}

		let created = core
			.tags
			.add_tags(&[ExtendedTagInput {
				path: "00181063".into(),
				vr: "DS".into(),
				private_creator: None,
				level: "Instance".into(),
			}])
			.await
			.unwrap();
		core.reindex
			.run_to_completion(Uuid::new_v4(), &[created[0].key])
			.await
			.unwrap();
	}

	// A fresh process over the same file sees the completed state.
	let core = PacsCore::open(&db_path, CoreConfig::default())
		.await
		.unwrap();
	let tag = core.tags.get_tag("00181063").await.unwrap();
	assert_eq!(tag.status, TagStatus::Ready);

	let tags = core.query_tags.get_all_tags().await.unwrap();
	assert!(tags.iter().any(|t| t.path() == "00181063"));
}

#[tokio::test]
async fn opening_a_missing_database_fails() {
	init_tracing();
	let dir = tempfile::TempDir::new().unwrap();
	let result = PacsCore::open(&dir.path().join("nope.db"), CoreConfig::default()).await;
	assert!(result.is_err());
}
