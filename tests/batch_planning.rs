//! Batch planning properties: successive planning rounds produce disjoint
//! ranges whose union covers exactly the qualifying watermarks.

use std::collections::BTreeSet;

use pacs_core::config::CoreConfig;
use pacs_core::domain::dataset::DicomDataset;
use pacs_core::stores::{IndexStatus, InstanceStore};
use pacs_core::PacsCore;

fn dataset(index: usize) -> DicomDataset {
	let mut dataset = DicomDataset::new();
	dataset
		.set("0020000D", format!("1.2.3.{index}"))
		.set("0020000E", format!("1.2.4.{index}"))
		.set("00080018", format!("1.2.5.{index}"));
	dataset
}

#[tokio::test]
async fn successive_rounds_cover_everything_exactly_once() {
	let core = PacsCore::connect("sqlite::memory:", CoreConfig::default())
		.await
		.unwrap();
	for i in 1..=23 {
		core.ingest_instance("Default", dataset(i)).await.unwrap();
	}
	let store = core.instances();

	let batch_size = 4u64;
	let max_parallel = 3u64;
	let mut cursor = store.max_watermark(IndexStatus::Created).await.unwrap();
	assert_eq!(cursor, Some(23));

	let mut covered: BTreeSet<i64> = BTreeSet::new();
	let mut rounds = 0;

	while let Some(max) = cursor {
		let ranges = store
			.get_batches(batch_size, max_parallel, IndexStatus::Created, Some(max))
			.await
			.unwrap();
		if ranges.is_empty() {
			break;
		}
		rounds += 1;

		for range in &ranges {
			assert!(range.start <= range.end);
			assert!(range.span() <= batch_size);
			for watermark in range.start..=range.end {
				// Disjointness: no watermark appears in two ranges.
				assert!(
					covered.insert(watermark),
					"watermark {watermark} covered twice"
				);
			}
		}

		cursor = ranges.iter().map(|r| r.start).min().map(|s| s - 1);
	}

	// Exhaustiveness: the union is exactly 1..=23.
	assert_eq!(covered, (1..=23).collect::<BTreeSet<i64>>());
	// 23 instances at up to 12 per round take two full rounds and a tail.
	assert_eq!(rounds, 2);
}

#[tokio::test]
async fn planning_skips_instances_that_are_not_created_yet() {
	let core = PacsCore::connect("sqlite::memory:", CoreConfig::default())
		.await
		.unwrap();
	let store = core.instances();

	// Watermarks 1-3 fully ingested; watermark 4 still Creating.
	for i in 1..=3 {
		core.ingest_instance("Default", dataset(i)).await.unwrap();
	}
	store.insert_instance(1, &dataset(4)).await.unwrap();

	let ranges = store
		.get_batches(10, 4, IndexStatus::Created, None)
		.await
		.unwrap();
	assert_eq!(ranges.len(), 1);
	assert_eq!((ranges[0].start, ranges[0].end), (1, 3));

	let instances = store
		.get_instances_in_range(ranges[0], IndexStatus::Created)
		.await
		.unwrap();
	assert_eq!(instances.len(), 3);
}

#[tokio::test]
async fn empty_store_plans_no_batches() {
	let core = PacsCore::connect("sqlite::memory:", CoreConfig::default())
		.await
		.unwrap();
	let store = core.instances();

	assert_eq!(
		store.max_watermark(IndexStatus::Created).await.unwrap(),
		None
	);
	let ranges = store
		.get_batches(10, 4, IndexStatus::Created, None)
		.await
		.unwrap();
	assert!(ranges.is_empty());
}

#[tokio::test]
async fn ranges_descend_from_the_high_water_mark() {
	let core = PacsCore::connect("sqlite::memory:", CoreConfig::default())
		.await
		.unwrap();
	for i in 1..=10 {
		core.ingest_instance("Default", dataset(i)).await.unwrap();
	}
	let store = core.instances();

	let ranges = store
		.get_batches(3, 2, IndexStatus::Created, None)
		.await
		.unwrap();
	// Most recently ingested data is covered first.
	assert_eq!(ranges.len(), 2);
	assert_eq!((ranges[0].start, ranges[0].end), (8, 10));
	assert_eq!((ranges[1].start, ranges[1].end), (5, 7));
}
