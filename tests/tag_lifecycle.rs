//! Extended tag lifecycle tests: registration conflicts, the status state
//! machine, reindex claims and the delete drain.

use uuid::Uuid;

use pacs_core::config::CoreConfig;
use pacs_core::domain::dataset::DicomDataset;
use pacs_core::domain::tag::{ExtendedTagInput, TagStatus};
use pacs_core::stores::{ExtendedTagStore, IndexStore, SqlExtendedTagStore, SqlIndexStore};
use pacs_core::{Error, PacsCore};

fn input(path: &str, vr: &str) -> ExtendedTagInput {
	ExtendedTagInput {
		path: path.into(),
		vr: vr.into(),
		private_creator: None,
		level: "Study".into(),
	}
}

async fn core() -> PacsCore {
	PacsCore::connect("sqlite::memory:", CoreConfig::default())
		.await
		.unwrap()
}

fn tag_store(core: &PacsCore) -> SqlExtendedTagStore {
	SqlExtendedTagStore::new(core.database().conn().clone())
}

#[tokio::test]
async fn duplicate_path_registration_conflicts() {
	let core = core().await;

	core.tags.add_tags(&[input("0008002B", "SH")]).await.unwrap();

	let err = core
		.tags
		.add_tags(&[input("0008002B", "SH")])
		.await
		.unwrap_err();
	assert!(matches!(err, Error::TagAlreadyExists { .. }));

	// Path comparison is case-insensitive.
	let err = core
		.tags
		.add_tags(&[input("0008002b", "SH")])
		.await
		.unwrap_err();
	assert!(matches!(err, Error::TagAlreadyExists { .. }));
}

#[tokio::test]
async fn direct_promotion_to_ready_is_rejected() {
	let core = core().await;
	let created = core.tags.add_tags(&[input("00081048", "PN")]).await.unwrap();
	let store = tag_store(&core);

	// Adding -> Ready without a completed reindex operation must fail.
	let err = store
		.update_status(created[0].key, TagStatus::Ready)
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		Error::InvalidStateTransition {
			from: TagStatus::Adding,
			to: TagStatus::Ready,
		}
	));
}

#[tokio::test]
async fn deleting_is_reachable_from_adding_and_ready() {
	let core = core().await;
	let store = tag_store(&core);

	let created = core
		.tags
		.add_tags(&[input("00081048", "PN"), input("00081030", "LO")])
		.await
		.unwrap();

	// Adding -> Deleting.
	let updated = store
		.update_status(created[0].key, TagStatus::Deleting)
		.await
		.unwrap();
	assert_eq!(updated.status, TagStatus::Deleting);

	// Adding -> Ready via completion, then Ready -> Deleting.
	let operation_id = Uuid::new_v4();
	store
		.assign_reindex_operation(&[created[1].key], operation_id, false)
		.await
		.unwrap();
	store.complete_reindex(operation_id).await.unwrap();
	let ready = store.get_tag(created[1].key).await.unwrap();
	assert_eq!(ready.status, TagStatus::Ready);

	let updated = store
		.update_status(created[1].key, TagStatus::Deleting)
		.await
		.unwrap();
	assert_eq!(updated.status, TagStatus::Deleting);

	// Deleting is terminal for status updates.
	let err = store
		.update_status(created[1].key, TagStatus::Ready)
		.await
		.unwrap_err();
	assert!(matches!(err, Error::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn claim_conflicts_surface_tag_busy() {
	let core = core().await;
	let store = tag_store(&core);
	let created = core.tags.add_tags(&[input("00081048", "PN")]).await.unwrap();
	let key = created[0].key;

	let holder = Uuid::new_v4();
	let claimed = store
		.assign_reindex_operation(&[key], holder, false)
		.await
		.unwrap();
	assert_eq!(claimed.len(), 1);

	// Re-claiming with the same operation id is an idempotent no-op.
	let again = store
		.assign_reindex_operation(&[key], holder, false)
		.await
		.unwrap();
	assert_eq!(again.len(), 1);

	// A different operation must be refused with the holder's id.
	let err = store
		.assign_reindex_operation(&[key], Uuid::new_v4(), false)
		.await
		.unwrap_err();
	match err {
		Error::TagBusy { key: busy_key, operation_id } => {
			assert_eq!(busy_key, key);
			assert_eq!(operation_id, holder);
		}
		other => panic!("expected TagBusy, got {other:?}"),
	}
}

#[tokio::test]
async fn completed_tags_are_returned_without_reclaiming() {
	let core = core().await;
	let store = tag_store(&core);
	let created = core.tags.add_tags(&[input("00081048", "PN")]).await.unwrap();
	let key = created[0].key;

	let operation_id = Uuid::new_v4();
	store
		.assign_reindex_operation(&[key], operation_id, false)
		.await
		.unwrap();
	store.complete_reindex(operation_id).await.unwrap();

	// Without the flag a Ready tag yields nothing to do.
	let empty = store
		.assign_reindex_operation(&[key], Uuid::new_v4(), false)
		.await
		.unwrap();
	assert!(empty.is_empty());

	// With the flag the Ready tag comes back without a new claim.
	let returned = store
		.assign_reindex_operation(&[key], Uuid::new_v4(), true)
		.await
		.unwrap();
	assert_eq!(returned.len(), 1);
	assert_eq!(returned[0].status, TagStatus::Ready);
}

#[tokio::test]
async fn delete_entry_requires_deleting_status_and_drained_rows() {
	let core = core().await;
	let store = tag_store(&core);
	let created = core.tags.add_tags(&[input("00081048", "PN")]).await.unwrap();
	let key = created[0].key;

	// Not in Deleting yet.
	let err = store.delete_entry(key).await.unwrap_err();
	assert!(matches!(err, Error::TagNotRemovable { .. }));

	store.update_status(key, TagStatus::Deleting).await.unwrap();

	// Leave an error row behind; deletion must refuse until drained.
	let index_store = SqlIndexStore::new(core.database().conn().clone());
	index_store.record_tag_error(key, 1, "boom").await.unwrap();
	let err = store.delete_entry(key).await.unwrap_err();
	assert!(matches!(err, Error::TagNotDrained { .. }));

	index_store.delete_tag_errors(key, 10).await.unwrap();
	store.delete_entry(key).await.unwrap();

	let err = store.get_tag(key).await.unwrap_err();
	assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn delete_tag_drains_index_rows_end_to_end() {
	let mut config = CoreConfig::default();
	// Tiny drain batches force multiple rounds.
	config.reindex.delete_batch_size = 2;
	let core = PacsCore::connect("sqlite::memory:", config).await.unwrap();

	for i in 1..=7 {
		let mut dataset = DicomDataset::new();
		dataset
			.set("0020000D", format!("1.2.3.{i}"))
			.set("0020000E", format!("1.2.4.{i}"))
			.set("00080018", format!("1.2.5.{i}"))
			.set("00081048", "Doe^John");
		core.ingest_instance("Default", dataset).await.unwrap();
	}

	let created = core.tags.add_tags(&[input("00081048", "PN")]).await.unwrap();
	core.reindex
		.run_to_completion(Uuid::new_v4(), &[created[0].key])
		.await
		.unwrap();

	// Deletion works even for a Ready tag and removes the row entirely.
	core.tags.delete_tag("00081048").await.unwrap();
	let err = core.tags.get_tag("00081048").await.unwrap_err();
	assert!(matches!(err, Error::NotFound(_)));
}
