//! Query tag service properties: single-flight fetch under concurrency and
//! invalidation on status transitions.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

use pacs_core::domain::tag::{
	ExtendedTagEntry, QueryTag, TagLevel, TagStatus, ValidatedTagInput, Vr, CORE_TAGS,
};
use pacs_core::error::Result;
use pacs_core::schema::oracle::FixedSchemaVersionOracle;
use pacs_core::schema::resolver::VersionedResolver;
use pacs_core::schema::version::SchemaVersion;
use pacs_core::services::QueryTagService;
use pacs_core::stores::ExtendedTagStore;

/// Tag store fake that counts fetches and can hold them open until
/// released, so tests control when the single flight completes.
#[derive(Debug)]
struct BlockingTagStore {
	fetches: AtomicU64,
	release: Notify,
	blocking: bool,
}

impl BlockingTagStore {
	fn new(blocking: bool) -> Self {
		Self {
			fetches: AtomicU64::new(0),
			release: Notify::new(),
			blocking,
		}
	}

	fn ready_tag() -> ExtendedTagEntry {
		ExtendedTagEntry {
			key: 11,
			path: "00181063".into(),
			vr: Vr::DS,
			private_creator: None,
			level: TagLevel::Instance,
			status: TagStatus::Ready,
		}
	}
}

#[async_trait]
impl ExtendedTagStore for BlockingTagStore {
	async fn add_tags(&self, _entries: &[ValidatedTagInput]) -> Result<Vec<ExtendedTagEntry>> {
		unimplemented!("not exercised")
	}

	async fn get_tags(&self) -> Result<Vec<ExtendedTagEntry>> {
		unimplemented!("not exercised")
	}

	async fn get_tag_by_path(&self, _path: &str) -> Result<ExtendedTagEntry> {
		unimplemented!("not exercised")
	}

	async fn get_tag(&self, _key: i64) -> Result<ExtendedTagEntry> {
		unimplemented!("not exercised")
	}

	async fn get_tags_by_status(&self, status: TagStatus) -> Result<Vec<ExtendedTagEntry>> {
		assert_eq!(status, TagStatus::Ready);
		self.fetches.fetch_add(1, Ordering::SeqCst);
		if self.blocking {
			self.release.notified().await;
		}
		Ok(vec![Self::ready_tag()])
	}

	async fn assign_reindex_operation(
		&self,
		_tag_keys: &[i64],
		_operation_id: Uuid,
		_return_if_completed: bool,
	) -> Result<Vec<ExtendedTagEntry>> {
		unimplemented!("not exercised")
	}

	async fn get_tags_by_operation(&self, _operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>> {
		unimplemented!("not exercised")
	}

	async fn complete_reindex(&self, _operation_id: Uuid) -> Result<Vec<ExtendedTagEntry>> {
		unimplemented!("not exercised")
	}

	async fn update_status(&self, _tag_key: i64, _status: TagStatus) -> Result<ExtendedTagEntry> {
		unimplemented!("not exercised")
	}

	async fn delete_entry(&self, _tag_key: i64) -> Result<()> {
		unimplemented!("not exercised")
	}
}

fn service(store: Arc<BlockingTagStore>) -> QueryTagService {
	let oracle = FixedSchemaVersionOracle::new(SchemaVersion::V4);
	let resolver = Arc::new(
		VersionedResolver::<dyn ExtendedTagStore>::new(oracle)
			.register(SchemaVersion::V4, store),
	);
	QueryTagService::new(resolver)
}

#[tokio::test]
async fn concurrent_callers_share_one_store_fetch() {
	let store = Arc::new(BlockingTagStore::new(true));
	let service = Arc::new(service(store.clone()));

	let mut handles = Vec::new();
	for _ in 0..8 {
		let service = service.clone();
		handles.push(tokio::spawn(async move { service.get_all_tags().await }));
	}

	// Give every caller time to join the in-flight fetch, then release it.
	tokio::task::yield_now().await;
	store.release.notify_waiters();

	let mut lists = Vec::new();
	for handle in handles {
		lists.push(handle.await.unwrap().unwrap());
	}

	assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
	// Every caller observes the identical merged list.
	for list in &lists {
		assert_eq!(list.len(), CORE_TAGS.len() + 1);
		assert_eq!(**list, *lists[0]);
	}
}

#[tokio::test]
async fn merged_list_has_core_tags_first_and_extended_after() {
	let store = Arc::new(BlockingTagStore::new(false));
	let service = service(store);

	let tags = service.get_all_tags().await.unwrap();
	assert_eq!(tags.len(), CORE_TAGS.len() + 1);
	assert!(matches!(tags[0], QueryTag::Core(_)));
	match tags.last().unwrap() {
		QueryTag::Extended(entry) => assert_eq!(entry.path, "00181063"),
		QueryTag::Core(_) => panic!("extended tag missing from merged list"),
	}
}

#[tokio::test]
async fn cache_lives_until_invalidated() {
	let store = Arc::new(BlockingTagStore::new(false));
	let service = service(store.clone());

	for _ in 0..4 {
		service.get_all_tags().await.unwrap();
	}
	assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

	// A tag status transition invalidates; the next read refetches.
	service.invalidate().await;
	service.get_all_tags().await.unwrap();
	assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
}
