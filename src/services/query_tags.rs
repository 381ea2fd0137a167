//! Query tag service: the merged view of core tags and `Ready` extended
//! tags the query engine builds predicates against.

use std::sync::Arc;
use tracing::debug;

use crate::domain::tag::{QueryTag, TagStatus, CORE_TAGS};
use crate::error::Error;
use crate::schema::resolver::VersionedResolver;
use crate::services::single_flight::SingleFlight;
use crate::stores::extended_tag::ExtendedTagStore;

/// Merges the fixed core-tag set with all `Ready` extended tags.
///
/// The first caller triggers exactly one store fetch; concurrent callers
/// share it. The merged list is cached for the lifetime of the process and
/// invalidated on tag status transitions, not by TTL.
pub struct QueryTagService {
	tag_store: Arc<VersionedResolver<dyn ExtendedTagStore>>,
	cache: SingleFlight<Vec<QueryTag>>,
}

impl QueryTagService {
	pub fn new(tag_store: Arc<VersionedResolver<dyn ExtendedTagStore>>) -> Self {
		Self {
			tag_store,
			cache: SingleFlight::new(),
		}
	}

	/// All queryable tags: core tags plus extended tags in status `Ready`.
	pub async fn get_all_tags(&self) -> Result<Arc<Vec<QueryTag>>, Error> {
		let tag_store = self.tag_store.clone();
		self.cache
			.get_or_init(move || async move {
				let store = tag_store.resolve().await?;
				let extended = store.get_tags_by_status(TagStatus::Ready).await?;
				debug!("Fetched {} ready extended tags", extended.len());

				let mut tags: Vec<QueryTag> = CORE_TAGS.iter().map(QueryTag::Core).collect();
				tags.extend(extended.into_iter().map(QueryTag::Extended));
				Ok(tags)
			})
			.await
	}

	/// Drop the cached list. Called whenever a tag's status changes.
	pub async fn invalidate(&self) {
		self.cache.invalidate().await;
	}
}
