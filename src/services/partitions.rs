//! Partition service: linearizable get-or-create over the partition store
//! with a read-through TTL cache.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::domain::partition::{validate_partition_name, Partition};
use crate::error::{Error, Result};
use crate::schema::resolver::VersionedResolver;
use crate::stores::partition::PartitionStore;

type PartitionFuture = Shared<BoxFuture<'static, Result<Partition>>>;
type Cache = Arc<RwLock<HashMap<String, CacheEntry>>>;

struct CacheEntry {
	partition: Partition,
	inserted_at: Instant,
}

/// Read-through partition cache keyed by name.
///
/// `get_or_create` guarantees at-most-one underlying creation per key even
/// under concurrent callers: every caller for an uncached name joins one
/// shared in-flight lookup/creation. The store's uniqueness constraint is
/// the second line of defence; losing that race falls back to a read.
pub struct PartitionService {
	store: Arc<VersionedResolver<dyn PartitionStore>>,
	ttl: Duration,
	cache: Cache,
	pending: Arc<Mutex<HashMap<String, PartitionFuture>>>,
}

impl PartitionService {
	pub fn new(store: Arc<VersionedResolver<dyn PartitionStore>>, ttl: Duration) -> Self {
		Self {
			store,
			ttl,
			cache: Arc::new(RwLock::new(HashMap::new())),
			pending: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Get a partition by name, creating it if it does not exist yet.
	pub async fn get_or_create(&self, name: &str) -> Result<Partition> {
		validate_partition_name(name)?;

		if let Some(partition) = self.read_fresh(name).await {
			return Ok(partition);
		}

		let future = {
			let mut pending = self.pending.lock().await;
			// The cache may have been populated while we waited on the lock.
			if let Some(partition) = self.read_fresh(name).await {
				return Ok(partition);
			}
			match pending.get(name) {
				Some(future) => future.clone(),
				None => {
					let future = self.spawn_flight(name.to_string());
					pending.insert(name.to_string(), future.clone());
					future
				}
			}
		};

		future.await
	}

	/// Fetch a partition by name, bypassing the cache.
	pub async fn get_by_name(&self, name: &str) -> Result<Partition> {
		validate_partition_name(name)?;
		let store = self.store.resolve().await?;
		store
			.get(name)
			.await?
			.ok_or_else(|| Error::NotFound(format!("partition '{name}'")))
	}

	/// List all partitions, bypassing the cache.
	pub async fn list(&self) -> Result<Vec<Partition>> {
		let store = self.store.resolve().await?;
		store.list().await
	}

	async fn read_fresh(&self, name: &str) -> Option<Partition> {
		let cache = self.cache.read().await;
		cache.get(name).and_then(|entry| {
			// Expiry only gates reads; an in-flight creation is never
			// invalidated by TTL.
			(entry.inserted_at.elapsed() < self.ttl).then(|| entry.partition.clone())
		})
	}

	/// Build the single in-flight lookup/creation future for a key. The
	/// future removes its own pending slot when it completes, driven by
	/// whichever caller polls it first.
	fn spawn_flight(&self, name: String) -> PartitionFuture {
		let resolver = self.store.clone();
		let pending = self.pending.clone();
		let cache = self.cache.clone();

		async move {
			let result = Self::lookup_or_create(resolver, &name).await;

			pending.lock().await.remove(&name);
			if let Ok(partition) = &result {
				cache.write().await.insert(
					name,
					CacheEntry {
						partition: partition.clone(),
						inserted_at: Instant::now(),
					},
				);
			}
			result
		}
		.boxed()
		.shared()
	}

	async fn lookup_or_create(
		resolver: Arc<VersionedResolver<dyn PartitionStore>>,
		name: &str,
	) -> Result<Partition> {
		let store = resolver.resolve().await?;

		if let Some(partition) = store.get(name).await? {
			debug!("Partition '{}' already exists", name);
			return Ok(partition);
		}

		match store.create(name).await {
			Ok(partition) => {
				info!("Created partition '{}' with key {}", name, partition.key);
				Ok(partition)
			}
			// Lost the creation race against another process; the row is
			// there now.
			Err(Error::PartitionAlreadyExists { .. }) => store
				.get(name)
				.await?
				.ok_or_else(|| Error::NotFound(format!("partition '{name}'"))),
			Err(e) => Err(e),
		}
	}
}
