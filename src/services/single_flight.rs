//! Promise-based memoization: at most one in-flight computation, with every
//! concurrent caller sharing its result.
//!
//! The first caller installs a shared pending future; all callers (including
//! the first) await it. Success publishes the value for the lifetime of the
//! cell; failure clears the pending state so a later caller can retry.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Error;

type SharedResult<T> = Result<Arc<T>, Error>;
type PendingFuture<T> = Shared<BoxFuture<'static, SharedResult<T>>>;

enum Slot<T> {
	Idle,
	Pending(PendingFuture<T>),
	Ready(Arc<T>),
}

struct Inner<T> {
	/// Bumped by `invalidate`; a completion belonging to an older generation
	/// must not publish its result.
	generation: u64,
	slot: Slot<T>,
}

/// A single-flight memoization cell.
pub struct SingleFlight<T> {
	inner: Mutex<Inner<T>>,
}

impl<T> Default for SingleFlight<T> {
	fn default() -> Self {
		Self {
			inner: Mutex::new(Inner {
				generation: 0,
				slot: Slot::Idle,
			}),
		}
	}
}

impl<T: Send + Sync + 'static> SingleFlight<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Get the memoized value, running `init` if no value is published and
	/// no computation is in flight.
	pub async fn get_or_init<F, Fut>(&self, init: F) -> SharedResult<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, Error>> + Send + 'static,
	{
		let (future, generation) = {
			let mut inner = self.inner.lock().await;
			match &inner.slot {
				Slot::Ready(value) => return Ok(value.clone()),
				Slot::Pending(future) => (future.clone(), inner.generation),
				Slot::Idle => {
					let future = init().map(|result| result.map(Arc::new)).boxed().shared();
					inner.slot = Slot::Pending(future.clone());
					(future, inner.generation)
				}
			}
		};

		let result = future.await;

		let mut inner = self.inner.lock().await;
		if inner.generation == generation {
			match &result {
				Ok(value) => inner.slot = Slot::Ready(value.clone()),
				// Clear the failed flight so the next caller retries.
				Err(_) => {
					if matches!(inner.slot, Slot::Pending(_)) {
						inner.slot = Slot::Idle;
					}
				}
			}
		}
		result
	}

	/// Drop the published value (and orphan any in-flight computation) so
	/// the next caller recomputes.
	pub async fn invalidate(&self) {
		let mut inner = self.inner.lock().await;
		inner.generation += 1;
		inner.slot = Slot::Idle;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::sync::Notify;

	#[tokio::test]
	async fn concurrent_callers_share_one_computation() {
		let flight = Arc::new(SingleFlight::<usize>::new());
		let calls = Arc::new(AtomicUsize::new(0));
		let release = Arc::new(Notify::new());

		let mut handles = Vec::new();
		for _ in 0..8 {
			let flight = flight.clone();
			let calls = calls.clone();
			let release = release.clone();
			handles.push(tokio::spawn(async move {
				flight
					.get_or_init(move || async move {
						calls.fetch_add(1, Ordering::SeqCst);
						release.notified().await;
						Ok(42)
					})
					.await
			}));
		}

		// Let every caller reach the cell before the computation finishes.
		tokio::task::yield_now().await;
		release.notify_waiters();

		for handle in handles {
			assert_eq!(*handle.await.unwrap().unwrap(), 42);
		}
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failure_allows_retry() {
		let flight = SingleFlight::<usize>::new();
		let calls = Arc::new(AtomicUsize::new(0));

		let calls_first = calls.clone();
		let first = flight
			.get_or_init(move || async move {
				calls_first.fetch_add(1, Ordering::SeqCst);
				Err(Error::Transient("boom".into()))
			})
			.await;
		assert!(first.is_err());

		let calls_second = calls.clone();
		let second = flight
			.get_or_init(move || async move {
				calls_second.fetch_add(1, Ordering::SeqCst);
				Ok(7)
			})
			.await;
		assert_eq!(*second.unwrap(), 7);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn success_is_cached_until_invalidated() {
		let flight = SingleFlight::<usize>::new();
		let calls = Arc::new(AtomicUsize::new(0));

		for _ in 0..3 {
			let calls = calls.clone();
			let value = flight
				.get_or_init(move || async move {
					calls.fetch_add(1, Ordering::SeqCst);
					Ok(1)
				})
				.await
				.unwrap();
			assert_eq!(*value, 1);
		}
		assert_eq!(calls.load(Ordering::SeqCst), 1);

		flight.invalidate().await;
		let calls_again = calls.clone();
		flight
			.get_or_init(move || async move {
				calls_again.fetch_add(1, Ordering::SeqCst);
				Ok(2)
			})
			.await
			.unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}
}
