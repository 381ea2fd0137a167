//! Versioned store resolution: a registry of (schema version, concrete
//! implementation) pairs resolved against the active version at call time.
//!
//! An implementation that serves several versions registers once per
//! version. Resolution is an exact match: an active version with no
//! registration means this deployment cannot serve the capability, and
//! callers get a distinct "not ready" error instead of a silently wrong
//! implementation.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::oracle::SchemaVersionOracle;
use crate::schema::version::SchemaVersion;

/// Registry of versioned implementations of a store interface `S`.
pub struct VersionedResolver<S: ?Sized> {
	oracle: Arc<dyn SchemaVersionOracle>,
	registrations: Vec<(SchemaVersion, Arc<S>)>,
}

impl<S: ?Sized> VersionedResolver<S> {
	pub fn new(oracle: Arc<dyn SchemaVersionOracle>) -> Self {
		Self {
			oracle,
			registrations: Vec::new(),
		}
	}

	/// Register `implementation` for `version`. Registering the same version
	/// twice replaces the earlier entry.
	pub fn register(mut self, version: SchemaVersion, implementation: Arc<S>) -> Self {
		self.registrations.retain(|(v, _)| *v != version);
		self.registrations.push((version, implementation));
		self
	}

	/// Register `implementation` for every version in `versions`.
	pub fn register_range(mut self, versions: &[SchemaVersion], implementation: Arc<S>) -> Self {
		for version in versions {
			self = self.register(*version, implementation.clone());
		}
		self
	}

	/// Resolve the implementation for the currently active schema version.
	///
	/// The version read itself is cached by the oracle; the lookup here is a
	/// scan over a handful of registrations.
	pub async fn resolve(&self) -> Result<Arc<S>> {
		let active = self.oracle.current().await?;
		self.registrations
			.iter()
			.find(|(version, _)| *version == active)
			.map(|(_, implementation)| implementation.clone())
			.ok_or(Error::UnsupportedSchemaVersion {
				version: active.as_i32(),
			})
	}
}
