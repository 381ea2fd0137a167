//! Schema-version-aware store resolution.
//!
//! The persistent schema is upgraded incrementally while the service keeps
//! serving requests; store implementations register per supported version
//! and are selected against the currently active version at call time.

pub mod oracle;
pub mod resolver;
pub mod version;

pub use oracle::{SchemaVersionOracle, SqlSchemaVersionOracle};
pub use resolver::VersionedResolver;
pub use version::SchemaVersion;
