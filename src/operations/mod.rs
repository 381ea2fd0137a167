//! Long-running operations: the reindex pipeline and the tag delete drain.

pub mod drain;
pub mod reindex;
