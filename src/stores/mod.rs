//! Store traits and their SQL implementations.
//!
//! Raw driver errors never leave this layer; every adapter translates them
//! into the crate taxonomy at the boundary.

pub mod extended_tag;
pub mod index;
pub mod instance;
pub mod operation;
pub mod partition;

pub use extended_tag::{ExtendedTagStore, SqlExtendedTagStore, SqlExtendedTagStoreV2};
pub use index::{IndexStore, SqlIndexStore, TagValueWrite};
pub use instance::{IndexStatus, InstanceRecord, InstanceStore, SqlInstanceStore};
pub use operation::{OperationStore, SqlOperationStore};
pub use partition::{PartitionStore, PartitionStoreV1, SqlPartitionStore};
