//! Services exposed to the API layer.

pub mod partitions;
pub mod query_tags;
pub mod single_flight;
pub mod tags;

pub use partitions::PartitionService;
pub use query_tags::QueryTagService;
pub use single_flight::SingleFlight;
pub use tags::TagService;
