//! Domain model: tags, watermarks, partitions, datasets and operation state.

pub mod dataset;
pub mod operation;
pub mod partition;
pub mod tag;
pub mod watermark;

pub use dataset::{AttributeValue, DicomDataset};
pub use operation::{OperationStatus, ReindexCheckpoint, ReindexOperation};
pub use partition::Partition;
pub use tag::{
	CoreTag, ExtendedTagEntry, ExtendedTagInput, QueryTag, TagLevel, TagStatus, ValueDomain, Vr,
	CORE_TAGS,
};
pub use watermark::WatermarkRange;
