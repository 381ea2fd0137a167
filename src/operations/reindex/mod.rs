//! Reindex pipeline: retrofits newly registered extended tags onto
//! previously stored instances.
//!
//! The pipeline is a checkpointed two-phase loop — plan watermark ranges,
//! execute them with bounded parallelism, durably record progress, repeat —
//! expressed as idempotent activities so an external replay-safe scheduler
//! can drive it. The driver loop in [`orchestrator`] holds no state that is
//! not recoverable from the progress record.

pub mod activities;
pub mod orchestrator;

pub use activities::{BatchOutcome, ReindexActivities, StartOutcome};
pub use orchestrator::{ReindexOrchestrator, ReindexService, ReindexSummary};
