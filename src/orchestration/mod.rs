//! # Orchestration
//!
//! The control loop of a run: where candidates come from, how one batch is
//! driven through compile, upload, and redaction, and the counters that
//! decide the exit status.

pub mod batch_processor;
pub mod candidate_source;
pub mod run_orchestrator;
pub mod summary;

pub use batch_processor::{BatchOutcome, BatchProcessor};
pub use candidate_source::{
    AreaCandidates, CandidateSource, MapCandidateSource, TrackerCandidateSource,
};
pub use run_orchestrator::{RunContext, RunOrchestrator};
pub use summary::RunSummary;
