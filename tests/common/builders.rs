//! Builders for in-memory runs.

use redaction_bot::models::{
    Candidate, Changeset, EditAction, EditOperation, Element, EntityType, Redaction, Region,
};
use redaction_bot::orchestration::{RunContext, RunOrchestrator};
use redaction_bot::source::CompiledChanges;
use redaction_bot::test_helpers::{MemorySource, MemoryTracker, ScriptedCompiler, ScriptedRemote};
use std::sync::Arc;

pub type TestOrchestrator = RunOrchestrator<MemorySource, ScriptedCompiler>;

/// Region 1 at (10, 20) holding node 5 at (10.1, 20.1)
pub fn single_region_tracker() -> Arc<MemoryTracker> {
    let tracker = Arc::new(MemoryTracker::new());
    tracker.add_region(Region::new(1, 10.0, 20.0));
    tracker.add_candidate(Candidate::new(EntityType::Node, 5, 10.1, 20.1));
    tracker
}

pub fn orchestrator(
    context: RunContext,
    tracker: Arc<MemoryTracker>,
    remote: Arc<ScriptedRemote>,
    compiler: ScriptedCompiler,
) -> TestOrchestrator {
    RunOrchestrator::new(
        context,
        MemorySource::default(),
        compiler,
        tracker.clone(),
        tracker,
        remote,
    )
}

pub fn modify_node(id: i64) -> EditOperation {
    EditOperation::new(
        EditAction::Modify,
        Element::Node {
            id,
            version: 2,
            lat: 10.1,
            lon: 20.1,
            tags: vec![("highway".to_string(), "crossing".to_string())],
        },
    )
}

pub fn compiled(operations: Vec<EditOperation>, redactions: Vec<Redaction>) -> CompiledChanges {
    CompiledChanges::new(Changeset::new(operations), redactions)
}
