//! # Batch Processor
//!
//! Drives one entity batch through compile, chunked upload, and redaction.
//!
//! ```text
//! compile ──► changeset empty? ──yes──────────────────────┐
//!                  │ no                                   ▼
//!                  ▼                               apply redactions ──► mark processed
//!   for each chunk: open, upload ──all ok─────────────────┘        (error = FatalError)
//!                  │ any failure
//!                  ▼
//!   mark region + entities failed, stop  (BatchOutcome::Failed)
//! ```
//!
//! Chunks are uploaded strictly in order. Chunks before a failing one stay
//! applied on the server; the whole local batch is still marked failed so a
//! later run can retry it. Redaction failures are not contained here: they
//! leave as [`FatalError::RedactionFailed`] and end the run.

use super::run_orchestrator::RunContext;
use super::summary::RunSummary;
use crate::error::{BatchFailure, BatchStage, FatalError, Result};
use crate::models::{Changeset, EntityBatch, EntityType, Redaction, Region};
use crate::remote::osmchange::render_osm_change;
use crate::remote::RemoteEditService;
use crate::source::ChangeCompiler;
use crate::tracker::{CandidateStore, RegionScheduler};
use tracing::{debug, error, info, instrument, warn};

/// Recoverable result of one batch. Fatal conditions travel as `Err(FatalError)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Succeeded,
    Failed(BatchFailure),
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Succeeded)
    }
}

pub struct BatchProcessor<'a> {
    context: &'a RunContext,
    remote: &'a dyn RemoteEditService,
    candidates: &'a dyn CandidateStore,
    scheduler: &'a dyn RegionScheduler,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        context: &'a RunContext,
        remote: &'a dyn RemoteEditService,
        candidates: &'a dyn CandidateStore,
        scheduler: &'a dyn RegionScheduler,
    ) -> Self {
        Self {
            context,
            remote,
            candidates,
            scheduler,
        }
    }

    #[instrument(skip_all, fields(batch = %batch, region_id = region.map(|r| r.id)))]
    pub async fn process<C>(
        &self,
        compiler: &C,
        snapshot: &mut C::Snapshot,
        batch: &EntityBatch,
        region: Option<&Region>,
        summary: &mut RunSummary,
    ) -> Result<BatchOutcome>
    where
        C: ChangeCompiler + ?Sized,
    {
        debug!("Processing entities: {}", batch);

        let compiled = compiler.compile(snapshot, batch).await.map_err(|e| {
            error!(error = %e, "Change compiler failed");
            FatalError::from(e)
        })?;

        if compiled.changeset.is_empty() {
            info!("No changeset to apply");
        } else if let Err(failure) = self.upload_changeset(&compiled.changeset, summary).await {
            error!(%failure, "Changeset failed to apply");
            if let Some(region) = region {
                self.scheduler.mark_failed(region).await?;
                summary.region_failed = true;
            }
            self.mark_entities_failed(batch, summary).await?;
            return Ok(BatchOutcome::Failed(failure));
        }

        self.apply_redactions(&compiled.redactions).await?;
        self.mark_entities_succeeded(batch, summary).await?;
        Ok(BatchOutcome::Succeeded)
    }

    /// Open and upload each chunk in turn, stopping at the first failure
    async fn upload_changeset(
        &self,
        changeset: &Changeset,
        summary: &mut RunSummary,
    ) -> std::result::Result<(), BatchFailure> {
        let max_elements = self.context.limits.max_changeset_elements;
        let chunk_count = changeset.chunk_count(max_elements);

        for (index, chunk) in changeset.chunks(max_elements).enumerate() {
            let number = index + 1;

            if self.context.dry_run {
                match render_osm_change(0, chunk) {
                    Ok(doc) => debug!("Dry run, not uploading chunk {number}/{chunk_count}:\n{doc}"),
                    Err(e) => warn!(error = %e, "Could not render chunk {number}/{chunk_count}"),
                }
                continue;
            }

            let failure = |stage, reason: String| BatchFailure {
                stage,
                chunk: number,
                chunk_count,
                reason,
            };

            let changeset_id = match self.remote.open_changeset(&self.context.changeset_metadata).await {
                Ok(id) => id,
                Err(e) => {
                    summary.changeset_failures += 1;
                    return Err(failure(BatchStage::OpenChangeset, e.to_string()));
                }
            };

            if let Err(e) = self.remote.upload_changeset(changeset_id, chunk).await {
                summary.changeset_failures += 1;
                return Err(failure(BatchStage::UploadChangeset, e.to_string()));
            }

            info!(changeset_id, chunk = number, chunk_count, "Uploaded changeset");
            summary.changeset_success += 1;
        }

        Ok(())
    }

    async fn apply_redactions(&self, redactions: &[Redaction]) -> Result<()> {
        debug!("Creating redactions {}", redactions.len());

        for redaction in redactions {
            info!("Redaction for {}", redaction);
            if self.context.dry_run {
                continue;
            }

            let redaction_id = self.context.redaction_ids.for_mode(redaction.mode);
            self.remote
                .apply_redaction(&redaction.target, redaction_id)
                .await
                .map_err(|source| {
                    error!(target_entity = %redaction.target, error = %source, "Failed to redact element");
                    FatalError::RedactionFailed {
                        target: redaction.target,
                        source,
                    }
                })?;
        }
        Ok(())
    }

    async fn mark_entities_succeeded(&self, batch: &EntityBatch, summary: &mut RunSummary) -> Result<()> {
        debug!("Marking entities succeeded: {}", batch);
        for entity_type in EntityType::ALL {
            self.candidates
                .mark_processed(entity_type, batch.ids(entity_type))
                .await?;
        }
        summary.candidate_success += batch.len();
        Ok(())
    }

    async fn mark_entities_failed(&self, batch: &EntityBatch, summary: &mut RunSummary) -> Result<()> {
        error!("Marking entities as failed: {}", batch);
        for entity_type in EntityType::ALL {
            let ids = batch.ids(entity_type);
            if !ids.is_empty() {
                error!(entity_type = %entity_type, ids = ?ids, "Failed entities");
            }
            self.candidates.mark_failed(entity_type, ids).await?;
        }
        summary.candidate_failures += batch.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::models::{Candidate, EditAction, EditOperation, Element, EntityRef, RedactionIds};
    use crate::models::{CandidateStatus, RegionStatus};
    use crate::remote::ChangesetMetadata;
    use crate::source::{CompileError, CompiledChanges};
    use crate::test_helpers::{MemorySnapshot, MemoryTracker, ScriptedCompiler, ScriptedRemote};

    fn context(max_changeset_elements: usize, dry_run: bool) -> RunContext {
        RunContext {
            dry_run,
            ignore_regions: false,
            redaction_ids: RedactionIds::default(),
            limits: LimitsConfig {
                max_changeset_elements,
                ..LimitsConfig::default()
            },
            changeset_metadata: ChangesetMetadata::default(),
        }
    }

    fn delete_node(id: i64) -> EditOperation {
        EditOperation::new(
            EditAction::Delete,
            Element::Node {
                id,
                version: 1,
                lat: 10.1,
                lon: 20.1,
                tags: vec![],
            },
        )
    }

    fn changes(operations: usize, redactions: Vec<Redaction>) -> CompiledChanges {
        CompiledChanges::new(
            Changeset::new((1..=operations as i64).map(delete_node).collect()),
            redactions,
        )
    }

    fn setup() -> (MemoryTracker, Region, EntityBatch) {
        let tracker = MemoryTracker::new();
        let region = Region::new(1, 10.0, 20.0);
        tracker.add_region(region.clone());
        tracker.add_candidate(Candidate::new(EntityType::Node, 5, 10.1, 20.1));
        tracker.add_candidate(Candidate::new(EntityType::Way, 6, 10.1, 20.1));
        (tracker, region, EntityBatch::new(vec![5], vec![6], vec![]))
    }

    #[tokio::test]
    async fn test_chunks_upload_in_order() {
        let (tracker, region, batch) = setup();
        let remote = ScriptedRemote::new();
        let compiler = ScriptedCompiler::returning(changes(5, vec![]));
        let ctx = context(2, false);
        let processor = BatchProcessor::new(&ctx, &remote, &tracker, &tracker);
        let mut summary = RunSummary::new();

        let outcome = processor
            .process(&compiler, &mut MemorySnapshot { id: 1 }, &batch, Some(&region), &mut summary)
            .await
            .unwrap();

        assert!(outcome.is_success());
        let sizes: Vec<usize> = remote.uploads().iter().map(|(_, ops)| ops.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(remote.open_calls(), 3);
        assert_eq!(summary.changeset_success, 3);
        assert_eq!(summary.candidate_success, 2);
        assert_eq!(tracker.candidate_status(EntityType::Way, 6), Some(CandidateStatus::Processed));
    }

    #[tokio::test]
    async fn test_upload_failure_on_later_chunk_fails_whole_batch() {
        let (tracker, region, batch) = setup();
        let remote = ScriptedRemote::new().fail_upload_on(2);
        let redaction = Redaction::hidden(EntityRef::Node { id: 5, version: 2 });
        let compiler = ScriptedCompiler::returning(changes(5, vec![redaction]));
        let ctx = context(2, false);
        let processor = BatchProcessor::new(&ctx, &remote, &tracker, &tracker);
        let mut summary = RunSummary::new();

        let outcome = processor
            .process(&compiler, &mut MemorySnapshot { id: 1 }, &batch, Some(&region), &mut summary)
            .await
            .unwrap();

        match outcome {
            BatchOutcome::Failed(failure) => {
                assert_eq!(failure.stage, BatchStage::UploadChangeset);
                assert_eq!(failure.chunk, 2);
                assert_eq!(failure.chunk_count, 3);
            }
            BatchOutcome::Succeeded => panic!("expected failure"),
        }

        // Chunk 1 stays applied, chunk 3 is never attempted
        assert_eq!(remote.uploads().len(), 1);
        assert_eq!(remote.upload_calls(), 2);
        assert_eq!(remote.redaction_calls(), 0);

        assert_eq!(tracker.region_status(1), Some(RegionStatus::Failed));
        assert_eq!(tracker.candidate_status(EntityType::Node, 5), Some(CandidateStatus::Failed));
        assert_eq!(summary.changeset_success, 1);
        assert_eq!(summary.changeset_failures, 1);
        assert_eq!(summary.candidate_failures, 2);
        assert!(summary.region_failed);
    }

    #[tokio::test]
    async fn test_open_failure_counts_as_failed_changeset() {
        let (tracker, _region, batch) = setup();
        let remote = ScriptedRemote::new().fail_open_on(1);
        let compiler = ScriptedCompiler::returning(changes(1, vec![]));
        let ctx = context(500, false);
        let processor = BatchProcessor::new(&ctx, &remote, &tracker, &tracker);
        let mut summary = RunSummary::new();

        let outcome = processor
            .process(&compiler, &mut MemorySnapshot { id: 1 }, &batch, None, &mut summary)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            BatchOutcome::Failed(BatchFailure { stage: BatchStage::OpenChangeset, .. })
        ));
        assert_eq!(summary.changeset_failures, 1);
        assert!(!summary.region_failed);
        assert_eq!(remote.upload_calls(), 0);
    }

    #[tokio::test]
    async fn test_redactions_use_mode_ids_in_order() {
        let (tracker, region, batch) = setup();
        let remote = ScriptedRemote::new();
        let redactions = vec![
            Redaction::visible(EntityRef::Way { id: 6, version: 1 }),
            Redaction::hidden(EntityRef::Node { id: 5, version: 2 }),
        ];
        let compiler = ScriptedCompiler::returning(changes(0, redactions));
        let ctx = context(500, false);
        let processor = BatchProcessor::new(&ctx, &remote, &tracker, &tracker);
        let mut summary = RunSummary::new();

        processor
            .process(&compiler, &mut MemorySnapshot { id: 1 }, &batch, Some(&region), &mut summary)
            .await
            .unwrap();

        assert_eq!(
            remote.redactions(),
            vec![
                (EntityRef::Way { id: 6, version: 1 }, 2),
                (EntityRef::Node { id: 5, version: 2 }, 1),
            ]
        );
        assert_eq!(remote.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_redaction_failure_is_fatal() {
        let (tracker, region, batch) = setup();
        let remote = ScriptedRemote::new().fail_redaction_on(1);
        let redaction = Redaction::hidden(EntityRef::Node { id: 5, version: 2 });
        let compiler = ScriptedCompiler::returning(changes(1, vec![redaction]));
        let ctx = context(500, false);
        let processor = BatchProcessor::new(&ctx, &remote, &tracker, &tracker);
        let mut summary = RunSummary::new();

        let err = processor
            .process(&compiler, &mut MemorySnapshot { id: 1 }, &batch, Some(&region), &mut summary)
            .await
            .unwrap_err();

        assert!(matches!(err, FatalError::RedactionFailed { .. }));
        assert_eq!(summary.changeset_success, 1);
        assert_eq!(summary.candidate_success, 0);
        assert_eq!(
            tracker.candidate_status(EntityType::Node, 5),
            Some(CandidateStatus::Unprocessed)
        );
    }

    #[tokio::test]
    async fn test_compile_error_is_fatal() {
        let (tracker, region, batch) = setup();
        let remote = ScriptedRemote::new();
        let compiler = ScriptedCompiler::new(|_| Err(CompileError::new("way 6 has no nodes")));
        let ctx = context(500, false);
        let processor = BatchProcessor::new(&ctx, &remote, &tracker, &tracker);
        let mut summary = RunSummary::new();

        let err = processor
            .process(&compiler, &mut MemorySnapshot { id: 1 }, &batch, Some(&region), &mut summary)
            .await
            .unwrap_err();
        assert!(matches!(err, FatalError::Compile(_)));
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_remote_writes() {
        let (tracker, region, batch) = setup();
        let tracker = tracker.with_dry_run(true);
        let remote = ScriptedRemote::new();
        let redaction = Redaction::hidden(EntityRef::Node { id: 5, version: 2 });
        let compiler = ScriptedCompiler::returning(changes(3, vec![redaction]));
        let ctx = context(2, true);
        let processor = BatchProcessor::new(&ctx, &remote, &tracker, &tracker);
        let mut summary = RunSummary::new();

        let outcome = processor
            .process(&compiler, &mut MemorySnapshot { id: 1 }, &batch, Some(&region), &mut summary)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(remote.open_calls(), 0);
        assert_eq!(remote.redaction_calls(), 0);
        assert_eq!(summary.changeset_success, 0);
        assert_eq!(summary.candidate_success, 2);
        assert_eq!(
            tracker.candidate_status(EntityType::Node, 5),
            Some(CandidateStatus::Unprocessed)
        );
    }
}
