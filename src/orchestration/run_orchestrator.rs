//! # Run Orchestrator
//!
//! One invocation of the bot. It opens a snapshot of the source dataset,
//! checks the compiler is ready and the redaction ids exist, then either
//! works through one claimed region or, in ignore-regions mode, processes a
//! single capped batch of candidates.
//! The snapshot is released on every exit path.
//!
//! A claimed region is expanded into its grid cell and walked as a LIFO work
//! list of areas. Oversized areas are split until each is small enough for a
//! single request. A failed batch marks the region failed but the remaining
//! areas are still attempted; any fatal error marks the region failed and ends
//! the run.

use super::batch_processor::{BatchOutcome, BatchProcessor};
use super::candidate_source::{AreaCandidates, CandidateSource, TrackerCandidateSource};
use super::summary::RunSummary;
use crate::config::LimitsConfig;
use crate::error::{FatalError, Result};
use crate::geo::AreaWorkList;
use crate::models::{EntityBatch, EntityType, RedactionIds, Region};
use crate::remote::{ChangesetMetadata, RemoteEditService};
use crate::source::{ChangeCompiler, SourceStore};
use crate::tracker::{CandidateStore, RegionScheduler};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Settings fixed for the life of a run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Compute and log everything, write nothing
    pub dry_run: bool,
    pub ignore_regions: bool,
    pub redaction_ids: RedactionIds,
    pub limits: LimitsConfig,
    pub changeset_metadata: ChangesetMetadata,
}

pub struct RunOrchestrator<S, C> {
    context: RunContext,
    source: S,
    compiler: C,
    scheduler: Arc<dyn RegionScheduler>,
    candidates: Arc<dyn CandidateStore>,
    remote: Arc<dyn RemoteEditService>,
    candidate_source: Arc<dyn CandidateSource>,
}

impl<S, C> RunOrchestrator<S, C>
where
    S: SourceStore,
    C: ChangeCompiler<Snapshot = S::Snapshot>,
{
    /// Candidates come from the tracker unless [`Self::with_candidate_source`] says otherwise
    pub fn new(
        context: RunContext,
        source: S,
        compiler: C,
        scheduler: Arc<dyn RegionScheduler>,
        candidates: Arc<dyn CandidateStore>,
        remote: Arc<dyn RemoteEditService>,
    ) -> Self {
        let candidate_source = Arc::new(TrackerCandidateSource::new(candidates.clone()));
        Self {
            context,
            source,
            compiler,
            scheduler,
            candidates,
            remote,
            candidate_source,
        }
    }

    pub fn with_candidate_source(mut self, candidate_source: Arc<dyn CandidateSource>) -> Self {
        self.candidate_source = candidate_source;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Run to completion, accumulating into `summary`. The summary is
    /// meaningful even when this returns an error.
    pub async fn run(&self, summary: &mut RunSummary) -> Result<()> {
        let mut snapshot = self.source.begin_snapshot().await?;

        let result = self.run_with_snapshot(&mut snapshot, summary).await;
        let released = self.source.release(snapshot).await;

        match (result, released) {
            (Err(e), Err(release_err)) => {
                error!(error = %release_err, "Failed to release source snapshot after fatal error");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), released) => released,
        }
    }

    async fn run_with_snapshot(
        &self,
        snapshot: &mut S::Snapshot,
        summary: &mut RunSummary,
    ) -> Result<()> {
        if let Err(e) = self.compiler.ensure_ready() {
            error!(error = %e, "Change compiler not ready, nothing claimed");
            return Err(e.into());
        }
        self.validate_redaction_ids(snapshot).await?;

        if self.context.ignore_regions {
            self.run_ignoring_regions(snapshot, summary).await
        } else {
            self.run_next_region(snapshot, summary).await
        }
    }

    async fn validate_redaction_ids(&self, snapshot: &mut S::Snapshot) -> Result<()> {
        if self.context.dry_run {
            debug!("Dry run, skipping redaction id check");
            return Ok(());
        }

        let wanted = self.context.redaction_ids.distinct();
        let found = self
            .source
            .existing_redaction_ids(snapshot, &wanted)
            .await?;

        if found.len() != wanted.len() {
            let ids = self.context.redaction_ids;
            error!(hidden = ids.hidden, visible = ids.visible, found = ?found, "Invalid redaction ids");
            return Err(FatalError::InvalidRedactionIds {
                hidden: ids.hidden,
                visible: ids.visible,
            });
        }
        Ok(())
    }

    fn processor(&self) -> BatchProcessor<'_> {
        BatchProcessor::new(
            &self.context,
            self.remote.as_ref(),
            self.candidates.as_ref(),
            self.scheduler.as_ref(),
        )
    }

    /// One capped batch straight from the candidate table, no region
    async fn run_ignoring_regions(
        &self,
        snapshot: &mut S::Snapshot,
        summary: &mut RunSummary,
    ) -> Result<()> {
        info!("Ignoring the regions");
        let limit = self.context.limits.ignore_regions_batch_limit;

        let mut batch = EntityBatch::default();
        for entity_type in EntityType::ALL {
            let mut ids = self.candidates.list_unprocessed(entity_type).await?;
            ids.truncate(limit);
            *batch.ids_mut(entity_type) = ids;
        }

        if batch.is_empty() {
            warn!("No entities to process");
            return Ok(());
        }
        summary.work_found = true;

        let outcome = self
            .processor()
            .process(&self.compiler, snapshot, &batch, None, summary)
            .await?;
        if let BatchOutcome::Failed(failure) = outcome {
            warn!(%failure, "Batch failed");
        }
        Ok(())
    }

    async fn run_next_region(
        &self,
        snapshot: &mut S::Snapshot,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let Some(region) = self.scheduler.claim_next().await? else {
            warn!("No region to process");
            return Ok(());
        };
        summary.work_found = true;
        info!("Processing {}", region);

        match self.process_region(&region, snapshot, summary).await {
            Ok(()) => self.scheduler.mark_complete(&region).await,
            Err(e) => {
                error!(error = %e, region_id = region.id, "Region processing aborted");
                summary.region_failed = true;
                if let Err(mark_err) = self.scheduler.mark_failed(&region).await {
                    error!(error = %mark_err, region_id = region.id, "Could not mark region failed");
                }
                Err(e)
            }
        }
    }

    #[instrument(skip_all, fields(region_id = region.id))]
    async fn process_region(
        &self,
        region: &Region,
        snapshot: &mut S::Snapshot,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let limits = &self.context.limits;
        let mut areas = AreaWorkList::new(
            region.cell(limits.region_size_degrees),
            limits.splitter(),
            limits.max_request_area,
        );

        while let Some(area) = areas.next_area()? {
            info!("Processing {}", area);

            let batch = match self.candidate_source.candidates_for(&area).await? {
                AreaCandidates::Split => {
                    areas.split_and_push(area)?;
                    continue;
                }
                AreaCandidates::Batch(batch) => batch,
            };

            if batch.is_empty() {
                debug!("No candidates in {}", area);
                continue;
            }

            let outcome = self
                .processor()
                .process(&self.compiler, snapshot, &batch, Some(region), summary)
                .await?;
            if let BatchOutcome::Failed(failure) = outcome {
                warn!(%failure, area = %area, "Batch failed, continuing with remaining areas");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, RegionStatus};
    use crate::source::CompiledChanges;
    use crate::test_helpers::{MemorySource, MemoryTracker, ScriptedCompiler, ScriptedRemote};

    fn orchestrator(
        context: RunContext,
        source: MemorySource,
        tracker: Arc<MemoryTracker>,
        remote: Arc<ScriptedRemote>,
    ) -> RunOrchestrator<MemorySource, ScriptedCompiler> {
        RunOrchestrator::new(
            context,
            source,
            ScriptedCompiler::returning(CompiledChanges::default()),
            tracker.clone(),
            tracker,
            remote,
        )
    }

    #[test]
    fn test_default_context() {
        let context = RunContext::default();
        assert!(!context.dry_run);
        assert!(!context.ignore_regions);
        assert_eq!(context.redaction_ids, RedactionIds::default());
        assert_eq!(
            context.limits.conflict_radius_degrees,
            LimitsConfig::default().conflict_radius_degrees
        );
    }

    #[tokio::test]
    async fn test_unready_compiler_aborts_before_claiming() {
        let tracker = Arc::new(MemoryTracker::new());
        tracker.add_region(Region::new(1, 10.0, 20.0));
        let run = RunOrchestrator::new(
            RunContext {
                ignore_regions: true,
                ..RunContext::default()
            },
            MemorySource::default(),
            ScriptedCompiler::returning(CompiledChanges::default()).unready(),
            tracker.clone(),
            tracker.clone(),
            Arc::new(ScriptedRemote::new()),
        );

        let mut summary = RunSummary::new();
        let err = run.run(&mut summary).await.unwrap_err();

        assert!(matches!(err, FatalError::Compile(_)));
        assert_eq!(tracker.region_status(1), Some(RegionStatus::Unprocessed));
        assert_eq!(run.source.released(), vec![1]);
    }

    #[tokio::test]
    async fn test_missing_redaction_id_aborts_before_claiming() {
        let tracker = Arc::new(MemoryTracker::new());
        tracker.add_region(Region::new(1, 10.0, 20.0));
        let remote = Arc::new(ScriptedRemote::new());
        let run = orchestrator(
            RunContext::default(),
            MemorySource::new(vec![1]),
            tracker.clone(),
            remote,
        );

        let mut summary = RunSummary::new();
        let err = run.run(&mut summary).await.unwrap_err();

        assert!(matches!(err, FatalError::InvalidRedactionIds { hidden: 1, visible: 2 }));
        assert_eq!(tracker.region_status(1), Some(RegionStatus::Unprocessed));
        assert!(!summary.work_found);
    }

    #[tokio::test]
    async fn test_snapshot_released_on_success_and_failure() {
        let tracker = Arc::new(MemoryTracker::new());
        let source = MemorySource::default();
        let run = orchestrator(
            RunContext::default(),
            source,
            tracker,
            Arc::new(ScriptedRemote::new()),
        );
        let mut summary = RunSummary::new();
        run.run(&mut summary).await.unwrap();
        assert_eq!(run.source.released(), vec![1]);

        let failing = orchestrator(
            RunContext::default(),
            MemorySource::new(vec![]),
            Arc::new(MemoryTracker::new()),
            Arc::new(ScriptedRemote::new()),
        );
        assert!(failing.run(&mut RunSummary::new()).await.is_err());
        assert_eq!(failing.source.released(), vec![1]);
    }

    #[tokio::test]
    async fn test_no_region_is_not_an_error() {
        let tracker = Arc::new(MemoryTracker::new());
        let run = orchestrator(
            RunContext::default(),
            MemorySource::default(),
            tracker,
            Arc::new(ScriptedRemote::new()),
        );

        let mut summary = RunSummary::new();
        run.run(&mut summary).await.unwrap();
        assert!(!summary.work_found);
        assert_eq!(summary.exit_status(false), 1);
    }

    #[tokio::test]
    async fn test_empty_areas_are_not_compiled() {
        let tracker = Arc::new(MemoryTracker::new());
        tracker.add_region(Region::new(1, 10.0, 20.0));
        tracker.add_candidate(Candidate::new(EntityType::Node, 5, 10.1, 20.1));
        tracker.add_candidate(Candidate::new(EntityType::Node, 8, 10.9, 20.9));
        let run = orchestrator(
            RunContext::default(),
            MemorySource::default(),
            tracker.clone(),
            Arc::new(ScriptedRemote::new()),
        );

        let mut summary = RunSummary::new();
        run.run(&mut summary).await.unwrap();

        let calls = run.compiler.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(snapshot, _)| *snapshot == 1));
        assert_eq!(summary.candidate_success, 2);
        assert_eq!(tracker.region_status(1), Some(RegionStatus::Complete));
    }
}
