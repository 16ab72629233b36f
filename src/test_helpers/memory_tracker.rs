//! In-memory tracker store for tests that do not need Postgres.
//!
//! One mutex guards both tables, which gives claims the same
//! all-or-nothing behaviour the table lock gives the real store.

use crate::error::Result;
use crate::geo::Area;
use crate::models::{next_claimable, Candidate, CandidateStatus, EntityType, Region, RegionStatus};
use crate::models::region::DEFAULT_CONFLICT_RADIUS_DEGREES;
use crate::tracker::{CandidateStore, RegionScheduler};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryTrackerState {
    regions: Vec<Region>,
    candidates: Vec<Candidate>,
}

#[derive(Debug)]
pub struct MemoryTracker {
    state: Mutex<MemoryTrackerState>,
    conflict_radius: f64,
    dry_run: bool,
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryTrackerState::default()),
            conflict_radius: DEFAULT_CONFLICT_RADIUS_DEGREES,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_conflict_radius(mut self, radius: f64) -> Self {
        self.conflict_radius = radius;
        self
    }

    pub fn add_region(&self, region: Region) {
        self.state.lock().unwrap().regions.push(region);
    }

    pub fn add_candidate(&self, candidate: Candidate) {
        self.state.lock().unwrap().candidates.push(candidate);
    }

    pub fn set_region_status(&self, id: i64, status: RegionStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(region) = state.regions.iter_mut().find(|r| r.id == id) {
            region.status = status;
        }
    }

    pub fn region_status(&self, id: i64) -> Option<RegionStatus> {
        let state = self.state.lock().unwrap();
        state.regions.iter().find(|r| r.id == id).map(|r| r.status)
    }

    pub fn candidate_status(&self, entity_type: EntityType, osm_id: i64) -> Option<CandidateStatus> {
        let state = self.state.lock().unwrap();
        state
            .candidates
            .iter()
            .find(|c| c.entity_type == entity_type && c.osm_id == osm_id)
            .map(|c| c.status)
    }

    pub fn regions(&self) -> Vec<Region> {
        self.state.lock().unwrap().regions.clone()
    }

    fn unprocessed_ids<F>(&self, entity_type: EntityType, keep: F) -> Vec<i64>
    where
        F: Fn(&Candidate) -> bool,
    {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<i64> = state
            .candidates
            .iter()
            .filter(|c| c.entity_type == entity_type && c.status == CandidateStatus::Unprocessed)
            .filter(|c| keep(c))
            .map(|c| c.osm_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn set_candidate_status(&self, entity_type: EntityType, ids: &[i64], status: CandidateStatus) {
        if self.dry_run || ids.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        for candidate in state
            .candidates
            .iter_mut()
            .filter(|c| c.entity_type == entity_type && ids.contains(&c.osm_id))
        {
            candidate.status = status;
        }
    }
}

#[async_trait]
impl RegionScheduler for MemoryTracker {
    async fn claim_next(&self) -> Result<Option<Region>> {
        let mut state = self.state.lock().unwrap();
        let Some(id) = next_claimable(&state.regions, self.conflict_radius).map(|r| r.id) else {
            return Ok(None);
        };

        let dry_run = self.dry_run;
        let region = state
            .regions
            .iter_mut()
            .find(|r| r.id == id)
            .map(|r| {
                if !dry_run {
                    r.status = RegionStatus::Processing;
                }
                r.clone()
            });
        Ok(region)
    }

    async fn mark_complete(&self, region: &Region) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        if let Some(r) = state.regions.iter_mut().find(|r| r.id == region.id) {
            if r.status != RegionStatus::Failed {
                r.status = RegionStatus::Complete;
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, region: &Region) -> Result<()> {
        if !self.dry_run {
            self.set_region_status(region.id, RegionStatus::Failed);
        }
        Ok(())
    }
}

#[async_trait]
impl CandidateStore for MemoryTracker {
    async fn list_unprocessed(&self, entity_type: EntityType) -> Result<Vec<i64>> {
        Ok(self.unprocessed_ids(entity_type, |_| true))
    }

    async fn list_unprocessed_in_area(
        &self,
        entity_type: EntityType,
        area: &Area,
    ) -> Result<Vec<i64>> {
        Ok(self.unprocessed_ids(entity_type, |c| area.contains(c.lat, c.lon)))
    }

    async fn mark_processed(&self, entity_type: EntityType, ids: &[i64]) -> Result<()> {
        self.set_candidate_status(entity_type, ids, CandidateStatus::Processed);
        Ok(())
    }

    async fn mark_failed(&self, entity_type: EntityType, ids: &[i64]) -> Result<()> {
        self.set_candidate_status(entity_type, ids, CandidateStatus::Failed);
        Ok(())
    }
}
