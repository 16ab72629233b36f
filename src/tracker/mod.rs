//! # Tracker Store
//!
//! The shared Postgres database every orchestrator instance coordinates
//! through. It holds two tables:
//!
//! - `regions (id, lat, lon, status)`: grid cells claimed one at a time
//! - `candidates (type, osm_id, lat, lon, status)`: entities awaiting processing
//!
//! Writes are kept to single short statements so the region-table lock is
//! only ever held for the claim decision itself. In dry-run mode every write
//! is skipped.

pub mod candidate_store;
pub mod region_scheduler;

use crate::error::Result;
use crate::geo::Area;
use crate::models::{EntityType, Region};
use async_trait::async_trait;

pub use candidate_store::PgCandidateStore;
pub use region_scheduler::PgRegionScheduler;

/// Claims regions under the cross-instance conflict-avoidance rule
#[async_trait]
pub trait RegionScheduler: Send + Sync {
    /// Atomically claim the lowest-id unprocessed region that is not within
    /// the conflict radius of any region being processed. `None` means
    /// nothing is eligible right now.
    async fn claim_next(&self) -> Result<Option<Region>>;

    /// Mark the region complete unless it has already failed
    async fn mark_complete(&self, region: &Region) -> Result<()>;

    async fn mark_failed(&self, region: &Region) -> Result<()>;
}

/// Reads and resolves candidate entities
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// All unprocessed ids of a type, ascending
    async fn list_unprocessed(&self, entity_type: EntityType) -> Result<Vec<i64>>;

    /// Unprocessed ids of a type located in `[minlat,maxlat) x [minlon,maxlon)`
    async fn list_unprocessed_in_area(&self, entity_type: EntityType, area: &Area)
        -> Result<Vec<i64>>;

    async fn mark_processed(&self, entity_type: EntityType, ids: &[i64]) -> Result<()>;

    async fn mark_failed(&self, entity_type: EntityType, ids: &[i64]) -> Result<()>;
}
