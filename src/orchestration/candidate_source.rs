//! # Candidate Sources
//!
//! Two ways to find the entities to process inside an area:
//!
//! - [`TrackerCandidateSource`] asks the tracker's candidate table directly.
//! - [`MapCandidateSource`] reads live map data for the area and keeps the
//!   ids the tracker still lists as unprocessed. The API refuses oversized
//!   reads with `400` and sometimes crashes with `500`; both mean the area
//!   should be split and retried as two halves.

use crate::error::{FatalError, Result};
use crate::geo::Area;
use crate::models::{EntityBatch, EntityType};
use crate::remote::{parse_map_entities, RemoteEditService, THROTTLED_STATUS};
use crate::tracker::CandidateStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// What a source found for one area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaCandidates {
    Batch(EntityBatch),
    /// The area cannot be answered whole; split it and try the halves
    Split,
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn candidates_for(&self, area: &Area) -> Result<AreaCandidates>;
}

pub struct TrackerCandidateSource {
    store: Arc<dyn CandidateStore>,
}

impl TrackerCandidateSource {
    pub fn new(store: Arc<dyn CandidateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CandidateSource for TrackerCandidateSource {
    async fn candidates_for(&self, area: &Area) -> Result<AreaCandidates> {
        let mut batch = EntityBatch::default();
        for entity_type in EntityType::ALL {
            *batch.ids_mut(entity_type) = self
                .store
                .list_unprocessed_in_area(entity_type, area)
                .await?;
        }
        Ok(AreaCandidates::Batch(batch))
    }
}

pub struct MapCandidateSource {
    remote: Arc<dyn RemoteEditService>,
    store: Arc<dyn CandidateStore>,
}

impl MapCandidateSource {
    pub fn new(remote: Arc<dyn RemoteEditService>, store: Arc<dyn CandidateStore>) -> Self {
        Self { remote, store }
    }

    /// Keep the map's ids that are still unprocessed candidates, in map order
    async fn filter_to_candidates(&self, received: EntityBatch) -> Result<EntityBatch> {
        let mut kept = EntityBatch::default();
        for entity_type in EntityType::ALL {
            let candidates: HashSet<i64> = self
                .store
                .list_unprocessed(entity_type)
                .await?
                .into_iter()
                .collect();

            let mut seen = HashSet::new();
            *kept.ids_mut(entity_type) = received
                .ids(entity_type)
                .iter()
                .copied()
                .filter(|id| candidates.contains(id) && seen.insert(*id))
                .collect();
        }

        debug!(received = %received, kept = %kept, "Filtered map entities to candidates");
        Ok(kept)
    }
}

#[async_trait]
impl CandidateSource for MapCandidateSource {
    #[instrument(skip(self), fields(area = %area))]
    async fn candidates_for(&self, area: &Area) -> Result<AreaCandidates> {
        let response = self.remote.fetch_map(area).await?;

        match response.status {
            200 => {
                let received = parse_map_entities(&response.body).map_err(|message| {
                    error!(%message, "Could not parse map response");
                    FatalError::MapParse {
                        area: *area,
                        message,
                    }
                })?;
                Ok(AreaCandidates::Batch(self.filter_to_candidates(received).await?))
            }
            400 => {
                debug!("Too many entities, splitting");
                Ok(AreaCandidates::Split)
            }
            500 => {
                debug!("Server error on map read, splitting");
                Ok(AreaCandidates::Split)
            }
            status => {
                if status == THROTTLED_STATUS {
                    error!("Throttled response escaped the retry layer");
                } else {
                    error!(status, body = %response.body, "Unhandled map response");
                }
                Err(FatalError::UnexpectedMapResponse {
                    area: *area,
                    status,
                    body: response.body,
                })
            }
        }
    }
}
