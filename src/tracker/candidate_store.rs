//! Candidate table access.

use super::CandidateStore;
use crate::error::{FatalError, Result};
use crate::geo::Area;
use crate::models::{CandidateStatus, EntityType};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

pub struct PgCandidateStore {
    pool: PgPool,
    dry_run: bool,
}

impl PgCandidateStore {
    pub fn new(pool: PgPool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    async fn set_status(
        &self,
        entity_type: EntityType,
        ids: &[i64],
        status: CandidateStatus,
    ) -> Result<()> {
        if ids.is_empty() || self.dry_run {
            return Ok(());
        }

        let result = sqlx::query(
            "UPDATE candidates SET status = $1 WHERE type = $2 AND osm_id = ANY($3)",
        )
        .bind(status.as_str())
        .bind(entity_type.as_str())
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(|e| FatalError::database("update_candidate_status", e))?;

        debug!(
            entity_type = %entity_type,
            status = %status,
            requested = ids.len(),
            updated = result.rows_affected(),
            "Updated candidate status"
        );
        Ok(())
    }
}

#[async_trait]
impl CandidateStore for PgCandidateStore {
    #[instrument(skip(self))]
    async fn list_unprocessed(&self, entity_type: EntityType) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT osm_id FROM candidates
             WHERE type = $1 AND status = 'unprocessed'
             ORDER BY osm_id",
        )
        .bind(entity_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FatalError::database("list_unprocessed_candidates", e))
    }

    #[instrument(skip(self), fields(area = %area))]
    async fn list_unprocessed_in_area(
        &self,
        entity_type: EntityType,
        area: &Area,
    ) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT osm_id FROM candidates
             WHERE type = $1 AND status = 'unprocessed'
               AND lat >= $2 AND lat < $3
               AND lon >= $4 AND lon < $5
             ORDER BY osm_id",
        )
        .bind(entity_type.as_str())
        .bind(area.minlat)
        .bind(area.maxlat)
        .bind(area.minlon)
        .bind(area.maxlon)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FatalError::database("list_unprocessed_candidates_in_area", e))
    }

    async fn mark_processed(&self, entity_type: EntityType, ids: &[i64]) -> Result<()> {
        self.set_status(entity_type, ids, CandidateStatus::Processed)
            .await
    }

    async fn mark_failed(&self, entity_type: EntityType, ids: &[i64]) -> Result<()> {
        self.set_status(entity_type, ids, CandidateStatus::Failed)
            .await
    }
}
