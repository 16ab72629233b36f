//! Read-only snapshot over the source database.

use super::SourceStore;
use crate::error::{FatalError, Result};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

/// An open `REPEATABLE READ, READ ONLY` transaction
pub struct SourceSnapshot {
    tx: Transaction<'static, Postgres>,
}

impl SourceSnapshot {
    /// Connection for queries that must see the snapshot's view
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[derive(Debug, Clone)]
pub struct PgSourceStore {
    pool: PgPool,
}

impl PgSourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceStore for PgSourceStore {
    type Snapshot = SourceSnapshot;

    #[instrument(skip(self))]
    async fn begin_snapshot(&self) -> Result<SourceSnapshot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FatalError::database("begin_source_snapshot", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| FatalError::database("begin_source_snapshot", e))?;

        debug!("Opened source snapshot");
        Ok(SourceSnapshot { tx })
    }

    async fn existing_redaction_ids(
        &self,
        snapshot: &mut SourceSnapshot,
        ids: &[i64],
    ) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM redactions WHERE id = ANY($1) ORDER BY id")
            .bind(ids)
            .fetch_all(snapshot.connection())
            .await
            .map_err(|e| FatalError::database("lookup_redactions", e))
    }

    async fn release(&self, snapshot: SourceSnapshot) -> Result<()> {
        snapshot
            .tx
            .commit()
            .await
            .map_err(|e| FatalError::database("release_source_snapshot", e))?;
        debug!("Released source snapshot");
        Ok(())
    }
}
