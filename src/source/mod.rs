//! # Source Dataset
//!
//! The map database the change compiler reads. The bot never writes to it:
//! it opens one read-only snapshot at run start, hands it to every compile
//! call, and releases it on every exit path.
//!
//! [`SourceStore`] and [`ChangeCompiler`] agree on a snapshot type so that a
//! compiler can only ever see the consistent view the store handed out.

pub mod pg_source;

use crate::error::Result;
use crate::models::{Changeset, EntityBatch, Redaction};
use async_trait::async_trait;
use thiserror::Error;

pub use pg_source::{PgSourceStore, SourceSnapshot};

/// The change compiler could not turn a batch into edits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything a compile call produces for one entity batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledChanges {
    pub changeset: Changeset,
    /// Applied in this order, after the changeset is fully uploaded
    pub redactions: Vec<Redaction>,
}

impl CompiledChanges {
    pub fn new(changeset: Changeset, redactions: Vec<Redaction>) -> Self {
        Self {
            changeset,
            redactions,
        }
    }
}

/// Hands out and releases consistent read views of the source dataset
#[async_trait]
pub trait SourceStore: Send + Sync {
    type Snapshot: Send;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot>;

    /// Which of `ids` exist in the `redactions` table
    async fn existing_redaction_ids(
        &self,
        snapshot: &mut Self::Snapshot,
        ids: &[i64],
    ) -> Result<Vec<i64>>;

    /// Commit-if-read-only. Consumes the snapshot.
    async fn release(&self, snapshot: Self::Snapshot) -> Result<()>;
}

/// Converts candidate ids into edits and redaction directives
#[async_trait]
pub trait ChangeCompiler: Send + Sync {
    type Snapshot: Send;

    /// Checked once per run, before any region is claimed
    fn ensure_ready(&self) -> std::result::Result<(), CompileError> {
        Ok(())
    }

    async fn compile(
        &self,
        snapshot: &mut Self::Snapshot,
        batch: &EntityBatch,
    ) -> std::result::Result<CompiledChanges, CompileError>;
}

/// Stand-in for builds that do not link a change compiler. It never reports
/// ready, so a run stops before claiming a region or touching the API.
#[derive(Debug, Default)]
pub struct UnlinkedCompiler;

#[async_trait]
impl ChangeCompiler for UnlinkedCompiler {
    type Snapshot = SourceSnapshot;

    fn ensure_ready(&self) -> std::result::Result<(), CompileError> {
        Err(CompileError::new("no change compiler linked into this build"))
    }

    async fn compile(
        &self,
        _snapshot: &mut SourceSnapshot,
        batch: &EntityBatch,
    ) -> std::result::Result<CompiledChanges, CompileError> {
        Err(CompileError::new(format!(
            "no change compiler linked into this build (batch {batch})"
        )))
    }
}
