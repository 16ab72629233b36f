//! Run-lifetime counters and the exit status derived from them.

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Chunks opened and uploaded successfully
    pub changeset_success: usize,
    /// Chunks whose open or upload failed
    pub changeset_failures: usize,
    pub candidate_success: usize,
    pub candidate_failures: usize,
    pub region_failed: bool,
    /// A region was claimed, or ignore-regions mode found candidates
    pub work_found: bool,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_failures(&self) -> bool {
        self.changeset_failures > 0 || self.candidate_failures > 0 || self.region_failed
    }

    /// `0` only for a run that took action, found work, and hit no failures
    pub fn exit_status(&self, dry_run: bool) -> u8 {
        if dry_run || !self.work_found || self.has_failures() {
            1
        } else {
            0
        }
    }

    pub fn log(&self) {
        info!("Summary");
        info!("{} successful changesets", self.changeset_success);
        info!("{} successful candidates", self.candidate_success);
        info!("{} failed changesets", self.changeset_failures);
        info!("{} failed candidates", self.candidate_failures);
        if self.region_failed {
            info!("region failed");
        }
    }
}
