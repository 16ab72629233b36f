//! LIFO decomposition of a region into request-sized areas.

use super::area::{Area, AreaSplitter, SplitError, DEFAULT_MAX_REQUEST_AREA};
use tracing::debug;

/// Pending areas for one region. Oversized areas are split in place and both
/// halves pushed back, so traversal is depth-first: the halves of the most
/// recently split area are always drained before older siblings.
#[derive(Debug, Clone)]
pub struct AreaWorkList {
    pending: Vec<Area>,
    splitter: AreaSplitter,
    max_request_area: f64,
}

impl AreaWorkList {
    pub fn new(seed: Area, splitter: AreaSplitter, max_request_area: f64) -> Self {
        Self {
            pending: vec![seed],
            splitter,
            max_request_area,
        }
    }

    pub fn with_defaults(seed: Area) -> Self {
        Self::new(seed, AreaSplitter::default(), DEFAULT_MAX_REQUEST_AREA)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pop until an area small enough to request turns up, splitting anything
    /// larger on the way. `Ok(None)` once the list is drained.
    pub fn next_area(&mut self) -> Result<Option<Area>, SplitError> {
        while let Some(area) = self.pending.pop() {
            debug!(remaining = self.pending.len() + 1, "Areas remaining");
            if area.size() > self.max_request_area {
                self.split_and_push(area)?;
                continue;
            }
            return Ok(Some(area));
        }
        Ok(None)
    }

    /// Split an area that turned out to be too big after all (for example
    /// because the remote refused it) and push both halves.
    pub fn split_and_push(&mut self, area: Area) -> Result<(), SplitError> {
        let (first, second) = self.splitter.split(&area)?;
        self.pending.push(first);
        self.pending.push(second);
        Ok(())
    }
}
