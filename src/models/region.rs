//! # Regions
//!
//! A region is a one-degree grid cell and the unit of work claimed by an
//! orchestrator instance. Regions are seeded externally; this crate only moves
//! them through `unprocessed -> processing -> complete | failed`.

use crate::geo::Area;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Degrees on each axis within which two regions are considered overlapping work
pub const DEFAULT_CONFLICT_RADIUS_DEGREES: f64 = 2.0;

/// Side length of a region cell in degrees
pub const DEFAULT_REGION_SIZE_DEGREES: f64 = 1.0;

/// Lifecycle status of a region in the tracker store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionStatus {
    Unprocessed,
    Processing,
    Complete,
    Failed,
}

impl RegionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionStatus::Unprocessed => "unprocessed",
            RegionStatus::Processing => "processing",
            RegionStatus::Complete => "complete",
            RegionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(RegionStatus::Unprocessed),
            "processing" => Ok(RegionStatus::Processing),
            "complete" => Ok(RegionStatus::Complete),
            "failed" => Ok(RegionStatus::Failed),
            other => Err(format!("unknown region status '{other}'")),
        }
    }
}

/// A claimed (or claimable) region. `lat`/`lon` is the south-west corner of
/// the cell as seeded in the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub status: RegionStatus,
}

impl Region {
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat,
            lon,
            status: RegionStatus::Unprocessed,
        }
    }

    /// The full bounding box of this region's cell.
    pub fn cell(&self, size_degrees: f64) -> Area {
        Area::new(self.lat, self.lat + size_degrees, self.lon, self.lon + size_degrees)
    }

    /// True when the two cells are strictly closer than `radius` degrees on
    /// both axes.
    pub fn conflicts_with(&self, other: &Region, radius: f64) -> bool {
        (self.lat - other.lat).abs() < radius && (self.lon - other.lon).abs() < radius
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region {} (lat {}, lon {}, {})",
            self.id, self.lat, self.lon, self.status
        )
    }
}

/// Pick the region a claim should take: the lowest-id `unprocessed` region
/// that does not conflict with any region currently `processing`.
///
/// This is the in-process statement of the rule the Postgres claim query
/// enforces under its table lock.
pub fn next_claimable(regions: &[Region], radius: f64) -> Option<&Region> {
    let processing: Vec<&Region> = regions
        .iter()
        .filter(|r| r.status == RegionStatus::Processing)
        .collect();

    regions
        .iter()
        .filter(|r| r.status == RegionStatus::Unprocessed)
        .filter(|r| !processing.iter().any(|p| p.conflicts_with(r, radius)))
        .min_by_key(|r| r.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: i64, lat: f64, lon: f64, status: RegionStatus) -> Region {
        Region {
            id,
            lat,
            lon,
            status,
        }
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [
            RegionStatus::Unprocessed,
            RegionStatus::Processing,
            RegionStatus::Complete,
            RegionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<RegionStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<RegionStatus>().is_err());
    }

    #[test]
    fn test_cell_spans_one_degree() {
        let area = Region::new(1, 10.0, 20.0).cell(DEFAULT_REGION_SIZE_DEGREES);
        assert_eq!(area, Area::new(10.0, 11.0, 20.0, 21.0));
    }

    #[test]
    fn test_conflict_requires_both_axes_within_radius() {
        let a = region(1, 10.0, 20.0, RegionStatus::Processing);
        assert!(a.conflicts_with(&region(2, 11.0, 21.0, RegionStatus::Unprocessed), 2.0));
        // Exactly two degrees apart is far enough
        assert!(!a.conflicts_with(&region(3, 12.0, 20.0, RegionStatus::Unprocessed), 2.0));
        // Close in latitude only
        assert!(!a.conflicts_with(&region(4, 10.0, 25.0, RegionStatus::Unprocessed), 2.0));
    }

    #[test]
    fn test_next_claimable_skips_neighbours_of_processing_regions() {
        let regions = vec![
            region(1, 10.0, 20.0, RegionStatus::Processing),
            region(2, 11.0, 20.0, RegionStatus::Unprocessed),
            region(3, 10.0, 21.0, RegionStatus::Unprocessed),
            region(4, 15.0, 20.0, RegionStatus::Unprocessed),
            region(5, 40.0, 40.0, RegionStatus::Unprocessed),
        ];

        let next = next_claimable(&regions, DEFAULT_CONFLICT_RADIUS_DEGREES).unwrap();
        assert_eq!(next.id, 4);
    }

    #[test]
    fn test_next_claimable_ignores_complete_and_failed_regions() {
        let regions = vec![
            region(1, 10.0, 20.0, RegionStatus::Failed),
            region(2, 10.0, 21.0, RegionStatus::Complete),
            region(3, 10.0, 22.0, RegionStatus::Unprocessed),
        ];

        // Failed and complete neighbours do not block the claim
        assert_eq!(next_claimable(&regions, 2.0).unwrap().id, 3);
    }

    #[test]
    fn test_next_claimable_returns_none_when_exhausted() {
        let regions = vec![
            region(1, 10.0, 20.0, RegionStatus::Processing),
            region(2, 10.5, 20.5, RegionStatus::Unprocessed),
        ];
        assert!(next_claimable(&regions, 2.0).is_none());
        assert!(next_claimable(&[], 2.0).is_none());
    }
}
