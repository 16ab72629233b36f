//! Bounding boxes and bisection.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest area (square degrees) requested in one go
pub const DEFAULT_MAX_REQUEST_AREA: f64 = 0.25 / 32.0;

/// Below this an area is not split any further (roughly 10cm at the equator)
pub const DEFAULT_TOO_SMALL_TO_SPLIT: f64 = 0.000_001;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplitError {
    #[error("area too small to split: {area} (size {size} below {threshold})")]
    TooSmall {
        area: Area,
        size: f64,
        threshold: f64,
    },
}

/// A transient bounding box. Queries treat it as half-open:
/// `[minlat, maxlat) x [minlon, maxlon)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub minlat: f64,
    pub maxlat: f64,
    pub minlon: f64,
    pub maxlon: f64,
}

impl Area {
    pub fn new(minlat: f64, maxlat: f64, minlon: f64, maxlon: f64) -> Self {
        Self {
            minlat,
            maxlat,
            minlon,
            maxlon,
        }
    }

    pub fn lat_extent(&self) -> f64 {
        self.maxlat - self.minlat
    }

    pub fn lon_extent(&self) -> f64 {
        self.maxlon - self.minlon
    }

    /// Product of the two extents, in square degrees.
    pub fn size(&self) -> f64 {
        self.lat_extent() * self.lon_extent()
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.minlat && lat < self.maxlat && lon >= self.minlon && lon < self.maxlon
    }

    /// `minlon,minlat,maxlon,maxlat`, the order the map API expects.
    pub fn bbox_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.minlon, self.minlat, self.maxlon, self.maxlat
        )
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[lat {}..{}, lon {}..{}]",
            self.minlat, self.maxlat, self.minlon, self.maxlon
        )
    }
}

/// Halves areas along their longer axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaSplitter {
    too_small_to_split: f64,
}

impl Default for AreaSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_TOO_SMALL_TO_SPLIT)
    }
}

impl AreaSplitter {
    pub fn new(too_small_to_split: f64) -> Self {
        Self { too_small_to_split }
    }

    pub fn threshold(&self) -> f64 {
        self.too_small_to_split
    }

    /// Bisect `area` across its longer extent. Latitude wins only when it is
    /// strictly longer; the other extent is shared by both halves.
    pub fn split(&self, area: &Area) -> Result<(Area, Area), SplitError> {
        let size = area.size();
        if size < self.too_small_to_split {
            return Err(SplitError::TooSmall {
                area: *area,
                size,
                threshold: self.too_small_to_split,
            });
        }

        let mut first = *area;
        let mut second = *area;
        let lat_range = area.lat_extent();
        let lon_range = area.lon_extent();

        if lat_range > lon_range {
            let mid = area.minlat + lat_range / 2.0;
            first.maxlat = mid;
            second.minlat = mid;
        } else {
            let mid = area.minlon + lon_range / 2.0;
            first.maxlon = mid;
            second.minlon = mid;
        }

        Ok((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_splits_on_longitude() {
        let (west, east) = AreaSplitter::default()
            .split(&Area::new(10.0, 11.0, 20.0, 21.0))
            .unwrap();

        assert_eq!(west, Area::new(10.0, 11.0, 20.0, 20.5));
        assert_eq!(east, Area::new(10.0, 11.0, 20.5, 21.0));
    }

    #[test]
    fn test_tall_area_splits_on_latitude() {
        let (south, north) = AreaSplitter::default()
            .split(&Area::new(0.0, 2.0, 0.0, 1.0))
            .unwrap();

        assert_eq!(south, Area::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(north, Area::new(1.0, 2.0, 0.0, 1.0));
    }

    #[test]
    fn test_tiny_area_refuses_to_split() {
        let tiny = Area::new(0.0, 0.0005, 0.0, 0.0005);
        let err = AreaSplitter::default().split(&tiny).unwrap_err();

        match err {
            SplitError::TooSmall { area, threshold, .. } => {
                assert_eq!(area, tiny);
                assert_eq!(threshold, DEFAULT_TOO_SMALL_TO_SPLIT);
            }
        }
    }

    #[test]
    fn test_contains_is_half_open() {
        let area = Area::new(10.0, 11.0, 20.0, 21.0);
        assert!(area.contains(10.0, 20.0));
        assert!(area.contains(10.1, 20.1));
        assert!(!area.contains(11.0, 20.5));
        assert!(!area.contains(10.5, 21.0));
    }

    #[test]
    fn test_bbox_param_orders_lon_first() {
        let area = Area::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(area.bbox_param(), "3,1,4,2");
    }
}
