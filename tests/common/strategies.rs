use proptest::prelude::*;
use redaction_bot::geo::Area;
use redaction_bot::models::{Region, RegionStatus};

/// Areas anywhere on the globe with extents between 0.01 and 10 degrees
pub fn area_strategy() -> impl Strategy<Value = Area> {
    (-80.0f64..80.0, 0.01f64..10.0, -170.0f64..170.0, 0.01f64..10.0).prop_map(
        |(minlat, lat_extent, minlon, lon_extent)| {
            Area::new(minlat, minlat + lat_extent, minlon, minlon + lon_extent)
        },
    )
}

pub fn region_status_strategy() -> impl Strategy<Value = RegionStatus> {
    prop_oneof![
        Just(RegionStatus::Unprocessed),
        Just(RegionStatus::Processing),
        Just(RegionStatus::Complete),
        Just(RegionStatus::Failed),
    ]
}

/// Regions on an integer grid, with unique ids
pub fn region_grid_strategy() -> impl Strategy<Value = Vec<Region>> {
    prop::collection::vec((-10i32..10, -10i32..10, region_status_strategy()), 0..40).prop_map(
        |cells| {
            cells
                .into_iter()
                .enumerate()
                .map(|(i, (lat, lon, status))| Region {
                    id: i as i64 + 1,
                    lat: f64::from(lat),
                    lon: f64::from(lon),
                    status,
                })
                .collect()
        },
    )
}
