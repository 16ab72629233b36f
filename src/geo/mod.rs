//! # Geometry
//!
//! Bounding boxes, longest-axis bisection, and the LIFO work list that turns
//! a claimed region into request-sized areas without recursion.

pub mod area;
pub mod work_list;

pub use area::{
    Area, AreaSplitter, SplitError, DEFAULT_MAX_REQUEST_AREA, DEFAULT_TOO_SMALL_TO_SPLIT,
};
pub use work_list::AreaWorkList;
