//! # Data Model
//!
//! Tracker rows (regions, candidates) and the compiler's outputs
//! (changesets, redactions).

pub mod candidate;
pub mod changeset;
pub mod redaction;
pub mod region;

pub use candidate::{Candidate, CandidateStatus, EntityBatch, EntityType};
pub use changeset::{
    Changeset, EditAction, EditOperation, Element, RelationMember, Tag,
    DEFAULT_MAX_CHANGESET_ELEMENTS,
};
pub use redaction::{EntityRef, Redaction, RedactionIds, RedactionMode};
pub use region::{next_claimable, Region, RegionStatus};
