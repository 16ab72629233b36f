#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Redaction Bot
//!
//! Batch orchestrator that walks a large map dataset region by region and,
//! for each region, drives an edit-and-redact workflow against the
//! versioned-entity map API.
//!
//! ## Overview
//!
//! Work is partitioned into one-degree grid regions held in a shared tracker
//! database. Several bot instances can run at once: each claims a region
//! under a table lock that refuses any region within two degrees of one
//! already being processed, so no two instances edit neighbouring geography.
//!
//! A claimed region is decomposed into small bounding boxes. For each box the
//! candidate entities are handed to a change compiler, whose edits are
//! uploaded in bounded chunks and whose redactions are filed afterwards.
//!
//! ## Module Organization
//!
//! - [`geo`] - Areas, bisection, and the LIFO work list
//! - [`models`] - Regions, candidates, changesets, and redactions
//! - [`tracker`] - Region claiming and candidate bookkeeping (Postgres)
//! - [`source`] - Source dataset snapshots and the change compiler seam
//! - [`remote`] - Map API client, osmChange rendering, throttle backoff
//! - [`orchestration`] - Batch state machine, run loop, summary
//! - [`config`] - YAML configuration
//! - [`logging`] - Per-run log files
//! - [`error`] - Fatal errors and recoverable batch failures
//!
//! ## Failure model
//!
//! A failed changeset upload fails its batch and region but the run carries
//! on with the region's other areas. A failed redaction, an area too small
//! to split, or exhausted throttling end the run.
//!
//! ## Testing
//!
//! ```bash
//! cargo test                       # Unit and in-memory integration tests
//! cargo test --features pg-tests   # Also the Postgres tracker tests
//! ```
//!
//! The in-memory doubles in `test_helpers` are compiled only for tests or
//! with the `test-utils` feature.

pub mod config;
pub mod error;
pub mod geo;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod remote;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;
pub mod tracker;

pub use config::{BotConfig, ConfigManager};
pub use error::{BatchFailure, FatalError, Result};
pub use geo::{Area, AreaSplitter, AreaWorkList};
pub use models::{EntityBatch, EntityRef, EntityType, Redaction, RedactionIds, Region};
pub use orchestration::{BatchOutcome, RunContext, RunOrchestrator, RunSummary};
