//! # Remote Edit Service
//!
//! Everything that talks to the versioned-entity map API:
//!
//! - `PUT /changeset/create` opens a changeset and answers with its id
//! - `POST /changeset/{id}/upload` applies one osmChange chunk
//! - `POST /{type}/{id}/{version}/redact?redaction={id}` files a redaction
//! - `GET /map?bbox=minlon,minlat,maxlon,maxlat` reads live data, `509` = throttled
//!
//! Calls are sequential round trips. Callers slice changesets into chunks of
//! at most `max_changeset_elements` and upload them one after another.

pub mod client;
pub mod error;
pub mod osmchange;
pub mod throttle;
pub mod transport;

use crate::geo::Area;
use crate::models::{EditOperation, EntityRef};
use async_trait::async_trait;

pub use client::OsmApiClient;
pub use error::RemoteError;
pub use osmchange::{parse_map_entities, ChangesetMetadata};
pub use throttle::{Sleeper, ThrottlePolicy, TokioSleeper, THROTTLED_STATUS};
pub use transport::{ApiRequest, ApiResponse, ApiTransport, HttpMethod, ReqwestTransport};

#[async_trait]
pub trait RemoteEditService: Send + Sync {
    /// Open a changeset and return the id the server assigned
    async fn open_changeset(&self, metadata: &ChangesetMetadata) -> Result<i64, RemoteError>;

    /// Upload one chunk of edits into an open changeset
    async fn upload_changeset(
        &self,
        changeset_id: i64,
        operations: &[EditOperation],
    ) -> Result<(), RemoteError>;

    /// Redact one entity version under the given redaction id
    async fn apply_redaction(&self, target: &EntityRef, redaction_id: i64) -> Result<(), RemoteError>;

    /// Read the map data in an area, waiting out throttling. Any status other
    /// than `509` is returned to the caller.
    async fn fetch_map(&self, area: &Area) -> Result<ApiResponse, RemoteError>;
}
