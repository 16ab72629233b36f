//! # Map API Client
//!
//! [`RemoteEditService`] over an [`ApiTransport`]: opens and uploads
//! changesets, files redactions, and reads map data with throttle handling.

use super::error::RemoteError;
use super::osmchange::{render_changeset_create, render_osm_change, ChangesetMetadata};
use super::throttle::{Sleeper, ThrottlePolicy, TokioSleeper, THROTTLED_STATUS};
use super::transport::{ApiRequest, ApiResponse, ApiTransport};
use super::RemoteEditService;
use crate::geo::Area;
use crate::models::{EditOperation, EntityRef};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct OsmApiClient<T> {
    transport: T,
    sleeper: Arc<dyn Sleeper>,
    throttle: ThrottlePolicy,
}

impl<T: ApiTransport> OsmApiClient<T> {
    pub fn new(transport: T, throttle: ThrottlePolicy) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            throttle,
        }
    }

    /// Replace the sleeper used between throttled attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Map read starting at a given attempt number. Each 509 sleeps
    /// `base * attempt` and retries with `attempt + 1`; running past the
    /// attempt cap is an error.
    #[instrument(skip(self), fields(bbox = %area.bbox_param()))]
    pub async fn fetch_map_from_attempt(
        &self,
        area: &Area,
        mut attempt: u32,
    ) -> Result<ApiResponse, RemoteError> {
        let path = format!("/map?bbox={}", area.bbox_param());

        loop {
            if !self.throttle.allows(attempt) {
                error!(attempt = attempt, area = %area, "Too much throttling, giving up");
                return Err(RemoteError::ThrottleExhausted {
                    area: *area,
                    attempts: self.throttle.max_attempts,
                });
            }

            debug!(path = %path, attempt = attempt, "Making map call");
            let response = self.transport.send(ApiRequest::get(path.clone())).await?;

            if response.status != THROTTLED_STATUS {
                return Ok(response);
            }

            let delay = self.throttle.delay_for(attempt);
            warn!(
                attempt = attempt,
                delay_seconds = delay.as_secs(),
                "Throttled by map API, sleeping"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl<T: ApiTransport> RemoteEditService for OsmApiClient<T> {
    #[instrument(skip(self, metadata))]
    async fn open_changeset(&self, metadata: &ChangesetMetadata) -> Result<i64, RemoteError> {
        let body = render_changeset_create(metadata)?;
        let response = self
            .transport
            .send(ApiRequest::put_xml("/changeset/create", body))
            .await?;

        if !response.is_success() {
            error!(status = response.status, body = %response.body, "Failed to open changeset");
            return Err(RemoteError::rejected(
                "open changeset",
                response.status,
                response.body,
            ));
        }

        let changeset_id = response.body.trim().parse::<i64>().map_err(|e| {
            RemoteError::invalid_response(
                "open changeset",
                format!("expected changeset id, got '{}': {e}", response.body.trim()),
            )
        })?;

        debug!(changeset_id = changeset_id, "Opened changeset");
        Ok(changeset_id)
    }

    #[instrument(skip(self, operations), fields(elements = operations.len()))]
    async fn upload_changeset(
        &self,
        changeset_id: i64,
        operations: &[EditOperation],
    ) -> Result<(), RemoteError> {
        let document = render_osm_change(changeset_id, operations)?;
        debug!("Changeset:\n{}", document);

        let response = self
            .transport
            .send(ApiRequest::post_xml(
                format!("/changeset/{changeset_id}/upload"),
                document,
            ))
            .await?;

        if !response.is_success() {
            error!(
                changeset_id = changeset_id,
                status = response.status,
                body = %response.body,
                "Changeset failed to apply"
            );
            return Err(RemoteError::rejected(
                format!("upload changeset {changeset_id}"),
                response.status,
                response.body,
            ));
        }

        info!(changeset_id = changeset_id, "Uploaded changeset");
        Ok(())
    }

    #[instrument(skip(self, target), fields(entity = %target))]
    async fn apply_redaction(&self, target: &EntityRef, redaction_id: i64) -> Result<(), RemoteError> {
        let path = format!(
            "/{}/{}/{}/redact?redaction={}",
            target.entity_type(),
            target.id(),
            target.version(),
            redaction_id
        );
        let response = self.transport.send(ApiRequest::post(path)).await?;

        if !response.is_success() {
            error!(
                status = response.status,
                body = %response.body,
                "Failed to redact element"
            );
            return Err(RemoteError::rejected(
                format!("redact {target}"),
                response.status,
                response.body,
            ));
        }

        Ok(())
    }

    async fn fetch_map(&self, area: &Area) -> Result<ApiResponse, RemoteError> {
        self.fetch_map_from_attempt(area, 1).await
    }
}
