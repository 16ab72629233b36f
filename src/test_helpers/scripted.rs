//! Scripted collaborators: an API transport that replays canned responses,
//! a sleeper that records instead of waiting, and in-memory stand-ins for the
//! remote service, the source store, and the change compiler.

use crate::error::Result;
use crate::geo::Area;
use crate::models::{EditOperation, EntityBatch, EntityRef};
use crate::remote::{
    ApiRequest, ApiResponse, ApiTransport, ChangesetMetadata, RemoteEditService, RemoteError,
    Sleeper,
};
use crate::source::{ChangeCompiler, CompileError, CompiledChanges, SourceStore};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replays responses in order, recording every request
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ApiResponse>>,
    fallback: Option<ApiResponse>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<ApiResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    /// Answer every request with the same response
    pub fn repeating(response: ApiResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, RemoteError> {
        let operation = request.path.clone();
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| RemoteError::transport(operation, "no scripted response left"))
    }
}

#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Default)]
struct ScriptedRemoteState {
    open_calls: usize,
    upload_calls: usize,
    redaction_calls: usize,
    next_changeset_id: i64,
    uploads: Vec<(i64, Vec<EditOperation>)>,
    redactions: Vec<(EntityRef, i64)>,
    map_requests: Vec<Area>,
}

/// Remote service whose Nth open, upload, or redaction call can be made to fail
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    state: Mutex<ScriptedRemoteState>,
    fail_open_on: Option<usize>,
    fail_upload_on: Option<usize>,
    fail_redaction_on: Option<usize>,
    map_responses: Mutex<VecDeque<ApiResponse>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th (1-based) changeset open
    pub fn fail_open_on(mut self, n: usize) -> Self {
        self.fail_open_on = Some(n);
        self
    }

    /// Fail the `n`th (1-based) chunk upload
    pub fn fail_upload_on(mut self, n: usize) -> Self {
        self.fail_upload_on = Some(n);
        self
    }

    /// Fail the `n`th (1-based) redaction
    pub fn fail_redaction_on(mut self, n: usize) -> Self {
        self.fail_redaction_on = Some(n);
        self
    }

    pub fn with_map_responses(self, responses: Vec<ApiResponse>) -> Self {
        *self.map_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn open_calls(&self) -> usize {
        self.state.lock().unwrap().open_calls
    }

    /// Successfully applied uploads as `(changeset id, operations)`
    pub fn uploads(&self) -> Vec<(i64, Vec<EditOperation>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn upload_calls(&self) -> usize {
        self.state.lock().unwrap().upload_calls
    }

    /// Successfully applied redactions as `(target, redaction id)`
    pub fn redactions(&self) -> Vec<(EntityRef, i64)> {
        self.state.lock().unwrap().redactions.clone()
    }

    pub fn redaction_calls(&self) -> usize {
        self.state.lock().unwrap().redaction_calls
    }

    pub fn map_requests(&self) -> Vec<Area> {
        self.state.lock().unwrap().map_requests.clone()
    }
}

#[async_trait]
impl RemoteEditService for ScriptedRemote {
    async fn open_changeset(
        &self,
        _metadata: &ChangesetMetadata,
    ) -> std::result::Result<i64, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.open_calls += 1;
        if self.fail_open_on == Some(state.open_calls) {
            return Err(RemoteError::rejected("changeset/create", 500, "scripted failure"));
        }
        state.next_changeset_id += 1;
        Ok(1000 + state.next_changeset_id)
    }

    async fn upload_changeset(
        &self,
        changeset_id: i64,
        operations: &[EditOperation],
    ) -> std::result::Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.upload_calls += 1;
        if self.fail_upload_on == Some(state.upload_calls) {
            return Err(RemoteError::rejected(
                "changeset/upload",
                409,
                "Version mismatch: Provided 1, server had: 2",
            ));
        }
        state.uploads.push((changeset_id, operations.to_vec()));
        Ok(())
    }

    async fn apply_redaction(
        &self,
        target: &EntityRef,
        redaction_id: i64,
    ) -> std::result::Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.redaction_calls += 1;
        if self.fail_redaction_on == Some(state.redaction_calls) {
            return Err(RemoteError::rejected("redact", 403, "scripted failure"));
        }
        state.redactions.push((*target, redaction_id));
        Ok(())
    }

    async fn fetch_map(&self, area: &Area) -> std::result::Result<ApiResponse, RemoteError> {
        self.state.lock().unwrap().map_requests.push(*area);
        let next = self.map_responses.lock().unwrap().pop_front();
        next.ok_or_else(|| RemoteError::transport("map", "no scripted map response left"))
    }
}

/// Snapshot handed out by [`MemorySource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub id: u64,
}

#[derive(Debug, Default)]
struct MemorySourceState {
    begun: u64,
    released: Vec<u64>,
}

/// Source store that knows a fixed set of redaction ids
#[derive(Debug)]
pub struct MemorySource {
    redaction_ids: Vec<i64>,
    state: Mutex<MemorySourceState>,
}

impl MemorySource {
    pub fn new(redaction_ids: Vec<i64>) -> Self {
        Self {
            redaction_ids,
            state: Mutex::new(MemorySourceState::default()),
        }
    }

    pub fn begun(&self) -> u64 {
        self.state.lock().unwrap().begun
    }

    pub fn released(&self) -> Vec<u64> {
        self.state.lock().unwrap().released.clone()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(vec![1, 2])
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot> {
        let mut state = self.state.lock().unwrap();
        state.begun += 1;
        Ok(MemorySnapshot { id: state.begun })
    }

    async fn existing_redaction_ids(
        &self,
        _snapshot: &mut MemorySnapshot,
        ids: &[i64],
    ) -> Result<Vec<i64>> {
        let mut found: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| self.redaction_ids.contains(id))
            .collect();
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }

    async fn release(&self, snapshot: MemorySnapshot) -> Result<()> {
        self.state.lock().unwrap().released.push(snapshot.id);
        Ok(())
    }
}

type CompileFn =
    dyn Fn(&EntityBatch) -> std::result::Result<CompiledChanges, CompileError> + Send + Sync;

/// Change compiler driven by a closure, recording every batch it sees
pub struct ScriptedCompiler {
    compile: Box<CompileFn>,
    calls: Mutex<Vec<(u64, EntityBatch)>>,
    ready: bool,
}

impl ScriptedCompiler {
    pub fn new<F>(compile: F) -> Self
    where
        F: Fn(&EntityBatch) -> std::result::Result<CompiledChanges, CompileError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            compile: Box::new(compile),
            calls: Mutex::new(Vec::new()),
            ready: true,
        }
    }

    /// Reports not ready, as a build without a linked compiler does
    pub fn unready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Always returns the same changes
    pub fn returning(changes: CompiledChanges) -> Self {
        Self::new(move |_| Ok(changes.clone()))
    }

    /// Batches compiled so far, with the snapshot each was compiled against
    pub fn calls(&self) -> Vec<(u64, EntityBatch)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeCompiler for ScriptedCompiler {
    type Snapshot = MemorySnapshot;

    fn ensure_ready(&self) -> std::result::Result<(), CompileError> {
        if self.ready {
            Ok(())
        } else {
            Err(CompileError::new("compiler not ready"))
        }
    }

    async fn compile(
        &self,
        snapshot: &mut MemorySnapshot,
        batch: &EntityBatch,
    ) -> std::result::Result<CompiledChanges, CompileError> {
        self.calls.lock().unwrap().push((snapshot.id, batch.clone()));
        (self.compile)(batch)
    }
}
