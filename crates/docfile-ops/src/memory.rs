//! In-memory backend for dry runs and tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use docfile_core::keys::{self, EntityPath};
use docfile_core::{ClientError, CollectionKey, DocfileConfig, FileRecord};

use crate::client::{BatchRequest, DataClient};
use crate::group::BatchGroupId;
use crate::progress::{StatusSink, StatusUpdate};
use crate::transport::{TransportEvent, UploadRequest, UploadTransport};
use crate::ui::{Dialogs, PlaceholderSource, ProgressDisplay, RecordBinding, RenamePrompt};

/// Buffer size of a transport's event channel.
pub const TRANSPORT_CHANNEL_SIZE: usize = 16;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A batch group as the server received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBatch {
    pub group: BatchGroupId,
    pub requests: Vec<BatchRequest>,
}

#[derive(Debug, Default)]
struct ServerState {
    files: Vec<FileRecord>,
    batches: Vec<RecordedBatch>,
    failing: HashSet<String>,
    token_fails: bool,
    listing_fails: bool,
    tokens_issued: usize,
    next_file_id: u64,
}

impl ServerState {
    fn mint_file_id(&mut self) -> String {
        self.next_file_id += 1;
        format!("F{:06}", self.next_file_id)
    }
}

/// A file service kept in memory.
#[derive(Debug)]
pub struct MemoryDataClient {
    service_url: String,
    content_entity_set: String,
    state: Mutex<ServerState>,
}

impl MemoryDataClient {
    pub fn new(config: &DocfileConfig) -> Self {
        Self {
            service_url: config.service_url.clone(),
            content_entity_set: config.content_entity_set.clone(),
            state: Mutex::default(),
        }
    }

    /// Store a file and return its server id.
    pub fn add_file(
        &self,
        key: &CollectionKey,
        file_name: impl Into<String>,
        document_number: impl Into<String>,
    ) -> String {
        let mut state = lock(&self.state);
        let file_id = state.mint_file_id();
        let mut record = FileRecord::new(file_id.clone(), file_name, document_number);
        record.object_type = key.object_type.clone();
        record.object_key = key.object_id.clone();
        record.document_type = key.document_type.clone();
        state.files.push(record);
        file_id
    }

    /// Make every batch request touching `file_id` fail.
    pub fn fail_file(&self, file_id: impl Into<String>) {
        lock(&self.state).failing.insert(file_id.into());
    }

    /// Make security token requests fail.
    pub fn fail_security_token(&self) {
        lock(&self.state).token_fails = true;
    }

    /// Make file listings fail.
    pub fn fail_listing(&self) {
        lock(&self.state).listing_fails = true;
    }

    pub fn batches(&self) -> Vec<RecordedBatch> {
        lock(&self.state).batches.clone()
    }

    pub fn batch_count(&self) -> usize {
        lock(&self.state).batches.len()
    }

    pub fn tokens_issued(&self) -> usize {
        lock(&self.state).tokens_issued
    }

    pub fn files(&self, key: &CollectionKey) -> Vec<FileRecord> {
        lock(&self.state)
            .files
            .iter()
            .filter(|record| record.belongs_to(key))
            .cloned()
            .collect()
    }

    /// Store the file described by an upload's `SLUG` header.
    pub fn register_upload(&self, slug: &str) -> Result<String, ClientError> {
        let (file_name, key) = keys::parse_slug(slug)
            .ok_or_else(|| ClientError::with_status("Malformed SLUG header", 400))?;
        Ok(self.add_file(&key, file_name, "0000"))
    }

    fn path_of(&self, record: &FileRecord) -> EntityPath {
        let key = CollectionKey::new(
            record.object_type.as_str(),
            record.object_key.as_str(),
            record.document_type.as_str(),
        );
        keys::content_entity_path(
            &self.content_entity_set,
            &key,
            &record.document_number,
            &record.file_id,
        )
    }

    fn apply(&self, state: &mut ServerState, request: &BatchRequest) -> Result<(), ClientError> {
        let index = state
            .files
            .iter()
            .position(|record| &self.path_of(record) == request.path())
            .ok_or_else(|| ClientError::with_status("Resource not found", 404))?;
        if state.failing.contains(&state.files[index].file_id) {
            return Err(ClientError::with_status("Internal server error", 500));
        }

        match request {
            BatchRequest::Remove { .. } => {
                state.files.remove(index);
            }
            BatchRequest::Update { payload, .. } => {
                let file_name = payload
                    .get("FileName")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ClientError::with_status("FileName is missing", 400))?;
                state.files[index].file_name = file_name.to_string();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataClient for MemoryDataClient {
    fn service_url(&self) -> &str {
        &self.service_url
    }

    async fn submit_batch(
        &self,
        group: &BatchGroupId,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<Result<(), ClientError>>, ClientError> {
        let mut state = lock(&self.state);
        let responses = requests
            .iter()
            .map(|request| self.apply(&mut state, request))
            .collect();
        state.batches.push(RecordedBatch {
            group: group.clone(),
            requests,
        });
        Ok(responses)
    }

    async fn read_entity(&self, path: &EntityPath) -> Result<Value, ClientError> {
        let state = lock(&self.state);
        let record = state
            .files
            .iter()
            .find(|record| &self.path_of(record) == path)
            .ok_or_else(|| ClientError::with_status("Resource not found", 404))?;

        let mut entity = serde_json::to_value(record)
            .map_err(|e| ClientError::new(format!("Could not encode entity: {e}")))?;
        if let Value::Object(map) = &mut entity {
            map.insert(
                "__metadata".to_string(),
                json!({ "uri": format!("{}{}", self.service_url, path) }),
            );
        }
        Ok(entity)
    }

    async fn security_token(&self) -> Result<String, ClientError> {
        let mut state = lock(&self.state);
        if state.token_fails {
            return Err(ClientError::with_status("Token fetch failed", 403));
        }
        state.tokens_issued += 1;
        Ok(format!("token-{}", state.tokens_issued))
    }

    async fn list_files(&self, key: &CollectionKey) -> Result<Vec<FileRecord>, ClientError> {
        if lock(&self.state).listing_fails {
            return Err(ClientError::with_status("Listing failed", 503));
        }
        Ok(self.files(key))
    }
}

/// One scripted step of a [`MemoryTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    /// Report this many bytes sent.
    Progress(u64),
    /// Finish with this status. Statuses below 300 store the file.
    Complete(u16),
    /// Block until aborted.
    WaitForCancel,
}

/// Shared view of the last request a [`MemoryTransport`] was asked to send.
#[derive(Debug, Clone, Default)]
pub struct SentRequest(Arc<Mutex<Option<UploadRequest>>>);

impl SentRequest {
    pub fn get(&self) -> Option<UploadRequest> {
        lock(&self.0).clone()
    }

    fn set(&self, request: &UploadRequest) {
        *lock(&self.0) = Some(request.clone());
    }
}

/// Transport that replays scripted steps on a spawned task.
#[derive(Debug)]
pub struct MemoryTransport {
    server: Option<Arc<MemoryDataClient>>,
    size: u64,
    steps: Vec<TransferStep>,
    released: Arc<AtomicBool>,
    sent: SentRequest,
}

impl MemoryTransport {
    /// Sends `size` bytes in two halves and completes with 201.
    pub fn new(size: u64) -> Self {
        Self::with_steps(
            size,
            vec![
                TransferStep::Progress(size / 2),
                TransferStep::Progress(size),
                TransferStep::Complete(201),
            ],
        )
    }

    pub fn with_steps(size: u64, steps: Vec<TransferStep>) -> Self {
        Self {
            server: None,
            size,
            steps,
            released: Arc::default(),
            sent: SentRequest::default(),
        }
    }

    /// Store completed uploads on `server`.
    pub fn storing_on(mut self, server: Arc<MemoryDataClient>) -> Self {
        self.server = Some(server);
        self
    }

    /// Flag set once the transport has been released.
    pub fn released_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }

    /// Handle to the request this transport receives.
    pub fn sent_request(&self) -> SentRequest {
        self.sent.clone()
    }
}

impl UploadTransport for MemoryTransport {
    fn send(
        &mut self,
        request: UploadRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<TransportEvent> {
        self.sent.set(&request);
        let (tx, rx) = mpsc::channel(TRANSPORT_CHANNEL_SIZE);
        let steps = self.steps.clone();
        let server = self.server.clone();
        let total = self.size;

        tokio::spawn(async move {
            for step in steps {
                let event = match step {
                    TransferStep::Progress(loaded) => TransportEvent::Progress { loaded, total },
                    TransferStep::Complete(status) => {
                        let status = match (&server, request.header(keys::SLUG_HEADER)) {
                            (Some(server), Some(slug)) if status < 300 => {
                                match server.register_upload(slug) {
                                    Ok(_) => status,
                                    Err(e) => e.status.unwrap_or(500),
                                }
                            }
                            _ => status,
                        };
                        TransportEvent::Completed { status }
                    }
                    TransferStep::WaitForCancel => {
                        cancel.cancelled().await;
                        TransportEvent::Aborted
                    }
                };

                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        let _ = tx.send(TransportEvent::Aborted).await;
                        return;
                    }
                    sent = tx.send(event) => sent,
                };
                if sent.is_err() || event.is_terminal() {
                    return;
                }
                tokio::task::yield_now().await;
            }
        });

        rx
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::Release);
    }
}

/// List control whose pending entries appear after a delay.
#[derive(Default)]
pub struct ScriptedPlaceholders {
    entries: Vec<(Instant, Option<Box<dyn UploadTransport>>)>,
}

impl ScriptedPlaceholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let a pending entry appear `delay` from now.
    pub fn materialize_in(&mut self, delay: Duration, transport: Box<dyn UploadTransport>) {
        self.entries.push((Instant::now() + delay, Some(transport)));
    }
}

impl PlaceholderSource for ScriptedPlaceholders {
    fn pending_len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|(at, _)| *at <= now).count()
    }

    fn take_transport(&mut self, index: usize) -> Option<Box<dyn UploadTransport>> {
        self.entries.get_mut(index).and_then(|(_, transport)| transport.take())
    }
}

/// Dialogs that answer from a script.
#[derive(Debug, Default)]
pub struct ScriptedDialogs {
    confirm: AtomicBool,
    names: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<RenamePrompt>>,
}

impl ScriptedDialogs {
    /// Confirms everything and cancels every rename prompt.
    pub fn new() -> Self {
        Self {
            confirm: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn declining() -> Self {
        Self::default()
    }

    /// Answer the next rename prompt with `stem` (`None` cancels).
    pub fn answer_name(&self, stem: Option<&str>) {
        lock(&self.names).push_back(stem.map(str::to_string));
    }

    pub fn prompts(&self) -> Vec<RenamePrompt> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl Dialogs for ScriptedDialogs {
    async fn confirm(&self, _title: &str, _message: &str) -> bool {
        self.confirm.load(Ordering::Acquire)
    }

    async fn prompt_name(&self, prompt: RenamePrompt) -> Option<String> {
        lock(&self.prompts).push(prompt);
        lock(&self.names).pop_front().flatten()
    }
}

/// Record binding that only counts refreshes.
#[derive(Debug, Default)]
pub struct CountingBinding {
    refreshes: Mutex<usize>,
}

impl CountingBinding {
    pub fn refreshes(&self) -> usize {
        *lock(&self.refreshes)
    }
}

#[async_trait]
impl RecordBinding for CountingBinding {
    async fn refresh(&self) -> Result<(), ClientError> {
        *lock(&self.refreshes) += 1;
        Ok(())
    }
}

/// Whether a [`RecordingDisplay`] is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayState {
    #[default]
    Closed,
    Open,
    /// Left open after failures, with a dismiss action.
    Dismissable,
}

/// Progress display that keeps every update, optionally forwarding them.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    state: Mutex<DisplayState>,
    updates: Mutex<Vec<StatusUpdate>>,
    forward: Option<mpsc::UnboundedSender<StatusUpdate>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also send every update to `tx`.
    pub fn forwarding(tx: mpsc::UnboundedSender<StatusUpdate>) -> Self {
        Self {
            forward: Some(tx),
            ..Self::default()
        }
    }

    pub fn state(&self) -> DisplayState {
        *lock(&self.state)
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        lock(&self.updates).clone()
    }
}

impl StatusSink for RecordingDisplay {
    fn publish(&self, update: StatusUpdate) {
        if let Some(tx) = &self.forward {
            tx.publish(update.clone());
        }
        lock(&self.updates).push(update);
    }
}

impl ProgressDisplay for RecordingDisplay {
    fn open(&self, _title: &str) {
        *lock(&self.state) = DisplayState::Open;
    }

    fn close(&self) {
        *lock(&self.state) = DisplayState::Closed;
    }

    fn show_dismiss(&self) {
        *lock(&self.state) = DisplayState::Dismissable;
    }
}
