//! Batched submission of one collection's pending changes.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{self, join_all};
use futures::stream::{self, BoxStream, StreamExt};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::ReceiverStream;

use docfile_core::keys::{self, EntityPath};
use docfile_core::{
    AttachmentItem, ClientError, CollectionKey, DocfileConfig, DocfileError, EntityKind, ItemId,
    SubmissionError, UploadStatus, prepare_for_update,
};

use crate::client::{BatchRequest, DataClient, UpdateMethod};
use crate::collection::AttachmentCollection;
use crate::gate::UploadGate;
use crate::group::BatchGroupId;
use crate::ledger::{PendingChangeSet, PendingUpload};
use crate::progress::{ItemStatus, OperationClass, StatusSink, StatusUpdate, SubmissionOutcome};
use crate::transport::{TransportEvent, UploadRequest};

/// Per-class outcomes of one submission cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub deletes: SubmissionOutcome,
    pub renames: SubmissionOutcome,
    pub uploads: SubmissionOutcome,
    /// Placeholders of the uploads that reached a terminal status, as they
    /// left the ledger.
    pub finished_uploads: Vec<AttachmentItem>,
}

impl SubmitReport {
    pub fn is_success(&self) -> bool {
        self.deletes.is_success() && self.renames.is_success() && self.uploads.is_success()
    }

    /// Number of requests that were sent or attempted.
    pub fn attempted(&self) -> usize {
        [self.deletes, self.renames, self.uploads]
            .iter()
            .map(|o| o.succeeded + o.failed)
            .sum()
    }

    pub fn failures(&self) -> SubmissionError {
        SubmissionError {
            deletes_failed: self.deletes.failed,
            renames_failed: self.renames.failed,
            uploads_failed: self.uploads.failed,
        }
    }

    pub fn into_result(self) -> Result<Self, DocfileError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DocfileError::Submission(self.failures()))
        }
    }
}

/// Sends pending deletes, renames and uploads of a collection to the data client.
#[derive(Debug)]
pub struct BatchSubmitter<C: ?Sized> {
    client: Arc<C>,
    gate: UploadGate,
    group_prefix: String,
    content_entity_set: String,
    upload_url: String,
}

impl<C: DataClient + ?Sized> BatchSubmitter<C> {
    pub fn new(client: Arc<C>, config: &DocfileConfig, gate: UploadGate) -> Self {
        Self {
            client,
            gate,
            group_prefix: config.group_prefix.clone(),
            content_entity_set: config.content_entity_set.clone(),
            upload_url: config.upload_url(),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn gate(&self) -> &UploadGate {
        &self.gate
    }

    /// Submit every pending change of `collection`.
    ///
    /// Deletes, renames and uploads run concurrently, each in its own batch
    /// group. Items that succeed are applied even when siblings fail; the
    /// error only reports how many failed. Uploads stay suppressed through
    /// the shared gate until the cycle settles.
    pub async fn submit<S: StatusSink + ?Sized>(
        &self,
        collection: &mut AttachmentCollection,
        sink: &S,
    ) -> Result<SubmitReport, DocfileError> {
        let Some(_ticket) = collection.submission_flag().try_acquire() else {
            tracing::error!(collection = %collection.key(), "submission already in flight");
            return Err(DocfileError::ConcurrencyGuard {
                key: collection.key().clone(),
            });
        };
        let _hold = self.gate.hold();

        tracing::info!(
            collection = %collection.key(),
            deletes = collection.changes().deletion_count(),
            renames = collection.changes().rename_count(),
            uploads = collection.changes().upload_count(),
            "submitting file changes"
        );

        let report = {
            let AttachmentCollection {
                key,
                items,
                changes,
                ..
            } = &mut *collection;
            let PendingChangeSet {
                deletions,
                renames,
                uploads,
            } = changes;
            let key: &CollectionKey = key;

            let (deletes, renames, (uploads, finished_uploads)) = tokio::join!(
                self.submit_deletes(key, deletions, sink),
                self.submit_renames(key, items, renames, sink),
                self.submit_uploads(key, uploads, sink),
            );
            SubmitReport {
                deletes,
                renames,
                uploads,
                finished_uploads,
            }
        };

        collection.publish();
        tracing::info!(
            collection = %collection.key(),
            deletes = %report.deletes.summary(),
            renames = %report.renames.summary(),
            uploads = %report.uploads.summary(),
            "submission settled"
        );
        report.into_result()
    }

    async fn submit_deletes<S: StatusSink + ?Sized>(
        &self,
        key: &CollectionKey,
        deletions: &mut IndexMap<ItemId, AttachmentItem>,
        sink: &S,
    ) -> SubmissionOutcome {
        let mut outcome = SubmissionOutcome::new(OperationClass::Delete, deletions.len());
        if deletions.is_empty() {
            return outcome;
        }

        let group = BatchGroupId::mint(&self.group_prefix, OperationClass::Delete);
        let mut targets = Vec::with_capacity(deletions.len());
        let mut requests = Vec::with_capacity(deletions.len());
        for (index, item) in deletions.values().enumerate() {
            let path = keys::content_entity_path(
                &self.content_entity_set,
                key,
                &item.document_number,
                item.file_id.as_deref().unwrap_or_default(),
            );
            sink.publish(StatusUpdate::new(
                OperationClass::Delete,
                item.id,
                &item.file_name,
                ItemStatus::Queued,
            ));
            targets.push((item.id, item.file_name.clone()));
            requests.push(BatchRequest::Remove {
                path,
                change_set: group.change_set(index),
            });
        }

        tracing::debug!(%group, count = requests.len(), "submitting delete batch");
        let responses = expand_responses(
            self.client.submit_batch(&group, requests).await,
            targets.len(),
        );

        for ((id, file_name), response) in targets.into_iter().zip(responses) {
            match response {
                Ok(()) => {
                    deletions.shift_remove(&id);
                    outcome.record_success();
                    sink.publish(StatusUpdate::new(
                        OperationClass::Delete,
                        id,
                        file_name,
                        ItemStatus::Deleted,
                    ));
                }
                Err(e) => {
                    tracing::warn!(%group, file = %file_name, error = %e, "delete failed");
                    outcome.record_failure();
                    sink.publish(StatusUpdate::new(
                        OperationClass::Delete,
                        id,
                        file_name,
                        ItemStatus::Failed,
                    ));
                }
            }
        }

        outcome
    }

    async fn submit_renames<S: StatusSink + ?Sized>(
        &self,
        key: &CollectionKey,
        items: &mut IndexMap<ItemId, AttachmentItem>,
        renames: &mut IndexSet<ItemId>,
        sink: &S,
    ) -> SubmissionOutcome {
        renames.retain(|id| items.get(id).is_some_and(AttachmentItem::has_pending_rename));
        let mut outcome = SubmissionOutcome::new(OperationClass::Rename, renames.len());
        if renames.is_empty() {
            return outcome;
        }

        let group = BatchGroupId::mint(&self.group_prefix, OperationClass::Rename);
        let targets: Vec<(ItemId, String, EntityPath)> = renames
            .iter()
            .filter_map(|id| items.get(id))
            .map(|item| {
                let path = keys::content_entity_path(
                    &self.content_entity_set,
                    key,
                    &item.document_number,
                    item.file_id.as_deref().unwrap_or_default(),
                );
                (item.id, item.file_name.clone(), path)
            })
            .collect();

        for (id, file_name, _) in &targets {
            sink.publish(StatusUpdate::new(
                OperationClass::Rename,
                *id,
                file_name,
                ItemStatus::Queued,
            ));
        }

        let reads = join_all(
            targets
                .iter()
                .map(|(_, _, path)| self.client.read_entity(path)),
        )
        .await;

        let mut prepared = Vec::with_capacity(targets.len());
        let mut requests = Vec::with_capacity(targets.len());
        for ((id, file_name, path), read) in targets.into_iter().zip(reads) {
            match read {
                Ok(entity) => {
                    let mut payload = prepare_for_update(&entity, EntityKind::DocObjFile);
                    if let Value::Object(map) = &mut payload {
                        map.insert("FileName".to_string(), Value::String(file_name.clone()));
                    }
                    requests.push(BatchRequest::Update {
                        path,
                        payload,
                        method: UpdateMethod::Put,
                        change_set: group.change_set(requests.len()),
                    });
                    prepared.push((id, file_name));
                }
                Err(e) => {
                    tracing::warn!(%group, file = %file_name, error = %e, "could not read file entity");
                    outcome.record_failure();
                    sink.publish(StatusUpdate::new(
                        OperationClass::Rename,
                        id,
                        file_name,
                        ItemStatus::Failed,
                    ));
                }
            }
        }

        if requests.is_empty() {
            return outcome;
        }

        tracing::debug!(%group, count = requests.len(), "submitting rename batch");
        let responses = expand_responses(
            self.client.submit_batch(&group, requests).await,
            prepared.len(),
        );

        for ((id, file_name), response) in prepared.into_iter().zip(responses) {
            match response {
                Ok(()) => {
                    if let Some(item) = items.get_mut(&id) {
                        item.renamed = false;
                    }
                    renames.shift_remove(&id);
                    outcome.record_success();
                    sink.publish(StatusUpdate::new(
                        OperationClass::Rename,
                        id,
                        file_name,
                        ItemStatus::Renamed,
                    ));
                }
                Err(e) => {
                    tracing::warn!(%group, file = %file_name, error = %e, "rename failed");
                    outcome.record_failure();
                    sink.publish(StatusUpdate::new(
                        OperationClass::Rename,
                        id,
                        file_name,
                        ItemStatus::Failed,
                    ));
                }
            }
        }

        outcome
    }

    async fn submit_uploads<S: StatusSink + ?Sized>(
        &self,
        key: &CollectionKey,
        uploads: &mut Vec<PendingUpload>,
        sink: &S,
    ) -> (SubmissionOutcome, Vec<AttachmentItem>) {
        let mut outcome = SubmissionOutcome::new(OperationClass::Upload, uploads.len());
        let mut finished = Vec::new();
        if uploads.is_empty() {
            return (outcome, finished);
        }

        let group = BatchGroupId::mint(&self.group_prefix, OperationClass::Upload);
        let token = match self.client.security_token().await {
            Ok(token) => token,
            Err(e) => {
                // Nothing was sent; the uploads stay pending for the next save.
                tracing::warn!(%group, error = %e, "could not fetch security token");
                for upload in uploads.iter() {
                    outcome.record_failure();
                    sink.publish(StatusUpdate::new(
                        OperationClass::Upload,
                        upload.id(),
                        upload.file_name(),
                        ItemStatus::Failed,
                    ));
                }
                return (outcome, finished);
            }
        };

        let mut streams: StreamMap<ItemId, BoxStream<'static, TransportEvent>> = StreamMap::new();
        for upload in uploads.iter_mut() {
            let request = self.upload_request(key, upload, &token);
            upload.placeholder.upload_status = UploadStatus::Uploading;
            sink.publish(StatusUpdate::new(
                OperationClass::Upload,
                upload.id(),
                upload.file_name(),
                ItemStatus::Queued,
            ));
            tracing::debug!(
                %group,
                file = %upload.file_name(),
                dropped = upload.was_dropped(),
                "starting upload"
            );

            let events = upload.transport.send(request, upload.cancel.clone());
            // A closed channel without a terminal event counts as an abort.
            let events = ReceiverStream::new(events)
                .chain(stream::once(future::ready(TransportEvent::Aborted)))
                .boxed();
            streams.insert(upload.id(), events);
        }

        let mut settled = HashSet::new();
        while !outcome.is_settled() {
            let Some((id, event)) = streams.next().await else {
                break;
            };
            if settled.contains(&id) {
                continue;
            }

            match event {
                TransportEvent::Progress { loaded, total } => {
                    if let Some(upload) = uploads.iter().find(|u| u.id() == id) {
                        sink.publish(StatusUpdate::new(
                            OperationClass::Upload,
                            id,
                            upload.file_name(),
                            ItemStatus::from_bytes(loaded, total),
                        ));
                    }
                }
                TransportEvent::Completed { status } => {
                    settled.insert(id);
                    let (terminal, item_status) = if status > 299 {
                        (UploadStatus::Failed, ItemStatus::Failed)
                    } else {
                        (UploadStatus::Uploaded, ItemStatus::Uploaded)
                    };
                    let placeholder = release_upload(uploads, id, terminal);
                    let file_name = placeholder
                        .as_ref()
                        .map(|p| p.file_name.clone())
                        .unwrap_or_default();

                    if terminal == UploadStatus::Failed {
                        let error = DocfileError::Transport {
                            message: format!("Upload of '{file_name}' was rejected"),
                            status: Some(status),
                        };
                        tracing::warn!(%group, error = %error, status, "upload failed");
                        outcome.record_failure();
                    } else {
                        tracing::debug!(%group, file = %file_name, status, "upload completed");
                        outcome.record_success();
                    }
                    sink.publish(StatusUpdate::new(
                        OperationClass::Upload,
                        id,
                        file_name,
                        item_status,
                    ));
                    finished.extend(placeholder);
                }
                TransportEvent::Aborted => {
                    settled.insert(id);
                    let file_name = release_upload(uploads, id, UploadStatus::PendingUpload)
                        .map(|p| p.file_name)
                        .unwrap_or_default();
                    tracing::debug!(%group, file = %file_name, "upload aborted");
                    outcome.record_abort();
                }
            }
        }

        (outcome, finished)
    }

    fn upload_request(
        &self,
        key: &CollectionKey,
        upload: &PendingUpload,
        token: &str,
    ) -> UploadRequest {
        let file_name = upload.file_name().to_string();
        let mut headers = vec![
            (keys::SLUG_HEADER.to_string(), keys::slug(&file_name, key)),
            (keys::CSRF_HEADER.to_string(), token.to_string()),
        ];
        if let Some(mime) = keys::content_type_override(&file_name) {
            headers.push((keys::CONTENT_TYPE_HEADER.to_string(), mime.to_string()));
        }

        UploadRequest {
            url: self.upload_url.clone(),
            file_name,
            headers,
            source: upload.source.clone(),
        }
    }
}

/// Remove a settled upload from the ledger and free its transport. Returns
/// the placeholder carrying `status`.
fn release_upload(
    uploads: &mut Vec<PendingUpload>,
    id: ItemId,
    status: UploadStatus,
) -> Option<AttachmentItem> {
    let index = uploads.iter().position(|u| u.id() == id)?;
    let mut upload = uploads.remove(index);
    upload.placeholder.upload_status = status;
    let placeholder = upload.placeholder.clone();
    upload.release();
    Some(placeholder)
}

/// One result per request. A failed batch fails every request in it, and
/// requests the server did not answer count as failed.
fn expand_responses(
    responses: Result<Vec<Result<(), ClientError>>, ClientError>,
    expected: usize,
) -> Vec<Result<(), ClientError>> {
    match responses {
        Ok(mut responses) => {
            responses.resize_with(expected, || Err(ClientError::new("No response for request")));
            responses
        }
        Err(e) => vec![Err(e); expected],
    }
}
