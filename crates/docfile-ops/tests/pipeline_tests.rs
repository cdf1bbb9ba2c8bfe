use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use docfile_core::keys;
use docfile_core::{CollectionKey, DocfileConfig, DocfileError, ItemId, UploadStatus};
use docfile_ops::memory::{
    CountingBinding, DisplayState, MemoryDataClient, MemoryTransport, RecordingDisplay,
    ScriptedDialogs, ScriptedPlaceholders, TransferStep,
};
use docfile_ops::{
    AttachmentCollection, BatchRequest, BatchSubmitter, DroppedFile, EnglishTexts, FileSelection,
    ItemStatus, NullSink, OperationClass, ReconciliationController, SaveOutcome, StatusUpdate,
    Texts, UpdateMethod, UploadGate, UploadOrchestrator, UploadSource,
};
use tokio::sync::mpsc;

fn key() -> CollectionKey {
    CollectionKey::new("BUS2012", "4500000001", "ZDO")
}

fn texts() -> Arc<dyn Texts> {
    Arc::new(EnglishTexts)
}

/// A server holding `files` and a collection bound to them.
fn setup(files: &[&str]) -> (Arc<MemoryDataClient>, AttachmentCollection) {
    let server = Arc::new(MemoryDataClient::new(&DocfileConfig::default()));
    for name in files {
        server.add_file(&key(), *name, "0001");
    }
    let collection = AttachmentCollection::from_records(key(), server.files(&key()));
    (server, collection)
}

fn submitter(server: &Arc<MemoryDataClient>, gate: &UploadGate) -> BatchSubmitter<MemoryDataClient> {
    BatchSubmitter::new(server.clone(), &DocfileConfig::default(), gate.clone())
}

fn orchestrator(gate: &UploadGate) -> UploadOrchestrator {
    UploadOrchestrator::new(&DocfileConfig::default(), gate.clone(), texts())
}

fn id_of(collection: &AttachmentCollection, name: &str) -> ItemId {
    collection
        .items()
        .find(|item| item.file_name == name)
        .map(|item| item.id)
        .unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<StatusUpdate>) -> Vec<StatusUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

#[tokio::test]
async fn test_empty_submit_opens_no_batch() {
    let (server, mut collection) = setup(&["a.pdf"]);
    let gate = UploadGate::new();

    let report = submitter(&server, &gate)
        .submit(&mut collection, &NullSink)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.attempted(), 0);
    assert_eq!(server.batch_count(), 0);
    assert_eq!(server.tokens_issued(), 0);
    assert!(gate.is_enabled());
}

#[tokio::test]
async fn test_partial_delete_failure_keeps_successes() {
    let (server, mut collection) = setup(&["a.pdf", "b.pdf", "c.pdf"]);
    let failing = server.files(&key())[1].file_id.clone();
    server.fail_file(failing);

    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        let id = id_of(&collection, name);
        collection.mark_for_deletion(id).unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let err = submitter(&server, &UploadGate::new())
        .submit(&mut collection, &tx)
        .await
        .unwrap_err();

    match err {
        DocfileError::Submission(failures) => {
            assert_eq!(failures.deletes_failed, 1);
            assert_eq!(failures.total(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    // No rollback: the two successful deletes are gone from the ledger and the server.
    assert_eq!(collection.changes().deletion_count(), 1);
    assert_eq!(collection.changes().deletions().next().unwrap().file_name, "b.pdf");
    let remaining: Vec<_> = server.files(&key()).into_iter().map(|r| r.file_name).collect();
    assert_eq!(remaining, vec!["b.pdf"]);

    assert_eq!(server.batch_count(), 1);
    let statuses: Vec<_> = drain(&mut rx).into_iter().map(|u| u.status).collect();
    assert_eq!(statuses.iter().filter(|s| **s == ItemStatus::Deleted).count(), 2);
    assert_eq!(statuses.iter().filter(|s| **s == ItemStatus::Failed).count(), 1);
}

#[tokio::test]
async fn test_rename_round_trip() {
    let (server, mut collection) = setup(&["report.pdf"]);
    let gate = UploadGate::new();
    let dialogs = ScriptedDialogs::new();
    dialogs.answer_name(Some("report (final)"));

    let id = id_of(&collection, "report.pdf");
    let renamed = orchestrator(&gate)
        .rename(&mut collection, id, &dialogs)
        .await
        .unwrap();
    assert_eq!(renamed.as_deref(), Some("report_(final).pdf"));
    assert!(collection.is_dirty());

    let prompt = &dialogs.prompts()[0];
    assert_eq!(prompt.stem, "report");
    assert_eq!(prompt.extension, ".pdf");

    let report = submitter(&server, &gate)
        .submit(&mut collection, &NullSink)
        .await
        .unwrap();
    assert_eq!(report.renames.succeeded, 1);

    let item = collection.item(id).unwrap();
    assert!(!item.renamed);
    assert_eq!(item.file_name, "report_(final).pdf");
    assert!(!collection.is_dirty());
    assert_eq!(server.files(&key())[0].file_name, "report_(final).pdf");

    // Full replace with transport metadata stripped.
    let batch = &server.batches()[0];
    assert!(batch.group.as_str().contains("file_renames"));
    match &batch.requests[0] {
        BatchRequest::Update {
            payload, method, ..
        } => {
            assert_eq!(*method, UpdateMethod::Put);
            assert!(payload.get("__metadata").is_none());
            assert_eq!(payload["FileName"], "report_(final).pdf");
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[tokio::test]
async fn test_rename_rejects_collision() {
    let (_server, mut collection) = setup(&["a.pdf", "b.pdf"]);
    let gate = UploadGate::new();
    let dialogs = ScriptedDialogs::new();
    dialogs.answer_name(Some("b"));

    let id = id_of(&collection, "a.pdf");
    let err = orchestrator(&gate)
        .rename(&mut collection, id, &dialogs)
        .await
        .unwrap_err();
    assert!(matches!(err, DocfileError::NameCollision { .. }));
    assert!(!collection.is_dirty());
}

#[tokio::test]
async fn test_upload_stores_file_and_reports_progress() {
    let (server, mut collection) = setup(&["scan.pdf"]);
    let gate = UploadGate::new();
    let transport = MemoryTransport::new(1000).storing_on(server.clone());
    let released = transport.released_flag();

    let id = orchestrator(&gate)
        .attach(&mut collection, FileSelection::selected("scan.pdf"), Box::new(transport))
        .unwrap();
    assert_eq!(collection.item(id).unwrap().file_name, "scan_(1).pdf");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = submitter(&server, &gate)
        .submit(&mut collection, &tx)
        .await
        .unwrap();

    assert_eq!(report.uploads.succeeded, 1);
    assert_eq!(collection.changes().upload_count(), 0);
    assert!(released.load(Ordering::Acquire));
    assert_eq!(server.tokens_issued(), 1);
    assert!(server.files(&key()).iter().any(|r| r.file_name == "scan_(1).pdf"));

    let statuses: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|u| u.class == OperationClass::Upload)
        .map(|u| u.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            ItemStatus::Queued,
            ItemStatus::Progress(50),
            ItemStatus::Transferred,
            ItemStatus::Uploaded,
        ]
    );

    let finished = &report.finished_uploads;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, id);
    assert_eq!(finished[0].upload_status, UploadStatus::Uploaded);
}

#[tokio::test]
async fn test_dropped_file_keeps_payload() {
    let (server, mut collection) = setup(&[]);
    let gate = UploadGate::new();
    let selection = FileSelection::dropped(DroppedFile {
        name: "mail.msg".to_string(),
        data: b"From: a".to_vec(),
    });
    let transport = MemoryTransport::new(7).storing_on(server.clone());
    let sent = transport.sent_request();

    let id = orchestrator(&gate)
        .attach(&mut collection, selection, Box::new(transport))
        .unwrap();
    assert!(collection.changes().pending_upload(id).unwrap().was_dropped());

    submitter(&server, &gate)
        .submit(&mut collection, &NullSink)
        .await
        .unwrap();
    assert_eq!(server.files(&key())[0].file_name, "mail.msg");

    let request = sent.get().unwrap();
    assert_eq!(request.url, DocfileConfig::default().upload_url());
    assert_eq!(request.file_name, "mail.msg");
    assert_eq!(
        request.header(keys::SLUG_HEADER),
        Some("***mail.msg***BUS2012***4500000001***ZDO***")
    );
    assert_eq!(request.header(keys::CSRF_HEADER), Some("token-1"));
    assert_eq!(
        request.header(keys::CONTENT_TYPE_HEADER),
        Some("application/vnd.ms-outlook")
    );
    match &request.source {
        UploadSource::Dropped(file) => assert_eq!(file.data, b"From: a"),
        other => panic!("unexpected source: {other:?}"),
    }
}

#[tokio::test]
async fn test_each_cycle_sends_a_fresh_token() {
    let (server, mut collection) = setup(&[]);
    let gate = UploadGate::new();
    let orchestrator = orchestrator(&gate);
    let submitter = submitter(&server, &gate);

    let mut sent = Vec::new();
    for name in ["a.pdf", "b.pdf"] {
        let transport = MemoryTransport::new(10);
        sent.push(transport.sent_request());
        orchestrator
            .attach(&mut collection, FileSelection::selected(name), Box::new(transport))
            .unwrap();
        submitter.submit(&mut collection, &NullSink).await.unwrap();
    }

    let tokens: Vec<_> = sent
        .iter()
        .map(|s| s.get().unwrap().header(keys::CSRF_HEADER).map(str::to_string))
        .collect();
    assert_eq!(tokens, vec![Some("token-1".to_string()), Some("token-2".to_string())]);

    // Only message files get the content-type override.
    assert!(sent[0].get().unwrap().header(keys::CONTENT_TYPE_HEADER).is_none());
    assert_eq!(sent[0].get().unwrap().source, UploadSource::Selected);
}

#[tokio::test]
async fn test_upload_error_status_counts_as_failure() {
    let (server, mut collection) = setup(&[]);
    let gate = UploadGate::new();
    let transport = MemoryTransport::with_steps(10, vec![TransferStep::Complete(500)]);
    let released = transport.released_flag();
    let id = orchestrator(&gate)
        .attach(&mut collection, FileSelection::selected("a.pdf"), Box::new(transport))
        .unwrap();

    let display = RecordingDisplay::new();
    let err = submitter(&server, &gate)
        .submit(&mut collection, &display)
        .await
        .unwrap_err();
    assert!(matches!(err, DocfileError::Submission(f) if f.uploads_failed == 1));
    let last = display.updates().pop().unwrap();
    assert_eq!(last.item, id);
    assert_eq!(last.status, ItemStatus::Failed);

    // Released whatever the outcome.
    assert!(released.load(Ordering::Acquire));
    assert_eq!(collection.changes().upload_count(), 0);
    assert!(server.files(&key()).is_empty());
}

#[tokio::test]
async fn test_token_failure_keeps_uploads_pending() {
    let (server, mut collection) = setup(&[]);
    server.fail_security_token();
    let gate = UploadGate::new();
    orchestrator(&gate)
        .attach(&mut collection, FileSelection::selected("a.pdf"), Box::new(MemoryTransport::new(10)))
        .unwrap();

    let err = submitter(&server, &gate)
        .submit(&mut collection, &NullSink)
        .await
        .unwrap_err();
    assert!(matches!(err, DocfileError::Submission(f) if f.uploads_failed == 1));
    assert_eq!(collection.changes().upload_count(), 1);
    assert!(gate.is_enabled());
}

#[tokio::test]
async fn test_abort_mid_progress_settles_without_failure() {
    let (server, mut collection) = setup(&[]);
    let gate = UploadGate::new();
    let transport = MemoryTransport::with_steps(
        100,
        vec![TransferStep::Progress(40), TransferStep::WaitForCancel],
    );
    let released = transport.released_flag();
    let id = orchestrator(&gate)
        .attach(&mut collection, FileSelection::selected("big.iso"), Box::new(transport))
        .unwrap();
    let handle = collection.abort_handle(id).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let submitter = submitter(&server, &gate);
    let (result, _) = tokio::join!(submitter.submit(&mut collection, &tx), async {
        while let Some(update) = rx.recv().await {
            if update.item == id && update.status == ItemStatus::Progress(40) {
                handle.abort();
                break;
            }
        }
    });

    let report = result.unwrap();
    assert_eq!(report.uploads.succeeded, 0);
    assert_eq!(report.uploads.failed, 0);
    assert!(report.uploads.is_settled());
    assert!(handle.is_aborted());
    assert!(released.load(Ordering::Acquire));
    assert!(collection.item(id).is_none());
    assert!(!collection.is_dirty());
}

#[tokio::test]
async fn test_second_submit_fails_fast() {
    let (server, mut collection) = setup(&["a.pdf"]);
    let id = id_of(&collection, "a.pdf");
    collection.mark_for_deletion(id).unwrap();

    let ticket = collection.submission_flag().try_acquire().unwrap();
    let err = submitter(&server, &UploadGate::new())
        .submit(&mut collection, &NullSink)
        .await
        .unwrap_err();
    assert!(matches!(err, DocfileError::ConcurrencyGuard { .. }));
    assert_eq!(server.batch_count(), 0);

    drop(ticket);
    assert!(
        submitter(&server, &UploadGate::new())
            .submit(&mut collection, &NullSink)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_uploads_disabled_while_saving() {
    let (server, mut saving) = setup(&[]);
    let mut other = AttachmentCollection::new(CollectionKey::new("BUS2012", "4500000002", "ZDO"));
    let gate = UploadGate::new();
    let orchestrator = orchestrator(&gate);
    orchestrator
        .attach(&mut saving, FileSelection::selected("a.pdf"), Box::new(MemoryTransport::new(10)))
        .unwrap();

    let submitter = submitter(&server, &gate);
    let (result, attached) = tokio::join!(submitter.submit(&mut saving, &NullSink), async {
        orchestrator.attach(
            &mut other,
            FileSelection::selected("b.pdf"),
            Box::new(MemoryTransport::new(10)),
        )
    });

    assert!(result.is_ok());
    assert!(matches!(attached, Err(DocfileError::UploadsDisabled)));
    assert!(gate.is_enabled());
    assert!(orchestrator.uploads_enabled());
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_timeout_restores_controls() {
    let (_server, mut collection) = setup(&["a.pdf"]);
    let gate = UploadGate::new();
    let mut placeholders = ScriptedPlaceholders::new();
    let dialogs = ScriptedDialogs::new();
    let before = collection.controls();

    let err = orchestrator(&gate)
        .add_file(
            &mut collection,
            FileSelection::selected("b.pdf"),
            &mut placeholders,
            &dialogs,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DocfileError::MaterializationTimeout { retries: 20 }));
    assert_eq!(collection.controls(), before);
    assert!(collection.controls().add_visible);
    assert!(!collection.is_dirty());
    assert!(dialogs.prompts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_add_file_binds_late_placeholder() {
    let (_server, mut collection) = setup(&["scan.pdf"]);
    let gate = UploadGate::new();
    let mut placeholders = ScriptedPlaceholders::new();
    placeholders.materialize_in(Duration::from_millis(1500), Box::new(MemoryTransport::new(10)));
    let dialogs = ScriptedDialogs::new();
    dialogs.answer_name(Some("scan final"));

    let id = orchestrator(&gate)
        .add_file(
            &mut collection,
            FileSelection::selected("scan.pdf"),
            &mut placeholders,
            &dialogs,
        )
        .await
        .unwrap();

    // Auto-named on arrival, then renamed through the dialog.
    assert_eq!(dialogs.prompts()[0].stem, "scan_(1)");
    let placeholder = collection.item(id).unwrap();
    assert_eq!(placeholder.file_name, "scan_final.pdf");
    assert!(placeholder.is_placeholder());

    let controls = collection.controls();
    assert!(controls.add_visible);
    assert!(!controls.search_enabled);
    assert!(controls.changed);
    assert_eq!(collection.snapshot().items[0].id, id);
}

#[tokio::test(start_paused = true)]
async fn test_add_file_asks_again_after_rejected_name() {
    let (_server, mut collection) = setup(&["a.pdf", "b.pdf"]);
    let gate = UploadGate::new();
    let mut placeholders = ScriptedPlaceholders::new();
    placeholders.materialize_in(Duration::from_millis(100), Box::new(MemoryTransport::new(10)));
    let dialogs = ScriptedDialogs::new();
    dialogs.answer_name(Some("b"));
    dialogs.answer_name(Some("c"));

    let id = orchestrator(&gate)
        .add_file(
            &mut collection,
            FileSelection::selected("new.pdf"),
            &mut placeholders,
            &dialogs,
        )
        .await
        .unwrap();

    let prompts = dialogs.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].error.is_none());
    assert!(prompts[1].error.as_deref().unwrap().contains("b.pdf"));
    assert_eq!(collection.item(id).unwrap().file_name, "c.pdf");
    assert!(collection.controls().add_visible);
}

#[tokio::test]
async fn test_delete_requires_confirmation() {
    let (_server, mut collection) = setup(&["a.pdf"]);
    let gate = UploadGate::new();
    let orchestrator = orchestrator(&gate);
    let id = id_of(&collection, "a.pdf");

    let declined = orchestrator
        .delete(&mut collection, id, &ScriptedDialogs::declining())
        .await
        .unwrap();
    assert!(!declined);
    assert!(!collection.is_dirty());

    let confirmed = orchestrator
        .delete(&mut collection, id, &ScriptedDialogs::new())
        .await
        .unwrap();
    assert!(confirmed);
    assert!(collection.changes().is_marked_for_deletion(id));
}

#[tokio::test]
async fn test_delete_pending_upload_releases_transport() {
    let (_server, mut collection) = setup(&[]);
    let gate = UploadGate::new();
    let orchestrator = orchestrator(&gate);
    let transport = MemoryTransport::new(10);
    let released = transport.released_flag();
    let id = orchestrator
        .attach(&mut collection, FileSelection::selected("a.pdf"), Box::new(transport))
        .unwrap();
    assert!(!collection.controls().search_enabled);

    assert!(
        orchestrator
            .delete(&mut collection, id, &ScriptedDialogs::new())
            .await
            .unwrap()
    );
    assert!(released.load(Ordering::Acquire));
    assert!(collection.is_empty());
    assert!(collection.controls().search_enabled);
    assert_eq!(collection.changes().deletion_count(), 0);
}

#[tokio::test]
async fn test_file_limit_blocks_adds() {
    let (_server, collection) = setup(&["a.pdf", "b.pdf"]);
    let mut collection = collection.with_max_files(2);
    let err = orchestrator(&UploadGate::new())
        .attach(&mut collection, FileSelection::selected("c.pdf"), Box::new(MemoryTransport::new(1)))
        .unwrap_err();
    assert!(matches!(err, DocfileError::FileLimitReached { limit: 2, .. }));
}

#[tokio::test]
async fn test_save_with_nothing_changed() {
    let (server, collection) = setup(&["a.pdf"]);
    let controller =
        ReconciliationController::new(submitter(&server, &UploadGate::new()), texts());
    let display = RecordingDisplay::new();

    let outcome = controller
        .save(&mut [collection], &CountingBinding::default(), &display)
        .await;
    assert!(matches!(outcome, SaveOutcome::NothingToSave));
    assert!(!outcome.had_changes());
    assert_eq!(display.state(), DisplayState::Closed);
}

#[tokio::test]
async fn test_save_uses_distinct_groups_and_refreshes() {
    let server = Arc::new(MemoryDataClient::new(&DocfileConfig::default()));
    let other_key = CollectionKey::new("BUS2012", "4500000002", "ZDO");
    server.add_file(&key(), "a.pdf", "0001");
    server.add_file(&other_key, "b.pdf", "0001");
    let mut collections = [
        AttachmentCollection::from_records(key(), server.files(&key())),
        AttachmentCollection::from_records(other_key.clone(), server.files(&other_key)),
    ];
    for collection in &mut collections {
        let id = collection.items().next().unwrap().id;
        collection.mark_for_deletion(id).unwrap();
    }

    let gate = UploadGate::new();
    let controller = ReconciliationController::new(submitter(&server, &gate), texts());
    let display = RecordingDisplay::new();
    let binding = CountingBinding::default();
    let outcome = controller.save(&mut collections, &binding, &display).await;

    assert!(outcome.is_success());
    assert!(outcome.had_changes());
    let batches = server.batches();
    assert_eq!(batches.len(), 2);
    assert_ne!(batches[0].group, batches[1].group);
    assert!(collections.iter().all(|c| !c.is_dirty() && c.is_empty()));
    assert_eq!(display.state(), DisplayState::Closed);
    assert_eq!(binding.refreshes(), 0);
    assert!(gate.is_enabled());
}

#[tokio::test]
async fn test_failed_save_keeps_local_edits() {
    let (server, mut collection) = setup(&["a.pdf", "b.pdf"]);
    let failing = server.files(&key())[0].file_id.clone();
    server.fail_file(failing);
    let id = id_of(&collection, "a.pdf");
    collection.mark_for_deletion(id).unwrap();

    let controller =
        ReconciliationController::new(submitter(&server, &UploadGate::new()), texts());
    let display = RecordingDisplay::new();
    let binding = CountingBinding::default();
    let mut collections = [collection];
    let outcome = controller.save(&mut collections, &binding, &display).await;

    match &outcome {
        SaveOutcome::Failed { errors, .. } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].0, key());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(display.state(), DisplayState::Dismissable);
    assert!(display.updates().iter().any(|u| u.status.is_failure()));
    assert_eq!(binding.refreshes(), 1);
    assert!(collections[0].changes().is_marked_for_deletion(id));
}

#[tokio::test]
async fn test_refresh_failure_after_submit_is_reported() {
    let (server, mut collection) = setup(&["a.pdf", "b.pdf"]);
    let id = id_of(&collection, "a.pdf");
    collection.mark_for_deletion(id).unwrap();
    server.fail_listing();

    let controller =
        ReconciliationController::new(submitter(&server, &UploadGate::new()), texts());
    let display = RecordingDisplay::new();
    let mut collections = [collection];
    let outcome = controller
        .save(&mut collections, &CountingBinding::default(), &display)
        .await;

    match &outcome {
        SaveOutcome::Failed { reports, errors } => {
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].deletes.succeeded, 1);
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0].1, DocfileError::Client(_)));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(display.state(), DisplayState::Dismissable);
    assert_eq!(server.files(&key()).len(), 1);
}

#[tokio::test]
async fn test_cancel_discards_everything() {
    let (server, mut collection) = setup(&["a.pdf", "b.pdf"]);
    let gate = UploadGate::new();
    let transport = MemoryTransport::new(10);
    let released = transport.released_flag();
    orchestrator(&gate)
        .attach(&mut collection, FileSelection::selected("c.pdf"), Box::new(transport))
        .unwrap();
    let id = id_of(&collection, "a.pdf");
    collection.mark_for_deletion(id).unwrap();
    let id = id_of(&collection, "b.pdf");
    collection.mark_renamed(id, "d.pdf").unwrap();

    let controller = ReconciliationController::new(submitter(&server, &gate), texts());
    let binding = CountingBinding::default();
    let mut collections = [collection];
    controller.cancel(&mut collections, &binding).await.unwrap();

    let collection = &collections[0];
    assert!(!collection.is_dirty());
    assert_eq!(collection.len(), 2);
    assert!(collection.items().any(|item| item.file_name == "b.pdf"));
    assert!(collection.controls().search_enabled);
    assert!(released.load(Ordering::Acquire));
    assert_eq!(binding.refreshes(), 1);
    assert_eq!(server.batch_count(), 0);
}
