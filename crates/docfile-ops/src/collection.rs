//! Attachment collections: the items of one record plus their pending changes.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::watch;

use docfile_core::{AttachmentItem, CollectionKey, DocfileError, FileRecord, ItemId};

use crate::gate::SubmissionFlag;
use crate::ledger::{AbortHandle, PendingChangeSet, PendingUpload};

/// State of the controls around the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlState {
    pub add_visible: bool,
    pub search_enabled: bool,
    /// The parent record has unsaved changes.
    pub changed: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            add_visible: true,
            search_enabled: true,
            changed: false,
        }
    }
}

/// What a renderer needs to draw a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionSnapshot {
    /// Placeholders first (newest on top), then persisted items.
    pub items: Vec<AttachmentItem>,
    pub controls: ControlState,
    pub dirty: bool,
    pub pending_deletions: usize,
}

/// The attachment list of one business record.
#[derive(Debug)]
pub struct AttachmentCollection {
    pub(crate) key: CollectionKey,
    pub(crate) items: IndexMap<ItemId, AttachmentItem>,
    pub(crate) changes: PendingChangeSet,
    pub(crate) controls: ControlState,
    max_files: usize,
    submission: SubmissionFlag,
    published: watch::Sender<CollectionSnapshot>,
}

impl AttachmentCollection {
    pub fn new(key: CollectionKey) -> Self {
        let (published, _) = watch::channel(CollectionSnapshot::default());
        Self {
            key,
            items: IndexMap::new(),
            changes: PendingChangeSet::new(),
            controls: ControlState::default(),
            max_files: 0,
            submission: SubmissionFlag::default(),
            published,
        }
    }

    /// Bind a collection to server records.
    pub fn from_records(key: CollectionKey, records: Vec<FileRecord>) -> Self {
        let mut collection = Self::new(key);
        collection.reset(records);
        collection
    }

    /// Limit the number of files (0 = unlimited).
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self.update_add_control();
        self.publish();
        self
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    /// Persisted items still in the list.
    pub fn items(&self) -> impl Iterator<Item = &AttachmentItem> {
        self.items.values()
    }

    pub fn item(&self, id: ItemId) -> Option<&AttachmentItem> {
        self.items
            .get(&id)
            .or_else(|| self.changes.pending_upload(id).map(|u| &u.placeholder))
    }

    pub fn changes(&self) -> &PendingChangeSet {
        &self.changes
    }

    pub fn controls(&self) -> ControlState {
        self.controls
    }

    /// Number of visible items, placeholders included.
    pub fn len(&self) -> usize {
        self.items.len() + self.changes.upload_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names currently in use, placeholders included.
    pub fn file_names(&self) -> HashSet<String> {
        self.items
            .values()
            .map(|item| item.file_name.clone())
            .chain(self.changes.pending_uploads().map(|u| u.file_name().to_string()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.changes.is_dirty()
    }

    /// Whether another file may be added under the file limit.
    pub fn can_add(&self) -> bool {
        self.max_files == 0 || self.len() < self.max_files
    }

    pub fn submission_flag(&self) -> SubmissionFlag {
        self.submission.clone()
    }

    /// Move a persisted item from the list into the deletion ledger.
    pub fn mark_for_deletion(&mut self, id: ItemId) -> Result<(), DocfileError> {
        if self.changes.is_marked_for_deletion(id) {
            return Ok(());
        }
        let item = self
            .items
            .shift_remove(&id)
            .ok_or(DocfileError::UnknownItem { item: id })?;
        tracing::debug!(collection = %self.key, file = %item.file_name, "marked for deletion");
        self.changes.mark_for_deletion(item);
        self.note_local_change();
        self.update_add_control();
        self.publish();
        Ok(())
    }

    /// Rename an item. Persisted items get a pending rename; placeholders
    /// simply take the new name for their upload.
    pub fn mark_renamed(
        &mut self,
        id: ItemId,
        new_name: impl Into<String>,
    ) -> Result<(), DocfileError> {
        let new_name = new_name.into();
        if let Some(upload) = self.changes.pending_upload_mut(id) {
            upload.placeholder.file_name = new_name;
        } else {
            let item = self
                .items
                .get_mut(&id)
                .ok_or(DocfileError::UnknownItem { item: id })?;
            self.changes.mark_renamed(item, new_name)?;
        }
        self.note_local_change();
        self.publish();
        Ok(())
    }

    pub fn add_pending_upload(&mut self, upload: PendingUpload) {
        self.changes.add_pending_upload(upload);
        self.controls.changed = true;
        self.publish();
    }

    /// Drop a pending upload and release its transport. Search comes back
    /// once the last pending upload is gone.
    pub fn remove_pending_upload(&mut self, id: ItemId) -> Option<AttachmentItem> {
        let placeholder = self.changes.remove_pending_upload(id)?;
        if self.changes.upload_count() == 0 {
            self.controls.search_enabled = true;
        }
        self.update_add_control();
        self.publish();
        Some(placeholder)
    }

    pub fn abort_handle(&self, id: ItemId) -> Option<AbortHandle> {
        self.changes.pending_upload(id).map(PendingUpload::abort_handle)
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// A file is being added: hide add, disable search, flag the parent changed.
    pub(crate) fn begin_selection(&mut self) {
        self.controls.add_visible = false;
        self.note_local_change();
        self.publish();
    }

    /// Re-show the add control once an add attempt has settled.
    pub(crate) fn finish_selection(&mut self) {
        self.update_add_control();
        self.publish();
    }

    pub(crate) fn restore_controls(&mut self, controls: ControlState) {
        self.controls = controls;
        self.publish();
    }

    /// Show the add control if the file limit allows it.
    pub(crate) fn update_add_control(&mut self) {
        self.controls.add_visible = self.can_add();
    }

    /// Empty the ledger and clear every renamed flag.
    pub fn clear(&mut self) {
        self.changes.clear();
        for item in self.items.values_mut() {
            item.renamed = false;
        }
        self.publish();
    }

    /// Replace the items with server truth, discarding all pending changes.
    pub fn reset(&mut self, records: Vec<FileRecord>) {
        self.changes.clear();
        self.items = records
            .into_iter()
            .map(FileRecord::into_item)
            .map(|item| (item.id, item))
            .collect();
        self.controls = ControlState {
            add_visible: true,
            search_enabled: true,
            changed: false,
        };
        self.update_add_control();
        self.publish();
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        let mut items: Vec<AttachmentItem> = self
            .changes
            .pending_uploads()
            .rev()
            .map(|u| u.placeholder.clone())
            .collect();
        items.extend(self.items.values().cloned());

        CollectionSnapshot {
            items,
            controls: self.controls,
            dirty: self.is_dirty(),
            pending_deletions: self.changes.deletion_count(),
        }
    }

    /// Watch snapshots as the collection changes.
    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.published.send_replace(self.snapshot());
        self.published.subscribe()
    }

    pub(crate) fn publish(&self) {
        self.published.send_replace(self.snapshot());
    }

    fn note_local_change(&mut self) {
        self.controls.search_enabled = false;
        self.controls.changed = true;
    }
}
