//! The pending-change ledger of one collection.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use tokio_util::sync::CancellationToken;

use docfile_core::{AttachmentItem, DocfileError, ItemId, UploadStatus};

use crate::transport::{UploadSource, UploadTransport};

/// Handle that aborts one in-flight upload.
#[derive(Debug, Clone)]
pub struct AbortHandle(CancellationToken);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// A placeholder item bound to the transport that will upload it.
pub struct PendingUpload {
    pub placeholder: AttachmentItem,
    pub(crate) transport: Box<dyn UploadTransport>,
    pub(crate) source: UploadSource,
    pub(crate) cancel: CancellationToken,
}

impl PendingUpload {
    pub fn new(
        placeholder: AttachmentItem,
        transport: Box<dyn UploadTransport>,
        source: UploadSource,
    ) -> Self {
        Self {
            placeholder,
            transport,
            source,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.placeholder.id
    }

    pub fn file_name(&self) -> &str {
        &self.placeholder.file_name
    }

    pub fn was_dropped(&self) -> bool {
        matches!(self.source, UploadSource::Dropped(_))
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(self.cancel.clone())
    }

    /// Abort any transfer and free the transport.
    pub(crate) fn release(mut self) {
        self.cancel.cancel();
        self.transport.release();
    }
}

impl fmt::Debug for PendingUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingUpload")
            .field("placeholder", &self.placeholder)
            .field("dropped", &self.was_dropped())
            .finish_non_exhaustive()
    }
}

/// Pending deletes, renames and uploads of one collection.
///
/// An item is in at most one of deletions and uploads; renames only ever
/// reference persisted items.
#[derive(Debug, Default)]
pub struct PendingChangeSet {
    pub(crate) deletions: IndexMap<ItemId, AttachmentItem>,
    pub(crate) renames: IndexSet<ItemId>,
    pub(crate) uploads: Vec<PendingUpload>,
}

impl PendingChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `item` for deletion. Marking the same item twice is a no-op.
    pub fn mark_for_deletion(&mut self, item: AttachmentItem) {
        self.renames.shift_remove(&item.id);
        self.deletions.entry(item.id).or_insert(item);
    }

    /// Rename a persisted item and record the pending rename.
    pub fn mark_renamed(
        &mut self,
        item: &mut AttachmentItem,
        new_name: impl Into<String>,
    ) -> Result<(), DocfileError> {
        if item.upload_status == UploadStatus::PendingUpload || item.is_placeholder() {
            return Err(DocfileError::RenamePendingUpload { item: item.id });
        }
        item.file_name = new_name.into();
        item.renamed = true;
        self.renames.insert(item.id);
        Ok(())
    }

    pub fn add_pending_upload(&mut self, upload: PendingUpload) {
        self.uploads.push(upload);
    }

    /// Drop a pending upload, releasing its transport. Returns the placeholder.
    pub fn remove_pending_upload(&mut self, id: ItemId) -> Option<AttachmentItem> {
        let index = self.uploads.iter().position(|u| u.id() == id)?;
        let upload = self.uploads.remove(index);
        let placeholder = upload.placeholder.clone();
        upload.release();
        Some(placeholder)
    }

    pub fn pending_upload(&self, id: ItemId) -> Option<&PendingUpload> {
        self.uploads.iter().find(|u| u.id() == id)
    }

    pub(crate) fn pending_upload_mut(&mut self, id: ItemId) -> Option<&mut PendingUpload> {
        self.uploads.iter_mut().find(|u| u.id() == id)
    }

    pub fn pending_uploads(&self) -> impl DoubleEndedIterator<Item = &PendingUpload> {
        self.uploads.iter()
    }

    pub fn deletions(&self) -> impl Iterator<Item = &AttachmentItem> {
        self.deletions.values()
    }

    pub fn renames(&self) -> impl Iterator<Item = &ItemId> {
        self.renames.iter()
    }

    pub fn is_marked_for_deletion(&self, id: ItemId) -> bool {
        self.deletions.contains_key(&id)
    }

    pub fn deletion_count(&self) -> usize {
        self.deletions.len()
    }

    pub fn rename_count(&self) -> usize {
        self.renames.len()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_dirty(&self) -> bool {
        !self.deletions.is_empty() || !self.uploads.is_empty() || !self.renames.is_empty()
    }

    /// Empty the ledger, releasing every pending transport.
    pub fn clear(&mut self) {
        self.deletions.clear();
        self.renames.clear();
        for upload in self.uploads.drain(..) {
            upload.release();
        }
    }
}
