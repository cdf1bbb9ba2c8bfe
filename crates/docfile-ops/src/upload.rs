//! Adding, renaming and deleting files in a collection.

use std::sync::Arc;
use std::time::Duration;

use docfile_core::naming::{self, FORBIDDEN_CHARS, NameResolver};
use docfile_core::{AttachmentItem, DocfileConfig, DocfileError, ItemId};

use crate::collection::AttachmentCollection;
use crate::gate::UploadGate;
use crate::ledger::PendingUpload;
use crate::texts::{TextKey, Texts};
use crate::transport::{FileSelection, UploadTransport};
use crate::ui::{Dialogs, PlaceholderSource, RenamePrompt};

/// Bounded back-off for waiting on the list control.
///
/// The first check is immediate; each retry halves the wait before sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(2048),
            max_retries: 20,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &DocfileConfig) -> Self {
        Self {
            initial_interval: config.poll_initial_interval(),
            max_retries: config.poll_max_retries,
        }
    }

    /// Poll `ready` until it returns true. Returns the number of retries
    /// used, or `None` once they are exhausted.
    pub async fn wait<F>(&self, mut ready: F) -> Option<u32>
    where
        F: FnMut() -> bool,
    {
        if ready() {
            return Some(0);
        }

        let mut interval = self.initial_interval;
        let mut retries = 0;
        while retries < self.max_retries {
            retries += 1;
            interval /= 2;
            tokio::time::sleep(interval).await;
            if ready() {
                return Some(retries);
            }
        }
        None
    }
}

/// Drives new files from selection to a pending upload, and handles the
/// per-item rename and delete actions.
pub struct UploadOrchestrator {
    resolver: NameResolver,
    poll: PollPolicy,
    gate: UploadGate,
    texts: Arc<dyn Texts>,
}

impl UploadOrchestrator {
    pub fn new(config: &DocfileConfig, gate: UploadGate, texts: Arc<dyn Texts>) -> Self {
        Self {
            resolver: NameResolver::new(config.max_name_length),
            poll: PollPolicy::from_config(config),
            gate,
            texts,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    pub fn uploads_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    /// Add a file through a list control that materializes its pending
    /// entry asynchronously, then offer a rename. Rejected names are asked
    /// for again with the reason attached to the prompt.
    ///
    /// If the entry never shows up the controls are put back the way they
    /// were and [`DocfileError::MaterializationTimeout`] is returned.
    pub async fn add_file(
        &self,
        collection: &mut AttachmentCollection,
        selection: FileSelection,
        source: &mut dyn PlaceholderSource,
        dialogs: &dyn Dialogs,
    ) -> Result<ItemId, DocfileError> {
        self.check_can_add(collection)?;

        let saved = collection.controls();
        let baseline = source.pending_len();
        collection.begin_selection();

        let materialized = self.poll.wait(|| source.pending_len() > baseline).await;
        let transport = materialized
            .and_then(|retries| source.take_transport(baseline).map(|t| (t, retries)));
        let Some((transport, retries)) = transport else {
            tracing::warn!(
                collection = %collection.key(),
                file = %selection.name,
                retries = self.poll.max_retries,
                "placeholder never materialized"
            );
            collection.restore_controls(saved);
            collection.finish_selection();
            return Err(DocfileError::MaterializationTimeout {
                retries: self.poll.max_retries,
            });
        };
        tracing::debug!(collection = %collection.key(), retries, "placeholder materialized");

        let id = self.bind(collection, selection, transport);
        let renamed = self.rename_new_file(collection, id, dialogs).await;
        collection.finish_selection();
        renamed?;
        Ok(id)
    }

    /// Offer a rename of a freshly bound placeholder until the answer is
    /// accepted or the dialog is cancelled.
    async fn rename_new_file(
        &self,
        collection: &mut AttachmentCollection,
        id: ItemId,
        dialogs: &dyn Dialogs,
    ) -> Result<(), DocfileError> {
        let mut error = None;
        loop {
            match self.prompt_rename(collection, id, dialogs, error.take()).await {
                Err(e) if e.is_validation() => {
                    tracing::debug!(collection = %collection.key(), error = %e, "asking for another name");
                    error = Some(e.to_string());
                }
                result => return result.map(|_| ()),
            }
        }
    }

    /// Add a file whose transport is already at hand. The placeholder is
    /// bound synchronously, no polling involved.
    pub fn attach(
        &self,
        collection: &mut AttachmentCollection,
        selection: FileSelection,
        transport: Box<dyn UploadTransport>,
    ) -> Result<ItemId, DocfileError> {
        self.check_can_add(collection)?;
        collection.begin_selection();
        let id = self.bind(collection, selection, transport);
        collection.finish_selection();
        Ok(id)
    }

    fn check_can_add(&self, collection: &AttachmentCollection) -> Result<(), DocfileError> {
        if !self.gate.is_enabled() {
            return Err(DocfileError::UploadsDisabled);
        }
        if !collection.can_add() {
            return Err(DocfileError::FileLimitReached {
                key: collection.key().clone(),
                limit: collection.max_files(),
            });
        }
        Ok(())
    }

    fn bind(
        &self,
        collection: &mut AttachmentCollection,
        selection: FileSelection,
        transport: Box<dyn UploadTransport>,
    ) -> ItemId {
        let name = self.resolver.resolve(&collection.file_names(), &selection.name);
        let placeholder = AttachmentItem::placeholder(name);
        let id = placeholder.id;

        tracing::debug!(
            collection = %collection.key(),
            file = %placeholder.file_name,
            selected = %selection.name,
            "pending upload added"
        );
        collection.add_pending_upload(PendingUpload::new(placeholder, transport, selection.source));
        id
    }

    /// Ask for a new name and apply it.
    ///
    /// Returns the new name, or `None` when the dialog was cancelled or the
    /// name left unchanged.
    pub async fn rename(
        &self,
        collection: &mut AttachmentCollection,
        id: ItemId,
        dialogs: &dyn Dialogs,
    ) -> Result<Option<String>, DocfileError> {
        self.prompt_rename(collection, id, dialogs, None).await
    }

    async fn prompt_rename(
        &self,
        collection: &mut AttachmentCollection,
        id: ItemId,
        dialogs: &dyn Dialogs,
        error: Option<String>,
    ) -> Result<Option<String>, DocfileError> {
        let current = collection
            .item(id)
            .map(|item| item.file_name.clone())
            .ok_or(DocfileError::UnknownItem { item: id })?;
        let (stem, extension) = naming::split_extension(&current);
        let extension = extension.to_string();

        let prompt = RenamePrompt {
            title: self.texts.text(TextKey::RenameTitle),
            stem: stem.to_string(),
            extension: extension.clone(),
            forbidden: FORBIDDEN_CHARS,
            error,
        };
        let Some(input) = dialogs.prompt_name(prompt).await else {
            return Ok(None);
        };

        let proposed = naming::compose_rename_input(&input, &extension);
        self.apply_rename(collection, id, &current, &proposed)
    }

    /// Validate `proposed` against the other names of the collection and
    /// rename item `id` to it.
    pub fn rename_to(
        &self,
        collection: &mut AttachmentCollection,
        id: ItemId,
        proposed: &str,
    ) -> Result<Option<String>, DocfileError> {
        let current = collection
            .item(id)
            .map(|item| item.file_name.clone())
            .ok_or(DocfileError::UnknownItem { item: id })?;
        self.apply_rename(collection, id, &current, proposed)
    }

    fn apply_rename(
        &self,
        collection: &mut AttachmentCollection,
        id: ItemId,
        current: &str,
        proposed: &str,
    ) -> Result<Option<String>, DocfileError> {
        let mut others = collection.file_names();
        others.remove(current);

        let Some(name) = self.resolver.validate_rename(&others, current, proposed)? else {
            return Ok(None);
        };
        collection.mark_renamed(id, name.clone())?;
        tracing::debug!(collection = %collection.key(), from = %current, to = %name, "renamed");
        Ok(Some(name))
    }

    /// Delete an item after confirmation.
    ///
    /// Persisted items are marked for deletion; pending uploads are aborted
    /// and dropped together with their transport. Returns whether the user
    /// confirmed.
    pub async fn delete(
        &self,
        collection: &mut AttachmentCollection,
        id: ItemId,
        dialogs: &dyn Dialogs,
    ) -> Result<bool, DocfileError> {
        let file_name = collection
            .item(id)
            .map(|item| item.file_name.clone())
            .ok_or(DocfileError::UnknownItem { item: id })?;

        let title = self.texts.text(TextKey::DeleteFileTitle);
        let message = self.texts.format(TextKey::DeleteFileMessage, &[file_name.as_str()]);
        if !dialogs.confirm(&title, &message).await {
            return Ok(false);
        }

        if let Some(handle) = collection.abort_handle(id) {
            handle.abort();
            collection.remove_pending_upload(id);
            tracing::debug!(collection = %collection.key(), file = %file_name, "pending upload discarded");
        } else {
            collection.mark_for_deletion(id)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poll_halves_interval() {
        let policy = PollPolicy::default();
        let start = tokio::time::Instant::now();
        let mut calls = 0;
        let retries = policy
            .wait(|| {
                calls += 1;
                calls == 3
            })
            .await;
        assert_eq!(retries, Some(2));
        assert_eq!(start.elapsed(), Duration::from_millis(1024 + 512));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up() {
        let policy = PollPolicy {
            initial_interval: Duration::from_millis(64),
            max_retries: 4,
        };
        let mut calls = 0;
        assert_eq!(
            policy
                .wait(|| {
                    calls += 1;
                    false
                })
                .await,
            None
        );
        assert_eq!(calls, 5);
    }
}
