//! Save and cancel across every collection of a record.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};

use docfile_core::{CollectionKey, DocfileError};

use crate::client::DataClient;
use crate::collection::AttachmentCollection;
use crate::submitter::{BatchSubmitter, SubmitReport};
use crate::texts::{TextKey, Texts};
use crate::ui::{ProgressDisplay, RecordBinding};

/// Result of a save.
#[derive(Debug)]
pub enum SaveOutcome {
    /// No collection had pending changes.
    NothingToSave,
    /// Every dirty collection was submitted and refreshed.
    Saved { reports: Vec<SubmitReport> },
    /// At least one collection failed to submit or to refresh afterwards.
    /// Successful collections were refreshed; failed ones keep their local
    /// edits for a retry.
    Failed {
        reports: Vec<SubmitReport>,
        errors: Vec<(CollectionKey, DocfileError)>,
    },
}

impl SaveOutcome {
    /// `false` means the caller should tell the user nothing changed.
    pub fn had_changes(&self) -> bool {
        !matches!(self, Self::NothingToSave)
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

pub struct ReconciliationController<C: ?Sized> {
    submitter: BatchSubmitter<C>,
    texts: Arc<dyn Texts>,
}

impl<C: DataClient + ?Sized> ReconciliationController<C> {
    pub fn new(submitter: BatchSubmitter<C>, texts: Arc<dyn Texts>) -> Self {
        Self { submitter, texts }
    }

    pub fn submitter(&self) -> &BatchSubmitter<C> {
        &self.submitter
    }

    /// Submit every dirty collection concurrently.
    pub async fn save(
        &self,
        collections: &mut [AttachmentCollection],
        record: &dyn RecordBinding,
        display: &dyn ProgressDisplay,
    ) -> SaveOutcome {
        let dirty: Vec<&mut AttachmentCollection> =
            collections.iter_mut().filter(|c| c.is_dirty()).collect();
        if dirty.is_empty() {
            tracing::info!("{}", self.texts.text(TextKey::NothingChanged));
            return SaveOutcome::NothingToSave;
        }

        tracing::info!(collections = dirty.len(), "saving attachment changes");
        display.open(&self.texts.text(TextKey::StatusDialogTitle));

        let results = join_all(dirty.into_iter().map(|collection| async move {
            let result = self.submitter.submit(&mut *collection, display).await;
            (collection, result)
        }))
        .await;

        let mut reports = Vec::new();
        let mut errors = Vec::new();
        let mut settled = Vec::new();
        for (collection, result) in results {
            match result {
                Ok(report) => {
                    reports.push(report);
                    settled.push(collection);
                }
                Err(e) => {
                    tracing::warn!(collection = %collection.key(), error = %e, "save failed");
                    errors.push((collection.key().clone(), e));
                }
            }
        }

        // A collection whose refresh fails still shows its pre-save list.
        let refreshed = join_all(settled.into_iter().map(|collection| async move {
            let key = collection.key().clone();
            self.refresh_collection(collection).await.map_err(|e| (key, e))
        }))
        .await;
        for (key, e) in refreshed.into_iter().filter_map(Result::err) {
            tracing::warn!(collection = %key, error = %e, "could not refresh collection after save");
            errors.push((key, e));
        }

        if errors.is_empty() {
            display.close();
            tracing::info!(collections = reports.len(), "attachment changes saved");
            SaveOutcome::Saved { reports }
        } else {
            display.show_dismiss();
            if let Err(e) = record.refresh().await {
                tracing::warn!(error = %e, "could not refresh record");
            }
            tracing::warn!(
                failed = errors.len(),
                "{}",
                self.texts.text(TextKey::FileProcessError)
            );
            SaveOutcome::Failed { reports, errors }
        }
    }

    /// Discard every pending change and reload the record and its collections.
    pub async fn cancel(
        &self,
        collections: &mut [AttachmentCollection],
        record: &dyn RecordBinding,
    ) -> Result<(), DocfileError> {
        record.refresh().await?;
        try_join_all(collections.iter_mut().map(|c| self.refresh_collection(c))).await?;
        tracing::info!(collections = collections.len(), "attachment changes discarded");
        Ok(())
    }

    /// Replace a collection's items with server truth.
    pub async fn refresh_collection(
        &self,
        collection: &mut AttachmentCollection,
    ) -> Result<(), DocfileError> {
        let records = self.submitter.client().list_files(collection.key()).await?;
        tracing::debug!(collection = %collection.key(), files = records.len(), "collection refreshed");
        collection.reset(records);
        Ok(())
    }
}
