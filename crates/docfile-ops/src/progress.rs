//! Per-item status reporting and per-cycle outcome counters.

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::mpsc;

use docfile_core::ItemId;

use crate::texts::{TextKey, Texts};

/// The class of change a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum OperationClass {
    Delete,
    Rename,
    Upload,
}

impl OperationClass {
    /// Tag used when minting batch group ids.
    pub fn group_tag(&self) -> &'static str {
        match self {
            Self::Delete => "file_removes",
            Self::Rename => "file_renames",
            Self::Upload => "file_uploads",
        }
    }
}

/// Visible state of one item during a submission cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Request prepared, nothing transferred yet.
    Queued,
    /// Upload percentage below 100.
    Progress(u8),
    /// All bytes sent.
    Transferred,
    /// The server accepted the upload.
    Uploaded,
    Deleted,
    Renamed,
    Failed,
}

impl ItemStatus {
    /// Status for an upload progress report.
    pub fn from_bytes(loaded: u64, total: u64) -> Self {
        let percent = percentage(loaded, total);
        if percent >= 100 {
            Self::Transferred
        } else {
            Self::Progress(percent)
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Localized status text.
    pub fn label(&self, texts: &dyn Texts) -> String {
        match self {
            Self::Queued => "0%".to_string(),
            Self::Progress(p) => format!("{p}%"),
            Self::Transferred => format!("100% {}", texts.text(TextKey::Done)),
            Self::Uploaded => texts.text(TextKey::Uploaded),
            Self::Deleted => texts.text(TextKey::Deleted),
            Self::Renamed => texts.text(TextKey::Renamed),
            Self::Failed => texts.text(TextKey::Failed),
        }
    }
}

/// `floor(100 * loaded / total)`, clamped to 100. Unknown totals report 0.
pub fn percentage(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (u128::from(loaded) * 100 / u128::from(total)).min(100);
    percent as u8
}

/// A status change for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub class: OperationClass,
    pub item: ItemId,
    pub file_name: String,
    pub status: ItemStatus,
}

impl StatusUpdate {
    pub fn new(
        class: OperationClass,
        item: ItemId,
        file_name: impl Into<String>,
        status: ItemStatus,
    ) -> Self {
        Self {
            class,
            item,
            file_name: file_name.into(),
            status,
        }
    }
}

/// Receiver of per-item status changes.
pub trait StatusSink: Send + Sync {
    fn publish(&self, update: StatusUpdate);
}

impl StatusSink for mpsc::UnboundedSender<StatusUpdate> {
    fn publish(&self, update: StatusUpdate) {
        // A dropped receiver only means nobody is watching anymore.
        let _ = self.send(update);
    }
}

/// Sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn publish(&self, _update: StatusUpdate) {}
}

/// In-flight and failure counters of one operation class in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub class: OperationClass,
    /// Requests still waiting for a response.
    pub remaining: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SubmissionOutcome {
    pub fn new(class: OperationClass, total: usize) -> Self {
        Self {
            class,
            remaining: total,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        self.failed += 1;
    }

    /// An aborted request settles without counting as success or failure.
    pub fn record_abort(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Human-readable summary of the class result.
    pub fn summary(&self) -> String {
        let action = match self.class {
            OperationClass::Delete => "Deleted",
            OperationClass::Rename => "Renamed",
            OperationClass::Upload => "Uploaded",
        };

        if self.failed == 0 {
            format!("{} {} items", action, self.succeeded)
        } else {
            format!("{} {} items, {} failed", action, self.succeeded, self.failed)
        }
    }
}
