//! Collaborators provided by the surrounding application: dialogs, the
//! list control that materializes placeholders, the parent record binding
//! and the status display.

use async_trait::async_trait;

use docfile_core::ClientError;

use crate::progress::StatusSink;
use crate::transport::UploadTransport;

/// Input for the rename dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePrompt {
    pub title: String,
    /// Current name without its extension, shown in the input field.
    pub stem: String,
    /// Extension (with dot) that is kept whatever the user types.
    pub extension: String,
    /// Characters the input must reject.
    pub forbidden: &'static [char],
    /// Why the previous answer was rejected.
    pub error: Option<String>,
}

/// Modal dialogs.
#[async_trait]
pub trait Dialogs: Send + Sync {
    /// Ask a yes/no question.
    async fn confirm(&self, title: &str, message: &str) -> bool;

    /// Ask for a new file stem. `None` means the dialog was cancelled.
    async fn prompt_name(&self, prompt: RenamePrompt) -> Option<String>;
}

/// The list control that turns a file selection into a pending entry.
///
/// Entries appear asynchronously after the selection with no completion
/// signal, so callers poll [`pending_len`](Self::pending_len) for growth.
pub trait PlaceholderSource: Send {
    /// Number of pending entries the control currently holds.
    fn pending_len(&self) -> usize;

    /// Take the transport of the pending entry at `index`.
    fn take_transport(&mut self, index: usize) -> Option<Box<dyn UploadTransport>>;
}

/// The business record the collections hang off.
#[async_trait]
pub trait RecordBinding: Send + Sync {
    /// Reload the record from the server.
    async fn refresh(&self) -> Result<(), ClientError>;
}

/// Shared status display of a save.
pub trait ProgressDisplay: StatusSink {
    fn open(&self, title: &str);

    fn close(&self);

    /// Let the user dismiss a display that stays open after failures.
    fn show_dismiss(&self);
}
