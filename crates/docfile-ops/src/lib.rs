//! Pending-change pipeline for attachment collections.
//!
//! An [`AttachmentCollection`] keeps the files of one business record plus a
//! [`PendingChangeSet`] of local deletes, renames and uploads. The
//! [`UploadOrchestrator`] turns user actions into pending changes, the
//! [`BatchSubmitter`] sends them to a [`DataClient`] in batch groups, and the
//! [`ReconciliationController`] saves or discards every collection of a
//! record at once.

mod client;
mod collection;
mod gate;
mod group;
mod ledger;
pub mod memory;
mod progress;
mod reconcile;
mod submitter;
mod texts;
mod transport;
mod ui;
mod upload;

pub use client::{BatchRequest, DataClient, UpdateMethod};
pub use collection::{AttachmentCollection, CollectionSnapshot, ControlState};
pub use gate::{GateHold, SubmissionFlag, SubmissionTicket, UploadGate};
pub use group::BatchGroupId;
pub use ledger::{AbortHandle, PendingChangeSet, PendingUpload};
pub use progress::{
    ItemStatus, NullSink, OperationClass, StatusSink, StatusUpdate, SubmissionOutcome, percentage,
};
pub use reconcile::{ReconciliationController, SaveOutcome};
pub use submitter::{BatchSubmitter, SubmitReport};
pub use texts::{EnglishTexts, TextKey, Texts};
pub use transport::{
    DroppedFile, FileSelection, TransportEvent, UploadRequest, UploadSource, UploadTransport,
};
pub use ui::{Dialogs, PlaceholderSource, ProgressDisplay, RecordBinding, RenamePrompt};
pub use upload::{PollPolicy, UploadOrchestrator};
