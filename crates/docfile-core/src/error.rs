//! Error types for attachment operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::item::{CollectionKey, ItemId};

/// Errors that can occur while editing or saving an attachment collection.
#[derive(Debug, Error)]
pub enum DocfileError {
    /// A file name broke the naming rules.
    #[error("Invalid file name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// A file name is already used in the collection.
    #[error("'{name}' already exists")]
    NameCollision { name: String },

    /// Pending uploads are renamed through their placeholder, not the rename ledger.
    #[error("Item {item} is a pending upload and cannot be marked renamed")]
    RenamePendingUpload { item: ItemId },

    /// No item with this id in the collection.
    #[error("Unknown item {item}")]
    UnknownItem { item: ItemId },

    /// The transport or the server rejected a request.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// The collection already holds its maximum number of files.
    #[error("Collection {key} cannot hold more than {limit} files")]
    FileLimitReached { key: CollectionKey, limit: usize },

    /// Uploads are suppressed while a submission cycle is running.
    #[error("Uploads are disabled while changes are being saved")]
    UploadsDisabled,

    /// A save was attempted while a submission is still in flight.
    #[error("Collection {key} has operations in progress, wait until they finish")]
    ConcurrencyGuard { key: CollectionKey },

    /// The list control never materialized the placeholder for a new file.
    #[error("Placeholder did not appear after {retries} retries")]
    MaterializationTimeout { retries: u32 },

    /// One or more items of a submission cycle failed.
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Error reported by the data client.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DocfileError {
    /// Create an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a user-input problem rather than a server or transport one.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidName { .. } | Self::NameCollision { .. })
    }
}

/// Error returned by the backing data client.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ClientError {
    pub message: String,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Aggregated failure of a submission cycle. Items that succeeded stay
/// applied; only the counts of failed items are reported.
#[derive(Debug, Clone, Copy, Default, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Submission failed: {deletes_failed} deletes, {renames_failed} renames, {uploads_failed} uploads")]
pub struct SubmissionError {
    pub deletes_failed: usize,
    pub renames_failed: usize,
    pub uploads_failed: usize,
}

impl SubmissionError {
    pub fn total(&self) -> usize {
        self.deletes_failed + self.renames_failed + self.uploads_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_is_validation() {
        let err = DocfileError::invalid_name("a b", "Name cannot contain ' '");
        assert!(err.is_validation());
        assert!(err.to_string().contains("a b"));
    }

    #[test]
    fn test_submission_error_summary() {
        let err = SubmissionError {
            deletes_failed: 1,
            renames_failed: 0,
            uploads_failed: 2,
        };
        assert_eq!(err.total(), 3);
        assert_eq!(
            err.to_string(),
            "Submission failed: 1 deletes, 0 renames, 2 uploads"
        );
    }
}
