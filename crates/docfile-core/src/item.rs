//! Attachment item and collection key types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use strum::Display;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Local identity of an item within the client. Stable across renames,
/// unlike the file name, and present before the server assigns a file id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Create an ItemId from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Mint a fresh, process-unique id.
    pub fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Composite key of the business record a collection belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionKey {
    pub object_type: String,
    pub object_id: String,
    pub document_type: String,
}

impl CollectionKey {
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        document_type: impl Into<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            document_type: document_type.into(),
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.object_type, self.object_id, self.document_type
        )
    }
}

/// Upload lifecycle of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Persisted on the server, nothing in flight.
    #[default]
    None,
    /// Placeholder waiting for the next save.
    PendingUpload,
    /// Transfer in progress.
    Uploading,
    /// Transfer finished with a success status.
    Uploaded,
    /// Transfer finished with a failure status.
    Failed,
}

/// One file of an attachment collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentItem {
    pub id: ItemId,
    /// Server-assigned id, absent until uploaded.
    pub file_id: Option<String>,
    pub file_name: String,
    pub document_number: String,
    pub upload_status: UploadStatus,
    /// Set when the name was changed locally and not yet saved.
    pub renamed: bool,
}

impl AttachmentItem {
    /// An item that already exists on the server.
    pub fn persisted(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        document_number: impl Into<String>,
    ) -> Self {
        Self {
            id: ItemId::next(),
            file_id: Some(file_id.into()),
            file_name: file_name.into(),
            document_number: document_number.into(),
            upload_status: UploadStatus::None,
            renamed: false,
        }
    }

    /// A local stand-in for a file that has not been uploaded yet.
    pub fn placeholder(file_name: impl Into<String>) -> Self {
        Self {
            id: ItemId::next(),
            file_id: None,
            file_name: file_name.into(),
            document_number: String::new(),
            upload_status: UploadStatus::PendingUpload,
            renamed: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.file_id.is_none()
    }

    /// Whether the item has a pending, saveable rename.
    pub fn has_pending_rename(&self) -> bool {
        self.renamed && self.upload_status != UploadStatus::PendingUpload
    }
}

/// A file row as returned by the server's file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileRecord {
    pub file_id: String,
    pub file_name: String,
    #[serde(rename = "Documentnumber")]
    pub document_number: String,
    #[serde(rename = "Documenttype", default)]
    pub document_type: String,
    #[serde(rename = "Objecttype", default)]
    pub object_type: String,
    #[serde(rename = "Objectkey", default)]
    pub object_key: String,
}

impl FileRecord {
    pub fn new(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        document_number: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: file_name.into(),
            document_number: document_number.into(),
            document_type: String::new(),
            object_type: String::new(),
            object_key: String::new(),
        }
    }

    /// Whether this record belongs to the collection identified by `key`.
    pub fn belongs_to(&self, key: &CollectionKey) -> bool {
        self.object_key == key.object_id
            && self.object_type == key.object_type
            && self.document_type == key.document_type
    }

    pub fn into_item(self) -> AttachmentItem {
        AttachmentItem::persisted(self.file_id, self.file_name, self.document_number)
    }
}
