//! The OData-like data client the pipeline submits against.

use async_trait::async_trait;
use serde_json::Value;

use docfile_core::keys::EntityPath;
use docfile_core::{ClientError, CollectionKey, FileRecord};

use crate::group::BatchGroupId;

/// HTTP method used for updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    /// Full replace. The file entities do not support partial updates.
    Put,
}

/// One request queued in a deferred batch group.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchRequest {
    Remove {
        path: EntityPath,
        change_set: String,
    },
    Update {
        path: EntityPath,
        payload: Value,
        method: UpdateMethod,
        change_set: String,
    },
}

impl BatchRequest {
    pub fn path(&self) -> &EntityPath {
        match self {
            Self::Remove { path, .. } | Self::Update { path, .. } => path,
        }
    }
}

/// Client for the backing file service.
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Root URL of the service.
    fn service_url(&self) -> &str;

    /// Flush a deferred batch group. Returns one result per request, in
    /// request order; an outer error means the whole batch failed.
    async fn submit_batch(
        &self,
        group: &BatchGroupId,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<Result<(), ClientError>>, ClientError>;

    /// Current state of an entity.
    async fn read_entity(&self, path: &EntityPath) -> Result<Value, ClientError>;

    /// A fresh security token for direct uploads.
    async fn security_token(&self) -> Result<String, ClientError>;

    /// Server truth for one collection.
    async fn list_files(&self, key: &CollectionKey) -> Result<Vec<FileRecord>, ClientError>;
}
