//! Core types and rules for docfile.
//!
//! This crate holds the plain data behind an attachment collection
//! (items, collection keys, server records), the file-naming rules,
//! keyed resource addressing for the OData file service, and the
//! shared error and configuration types.

mod config;
mod entity;
mod error;
mod item;
pub mod keys;
pub mod naming;

pub use config::{ConfigError, DocfileConfig, DocfileConfigBuilder};
pub use entity::{EntityKind, prepare_for_update};
pub use error::{ClientError, DocfileError, SubmissionError};
pub use item::{AttachmentItem, CollectionKey, FileRecord, ItemId, UploadStatus};
pub use naming::NameResolver;
