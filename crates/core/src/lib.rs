//! bucketfs-core: Core types for presenting object storage as a resource tree
//!
//! This crate provides the SDK-independent parts of bucketfs, including:
//! - Address parsing and virtual-host/path-style resolution
//! - Bucket name validation
//! - The domain error taxonomy and backend error translation
//! - Listing entry and notification types
//! - The StorageApi trait for the storage SDK
//! - Host configuration
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! allowing for easy testing and other backends.

pub mod address;
pub mod config;
pub mod content;
pub mod error;
pub mod notification;
pub mod policy;
pub mod traits;

pub use address::{ResourceAddress, is_virtual_host_style, is_valid_bucket_name, validate_bucket_name};
pub use config::{Config, ConfigManager, HostConfig};
pub use content::{ClientContent, EntryType};
pub use error::{BackendError, Error, ErrorContext, Result, translate_error};
pub use notification::{
    Arn, BucketNotification, NotificationConfig, NotificationRecord, NotificationRule, TargetKind,
};
pub use policy::{KeyCondition, PostPolicy};
pub use traits::{
    BackendResult, BackendStream, BucketInfo, ListApiVersion, ObjectEntry, ObjectReader,
    StorageApi, UploadEntry,
};

#[cfg(any(test, feature = "mock"))]
pub use traits::MockStorageApi;
