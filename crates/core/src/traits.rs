//! StorageApi trait definition
//!
//! This trait is the narrow operation interface of the storage SDK. The
//! adapter in `bucketfs-s3` is written against it, so the listing engine,
//! stat and watch never depend on a particular SDK.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::notification::{BucketNotification, NotificationRecord};
use crate::policy::PostPolicy;

/// Result type of a single SDK call
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Lazily paged enumeration from the SDK
pub type BackendStream<T> = BoxStream<'static, BackendResult<T>>;

/// Object body returned by a GET
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// A bucket returned by ListBuckets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: Option<jiff::Timestamp>,
}

/// A key returned by an object listing
///
/// Common prefixes of delimited listings are reported as zero-size entries
/// whose key ends with the delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<jiff::Timestamp>,
    pub storage_class: Option<String>,
}

/// An incomplete multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub key: String,
    pub upload_id: String,
    /// Sum of the uploaded parts
    pub size: i64,
    pub initiated: Option<jiff::Timestamp>,
}

/// Which object listing API to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListApiVersion {
    V1,
    V2,
}

/// Operations the adapter needs from a storage SDK
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// List all buckets owned by the credentials
    async fn list_buckets(&self) -> BackendResult<Vec<BucketInfo>>;

    /// Enumerate keys under `prefix`, grouped by `/` unless `recursive`
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
        version: ListApiVersion,
    ) -> BackendStream<ObjectEntry>;

    /// Enumerate incomplete multipart uploads under `prefix`
    fn list_incomplete_uploads(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> BackendStream<UploadEntry>;

    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool>;

    /// Create a bucket; an empty region means the backend default
    async fn make_bucket(&self, bucket: &str, region: &str) -> BackendResult<()>;

    async fn remove_bucket(&self, bucket: &str) -> BackendResult<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<ObjectReader>;

    /// Store `data` and return the number of bytes written
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<i64>;

    /// Server-side copy from `source` (`bucket/key`)
    async fn copy_object(&self, bucket: &str, key: &str, source: &str) -> BackendResult<()>;

    async fn remove_object(&self, bucket: &str, key: &str) -> BackendResult<()>;

    /// Abort every incomplete upload of `key`
    async fn remove_incomplete_upload(&self, bucket: &str, key: &str) -> BackendResult<()>;

    async fn get_bucket_policy(&self, bucket: &str, prefix: &str) -> BackendResult<String>;

    async fn set_bucket_policy(&self, bucket: &str, prefix: &str, policy: &str)
    -> BackendResult<()>;

    async fn list_bucket_policies(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> BackendResult<BTreeMap<String, String>>;

    async fn get_bucket_notification(&self, bucket: &str) -> BackendResult<BucketNotification>;

    async fn set_bucket_notification(
        &self,
        bucket: &str,
        config: &BucketNotification,
    ) -> BackendResult<()>;

    async fn remove_all_bucket_notification(&self, bucket: &str) -> BackendResult<()>;

    /// Subscribe to bucket events until `cancel` fires
    ///
    /// Each stream item is one notification message, which may carry
    /// several records.
    fn listen_bucket_notification(
        &self,
        bucket: &str,
        prefix: &str,
        suffix: &str,
        events: &[String],
        cancel: CancellationToken,
    ) -> BackendResult<BackendStream<Vec<NotificationRecord>>>;

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> BackendResult<String>;

    /// Sign a POST policy and return the form fields
    async fn presigned_post_policy(
        &self,
        policy: &PostPolicy,
    ) -> BackendResult<BTreeMap<String, String>>;
}
