//! In-memory storage backend for adapter tests
//!
//! Implements the listing side of `StorageApi` with real delimiter
//! grouping, storage classes, incomplete uploads and injectable failures.
//! Operations the tests don't need report `NotImplemented`.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use bucketfs_core::{
    BackendError, BackendResult, BackendStream, BucketInfo, BucketNotification, ListApiVersion,
    NotificationRecord, ObjectEntry, ObjectReader, PostPolicy, ResourceAddress, StorageApi,
    UploadEntry,
};
use bucketfs_s3::S3Client;

const DELIMITER: char = '/';

#[derive(Default)]
pub struct MemoryBackend {
    buckets: BTreeMap<String, BTreeMap<String, ObjectEntry>>,
    uploads: BTreeMap<String, Vec<UploadEntry>>,
    /// Keys that fail when enumerated
    failing_keys: HashMap<String, BackendError>,
    list_buckets_error: Option<BackendError>,
    pub list_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(mut self, name: &str) -> Self {
        self.buckets.entry(name.to_string()).or_default();
        self
    }

    pub fn object(self, bucket: &str, key: &str, size: i64) -> Self {
        self.object_with_class(bucket, key, size, None)
    }

    pub fn object_with_class(
        mut self,
        bucket: &str,
        key: &str,
        size: i64,
        storage_class: Option<&str>,
    ) -> Self {
        let entry = ObjectEntry {
            key: key.to_string(),
            size,
            last_modified: Some(jiff::Timestamp::UNIX_EPOCH),
            storage_class: storage_class.map(str::to_string),
        };
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        self
    }

    pub fn upload(mut self, bucket: &str, key: &str, size: i64) -> Self {
        let uploads = self.uploads.entry(bucket.to_string()).or_default();
        uploads.push(UploadEntry {
            key: key.to_string(),
            upload_id: format!("upload-{}", uploads.len()),
            size,
            initiated: Some(jiff::Timestamp::UNIX_EPOCH),
        });
        self
    }

    /// Enumerating `key` yields `code` instead of the entry
    pub fn failing_key(mut self, bucket: &str, key: &str, code: &str) -> Self {
        self = self.object(bucket, key, 1);
        self.failing_keys
            .insert(key.to_string(), BackendError::new(code, format!("{key} failed")));
        self
    }

    pub fn failing_list_buckets(mut self, code: &str) -> Self {
        self.list_buckets_error = Some(BackendError::new(code, "listing buckets failed"));
        self
    }

    pub fn into_client(self, url: &str) -> (S3Client, Arc<MemoryBackend>) {
        let backend = Arc::new(self);
        let client = S3Client::new(
            backend.clone(),
            ResourceAddress::parse(url).expect("valid test URL"),
        );
        (client, backend)
    }

    /// Keys visible under `prefix`, grouped at the delimiter unless recursive
    fn visible<'a>(
        keys: impl Iterator<Item = &'a str>,
        prefix: &str,
        recursive: bool,
    ) -> Vec<(String, bool)> {
        let mut seen = BTreeSet::new();
        let mut visible = Vec::new();
        for key in keys.filter(|k| k.starts_with(prefix)) {
            let rest = &key[prefix.len()..];
            let grouped = match rest.find(DELIMITER) {
                Some(i) if !recursive => {
                    Some(format!("{prefix}{}", &rest[..=i]))
                }
                _ => None,
            };
            match grouped {
                Some(common) => {
                    if seen.insert(common.clone()) {
                        visible.push((common, true));
                    }
                }
                None => {
                    if seen.insert(key.to_string()) {
                        visible.push((key.to_string(), false));
                    }
                }
            }
        }
        visible
    }

    fn no_such_bucket(bucket: &str) -> BackendError {
        BackendError::new("NoSuchBucket", format!("bucket {bucket} does not exist"))
    }

    fn unsupported<T>() -> BackendResult<T> {
        Err(BackendError::new("NotImplemented", "not supported by the memory backend"))
    }
}

#[async_trait]
impl StorageApi for MemoryBackend {
    async fn list_buckets(&self) -> BackendResult<Vec<BucketInfo>> {
        if let Some(err) = &self.list_buckets_error {
            return Err(err.clone());
        }
        Ok(self
            .buckets
            .keys()
            .map(|name| BucketInfo {
                name: name.clone(),
                creation_date: Some(jiff::Timestamp::UNIX_EPOCH),
            })
            .collect())
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
        _version: ListApiVersion,
    ) -> BackendStream<ObjectEntry> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let Some(objects) = self.buckets.get(bucket) else {
            return futures::stream::iter(vec![Err(Self::no_such_bucket(bucket))]).boxed();
        };

        let items: Vec<BackendResult<ObjectEntry>> =
            Self::visible(objects.keys().map(String::as_str), prefix, recursive)
                .into_iter()
                .map(|(key, common)| {
                    if common {
                        return Ok(ObjectEntry {
                            key,
                            size: 0,
                            last_modified: None,
                            storage_class: None,
                        });
                    }
                    match self.failing_keys.get(&key) {
                        Some(err) => Err(err.clone()),
                        None => Ok(objects[&key].clone()),
                    }
                })
                .collect();
        futures::stream::iter(items).boxed()
    }

    fn list_incomplete_uploads(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> BackendStream<UploadEntry> {
        if !self.buckets.contains_key(bucket) {
            return futures::stream::iter(vec![Err(Self::no_such_bucket(bucket))]).boxed();
        }
        let uploads = self.uploads.get(bucket).cloned().unwrap_or_default();
        let items: Vec<BackendResult<UploadEntry>> =
            Self::visible(uploads.iter().map(|u| u.key.as_str()), prefix, recursive)
                .into_iter()
                .flat_map(|(key, common)| {
                    if common {
                        return vec![Ok(UploadEntry {
                            key,
                            upload_id: String::new(),
                            size: 0,
                            initiated: None,
                        })];
                    }
                    uploads
                        .iter()
                        .filter(|u| u.key == key)
                        .cloned()
                        .map(Ok)
                        .collect()
                })
                .collect();
        futures::stream::iter(items).boxed()
    }

    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        Ok(self.buckets.contains_key(bucket))
    }

    async fn make_bucket(&self, _bucket: &str, _region: &str) -> BackendResult<()> {
        Self::unsupported()
    }

    async fn remove_bucket(&self, _bucket: &str) -> BackendResult<()> {
        Self::unsupported()
    }

    async fn get_object(&self, _bucket: &str, _key: &str) -> BackendResult<ObjectReader> {
        Self::unsupported()
    }

    async fn put_object(
        &self,
        _bucket: &str,
        _key: &str,
        _data: Vec<u8>,
        _content_type: &str,
    ) -> BackendResult<i64> {
        Self::unsupported()
    }

    async fn copy_object(&self, _bucket: &str, _key: &str, _source: &str) -> BackendResult<()> {
        Self::unsupported()
    }

    async fn remove_object(&self, _bucket: &str, _key: &str) -> BackendResult<()> {
        Self::unsupported()
    }

    async fn remove_incomplete_upload(&self, _bucket: &str, _key: &str) -> BackendResult<()> {
        Self::unsupported()
    }

    async fn get_bucket_policy(&self, _bucket: &str, _prefix: &str) -> BackendResult<String> {
        Self::unsupported()
    }

    async fn set_bucket_policy(
        &self,
        _bucket: &str,
        _prefix: &str,
        _policy: &str,
    ) -> BackendResult<()> {
        Self::unsupported()
    }

    async fn list_bucket_policies(
        &self,
        _bucket: &str,
        _prefix: &str,
    ) -> BackendResult<BTreeMap<String, String>> {
        Self::unsupported()
    }

    async fn get_bucket_notification(&self, _bucket: &str) -> BackendResult<BucketNotification> {
        Self::unsupported()
    }

    async fn set_bucket_notification(
        &self,
        _bucket: &str,
        _config: &BucketNotification,
    ) -> BackendResult<()> {
        Self::unsupported()
    }

    async fn remove_all_bucket_notification(&self, _bucket: &str) -> BackendResult<()> {
        Self::unsupported()
    }

    fn listen_bucket_notification(
        &self,
        _bucket: &str,
        _prefix: &str,
        _suffix: &str,
        _events: &[String],
        _cancel: CancellationToken,
    ) -> BackendResult<BackendStream<Vec<NotificationRecord>>> {
        Self::unsupported()
    }

    async fn presigned_get_object(
        &self,
        _bucket: &str,
        _key: &str,
        _expires: Duration,
    ) -> BackendResult<String> {
        Self::unsupported()
    }

    async fn presigned_post_policy(
        &self,
        _policy: &PostPolicy,
    ) -> BackendResult<BTreeMap<String, String>> {
        Self::unsupported()
    }
}
