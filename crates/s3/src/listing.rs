//! Hierarchical listing over a flat key space
//!
//! Four strategies share one shape: flat, flat-incomplete, recursive and
//! recursive-incomplete. Each resolves the client's address once, opens the
//! backend enumeration under the client lock and then yields entries as the
//! consumer pulls them.
//!
//! Per-item errors are yielded as `Err` items. Whether the stream keeps
//! going afterwards is decided by [`ItemErrorPolicy`]. A failure to list
//! buckets always ends the stream after its error item.

use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use bucketfs_core::address::join_path;
use bucketfs_core::{
    BackendError, BackendStream, BucketInfo, ClientContent, Error, ErrorContext, ListApiVersion,
    ObjectEntry, ResourceAddress, Result, StorageApi, UploadEntry, translate_error,
};

use crate::client::S3Client;

/// Storage classes whose objects cannot be read without a restore
const ARCHIVED_STORAGE_CLASSES: &[&str] = &["GLACIER", "DEEP_ARCHIVE"];

/// Lazy sequence of listing entries
pub type ContentStream = BoxStream<'static, Result<ClientContent>>;

/// What to do after a per-item error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemErrorPolicy {
    /// Yield the error and keep enumerating
    #[default]
    Continue,
    /// Yield the error and end the stream
    Stop,
}

/// Options for a listing
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Descend below the first separator
    pub recursive: bool,
    /// Enumerate incomplete uploads instead of objects
    pub incomplete: bool,
    pub on_item_error: ItemErrorPolicy,
    /// Ends the stream when cancelled
    pub cancel: Option<CancellationToken>,
}

impl S3Client {
    /// List at the client's address
    ///
    /// Non-recursive listings group keys at the separator and report the
    /// groups as directories. Each call starts a fresh backend enumeration.
    pub fn list(&self, recursive: bool, incomplete: bool) -> ContentStream {
        self.list_with(ListOptions {
            recursive,
            incomplete,
            ..Default::default()
        })
    }

    /// List with explicit error policy and cancellation
    pub fn list_with(&self, options: ListOptions) -> ContentStream {
        tracing::debug!(
            target_url = %self.target,
            recursive = options.recursive,
            incomplete = options.incomplete,
            "starting listing"
        );

        let lister = Lister {
            api: Arc::clone(&self.api),
            target: ResourceAddress::clone(&self.target),
            virtual_style: self.virtual_style,
            version: self.list_api_version(),
            lock: Arc::clone(&self.lock),
            policy: options.on_item_error,
        };
        let stream = match (options.incomplete, options.recursive) {
            (false, false) => lister.flat(),
            (false, true) => lister.recursive(),
            (true, false) => lister.incomplete(false),
            (true, true) => lister.incomplete(true),
        };

        match options.cancel {
            Some(token) => stream.take_until(token.cancelled_owned()).boxed(),
            None => stream,
        }
    }
}

/// Snapshot of a client taken when a listing starts
struct Lister {
    api: Arc<dyn StorageApi>,
    target: ResourceAddress,
    virtual_style: bool,
    version: ListApiVersion,
    lock: Arc<Mutex<()>>,
    policy: ItemErrorPolicy,
}

impl Lister {
    fn translate(&self, err: BackendError, bucket: &str, object: &str) -> Error {
        let path = self.target.to_string();
        translate_error(err, &ErrorContext::new(bucket, object, &path))
    }

    fn stops_on_error(&self) -> bool {
        self.policy == ItemErrorPolicy::Stop
    }

    async fn buckets(&self) -> Result<Vec<BucketInfo>> {
        let _guard = self.lock.lock().await;
        self.api
            .list_buckets()
            .await
            .map_err(|e| self.translate(e, "", ""))
    }

    async fn open_objects(&self, bucket: &str, prefix: &str, recursive: bool) -> BackendStream<ObjectEntry> {
        let _guard = self.lock.lock().await;
        self.api.list_objects(bucket, prefix, recursive, self.version)
    }

    async fn open_uploads(&self, bucket: &str, prefix: &str, recursive: bool) -> BackendStream<UploadEntry> {
        let _guard = self.lock.lock().await;
        self.api.list_incomplete_uploads(bucket, prefix, recursive)
    }

    /// Address of a bucket in a root listing
    fn bucket_url(&self, bucket: &str) -> ResourceAddress {
        self.target.with_path(join_path(self.target.separator, &[bucket]))
    }

    /// Address of a key; virtual-host targets carry the bucket in the host
    fn item_url(&self, bucket: &str, key: &str) -> ResourceAddress {
        let sep = self.target.separator;
        if self.virtual_style {
            self.target.with_path(join_path(sep, &[key]))
        } else {
            self.target.with_path(join_path(sep, &[bucket, key]))
        }
    }

    /// Zero-byte key ending in the separator
    fn is_dir_marker(&self, key: &str, size: i64) -> bool {
        size == 0 && key.ends_with(self.target.separator)
    }

    fn flat_content(&self, bucket: &str, entry: ObjectEntry) -> ClientContent {
        let url = self.item_url(bucket, &entry.key);
        if self.is_dir_marker(&entry.key, entry.size) {
            // Markers and common prefixes have no reliable modification time.
            ClientContent::dir(url, Some(jiff::Timestamp::now()))
        } else {
            ClientContent::object(url, entry.size, entry.last_modified)
        }
    }

    fn upload_content(&self, bucket: &str, entry: UploadEntry, synthesize_dirs: bool) -> ClientContent {
        let url = self.item_url(bucket, &entry.key);
        if synthesize_dirs && self.is_dir_marker(&entry.key, entry.size) {
            ClientContent::dir(url, Some(jiff::Timestamp::now()))
        } else {
            ClientContent::incomplete(url, entry.size, entry.initiated)
        }
    }

    fn recursive_content(&self, bucket: &str, entry: ObjectEntry) -> Result<ClientContent> {
        let archived = entry
            .storage_class
            .as_deref()
            .is_some_and(|class| ARCHIVED_STORAGE_CLASSES.contains(&class));
        if archived {
            return Err(Error::ObjectOnGlacier { object: entry.key });
        }
        Ok(ClientContent::object(
            self.item_url(bucket, &entry.key),
            entry.size,
            entry.last_modified,
        ))
    }

    /// Non-recursive listing of buckets, a single bucket, or a prefix
    fn flat(self) -> ContentStream {
        let this = self;
        Box::pin(stream! {
            let (bucket, object) = this.target.bucket_and_object(this.virtual_style);

            if bucket.is_empty() && object.is_empty() {
                let buckets = match this.buckets().await {
                    Ok(buckets) => buckets,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for info in buckets {
                    yield Ok(ClientContent::dir(this.bucket_url(&info.name), info.creation_date));
                }
                return;
            }

            if object.is_empty() && !this.target.has_trailing_separator() {
                // Confirm the bucket exists without listing its keys.
                let buckets = match this.buckets().await {
                    Ok(buckets) => buckets,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if let Some(info) = buckets.into_iter().find(|b| b.name == bucket) {
                    yield Ok(ClientContent::dir(this.target.clone(), info.creation_date));
                }
                return;
            }

            let mut entries = this.open_objects(&bucket, &object, false).await;
            while let Some(entry) = entries.next().await {
                match entry {
                    Ok(entry) => yield Ok(this.flat_content(&bucket, entry)),
                    Err(e) => {
                        tracing::debug!(bucket = %bucket, error = %e, "listing item failed");
                        yield Err(this.translate(e, &bucket, &object));
                        if this.stops_on_error() {
                            return;
                        }
                    }
                }
            }
        })
    }

    /// Recursive listing; archived objects become error items
    fn recursive(self) -> ContentStream {
        let this = self;
        Box::pin(stream! {
            let (bucket, object) = this.target.bucket_and_object(this.virtual_style);

            if bucket.is_empty() && object.is_empty() {
                let buckets = match this.buckets().await {
                    Ok(buckets) => buckets,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for info in buckets {
                    yield Ok(ClientContent::dir(this.bucket_url(&info.name), info.creation_date));

                    let mut entries = this.open_objects(&info.name, "", true).await;
                    while let Some(entry) = entries.next().await {
                        match entry {
                            Ok(entry) => {
                                let content = this.recursive_content(&info.name, entry);
                                yield content;
                            }
                            Err(e) => {
                                tracing::debug!(bucket = %info.name, error = %e, "listing item failed");
                                yield Err(this.translate(e, &info.name, ""));
                                if this.stops_on_error() {
                                    return;
                                }
                            }
                        }
                    }
                }
                return;
            }

            let mut entries = this.open_objects(&bucket, &object, true).await;
            while let Some(entry) = entries.next().await {
                match entry {
                    // Directory markers would duplicate the keys below them.
                    Ok(entry) if this.is_dir_marker(&entry.key, entry.size) => continue,
                    Ok(entry) => {
                        let content = this.recursive_content(&bucket, entry);
                        yield content;
                    }
                    Err(e) => {
                        tracing::debug!(bucket = %bucket, error = %e, "listing item failed");
                        yield Err(this.translate(e, &bucket, &object));
                        if this.stops_on_error() {
                            return;
                        }
                    }
                }
            }
        })
    }

    /// Incomplete uploads, in every bucket when the address is the root
    fn incomplete(self, recursive: bool) -> ContentStream {
        let this = self;
        Box::pin(stream! {
            let (bucket, object) = this.target.bucket_and_object(this.virtual_style);

            let buckets = if bucket.is_empty() && object.is_empty() {
                match this.buckets().await {
                    Ok(buckets) => buckets.into_iter().map(|b| b.name).collect(),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            } else {
                vec![bucket]
            };

            for bucket in buckets {
                let mut uploads = this.open_uploads(&bucket, &object, recursive).await;
                while let Some(upload) = uploads.next().await {
                    match upload {
                        Ok(upload) => yield Ok(this.upload_content(&bucket, upload, !recursive)),
                        Err(e) => {
                            tracing::debug!(bucket = %bucket, error = %e, "listing upload failed");
                            yield Err(this.translate(e, &bucket, &object));
                            if this.stops_on_error() {
                                return;
                            }
                        }
                    }
                }
            }
        })
    }
}
