//! S3 client implementation
//!
//! [`S3Client`] presents one target URL of an S3-compatible service as a
//! node in a resource tree. Listing, stat and watch live in their own
//! modules; this one holds the handle itself plus the transfer, bucket,
//! access and share operations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;

use bucketfs_core::address::AMAZON_HOST_NAME;
use bucketfs_core::{
    BackendError, Error, ErrorContext, KeyCondition, ListApiVersion, ObjectReader, PostPolicy,
    ResourceAddress, Result, StorageApi, is_virtual_host_style, translate_error,
    validate_bucket_name,
};

/// Client handle for one target URL
///
/// Cheap to clone; clones share the backend and the per-client lock.
#[derive(Clone)]
pub struct S3Client {
    pub(crate) api: Arc<dyn StorageApi>,
    pub(crate) target: Arc<ResourceAddress>,
    pub(crate) virtual_style: bool,
    /// Serializes stat and listing setup on this handle
    pub(crate) lock: Arc<Mutex<()>>,
}

impl S3Client {
    /// Create a client for `target` on top of a storage backend
    pub fn new(api: Arc<dyn StorageApi>, target: ResourceAddress) -> Self {
        let virtual_style = is_virtual_host_style(&target.host);
        Self {
            api,
            target: Arc::new(target),
            virtual_style,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// The target URL of this client
    pub fn url(&self) -> &ResourceAddress {
        &self.target
    }

    /// Whether the bucket is encoded in the host name
    pub fn is_virtual_style(&self) -> bool {
        self.virtual_style
    }

    /// Bucket and object addressed by the target URL
    pub fn bucket_and_object(&self) -> (String, String) {
        self.target.bucket_and_object(self.virtual_style)
    }

    /// ListObjectsV2 is only used against the canonical Amazon endpoint
    pub(crate) fn list_api_version(&self) -> ListApiVersion {
        if self.target.host == AMAZON_HOST_NAME {
            ListApiVersion::V2
        } else {
            ListApiVersion::V1
        }
    }

    pub(crate) fn translate(&self, err: BackendError, bucket: &str, object: &str) -> Error {
        let path = self.target.to_string();
        translate_error(err, &ErrorContext::new(bucket, object, &path))
    }

    fn require_bucket(&self) -> Result<(String, String)> {
        let (bucket, object) = self.bucket_and_object();
        if bucket.is_empty() {
            return Err(Error::BucketNameEmpty);
        }
        Ok((bucket, object))
    }

    /// Open the object for reading
    pub async fn get(&self) -> Result<ObjectReader> {
        let (bucket, object) = self.require_bucket()?;
        self.api
            .get_object(&bucket, &object)
            .await
            .map_err(|e| self.translate(e, &bucket, &object))
    }

    /// Upload `size` bytes from `reader` to the object
    ///
    /// A negative `size` uploads everything the reader yields. An empty
    /// `content_type` is guessed from the object key. Returns the number of
    /// bytes written.
    pub async fn put<R>(&self, reader: R, size: i64, content_type: &str) -> Result<i64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let (bucket, object) = self.require_bucket()?;
        let content_type = if content_type.is_empty() {
            mime_guess::from_path(&object)
                .first_or_octet_stream()
                .to_string()
        } else {
            content_type.to_string()
        };

        let mut data = Vec::new();
        if size < 0 {
            let mut reader = reader;
            reader.read_to_end(&mut data).await?;
        } else {
            reader.take(size as u64).read_to_end(&mut data).await?;
        }
        let written = data.len() as i64;
        if size >= 0 && written < size {
            return Err(Error::UnexpectedShortWrite {
                expected: size,
                written,
            });
        }

        let expected = if size < 0 { written } else { size };
        self.api
            .put_object(&bucket, &object, data, &content_type)
            .await
            .map_err(|e| {
                let path = self.target.to_string();
                // A single-request upload is all or nothing; a broken one
                // stores no bytes.
                let ctx = ErrorContext::new(&bucket, &object, &path).with_progress(expected, 0);
                translate_error(e, &ctx)
            })
    }

    /// Server-side copy of `source` (`bucket/key`) into the object
    pub async fn copy(&self, source: &str) -> Result<()> {
        let (bucket, object) = self.require_bucket()?;
        self.api
            .copy_object(&bucket, &object, source)
            .await
            .map_err(|e| self.translate(e, &bucket, &object))
    }

    /// Remove the object, its incomplete uploads, or the bucket itself
    pub async fn remove(&self, incomplete: bool) -> Result<()> {
        let (bucket, object) = self.require_bucket()?;
        let result = if incomplete && !object.is_empty() {
            self.api.remove_incomplete_upload(&bucket, &object).await
        } else if object.is_empty() {
            self.api.remove_bucket(&bucket).await
        } else {
            self.api.remove_object(&bucket, &object).await
        };
        result.map_err(|e| self.translate(e, &bucket, &object))
    }

    /// Create the bucket in `region`
    pub async fn make_bucket(&self, region: &str) -> Result<()> {
        let (bucket, object) = self.bucket_and_object();
        if !object.is_empty() {
            return Err(Error::BucketNameTopLevel);
        }
        validate_bucket_name(&bucket)?;

        tracing::debug!(bucket = %bucket, region, "creating bucket");
        self.api
            .make_bucket(&bucket, region)
            .await
            .map_err(|e| self.translate(e, &bucket, &object))
    }

    /// Policies configured for the bucket, keyed by resource
    pub async fn get_access_rules(&self) -> Result<BTreeMap<String, String>> {
        let (bucket, object) = self.require_bucket()?;
        self.api
            .list_bucket_policies(&bucket, &object)
            .await
            .map_err(|e| self.translate(e, &bucket, &object))
    }

    /// Access policy of the bucket/prefix
    pub async fn get_access(&self) -> Result<String> {
        let (bucket, object) = self.require_bucket()?;
        self.api
            .get_bucket_policy(&bucket, &object)
            .await
            .map_err(|e| self.translate(e, &bucket, &object))
    }

    /// Replace the access policy of the bucket/prefix
    pub async fn set_access(&self, policy: &str) -> Result<()> {
        let (bucket, object) = self.require_bucket()?;
        self.api
            .set_bucket_policy(&bucket, &object, policy)
            .await
            .map_err(|e| self.translate(e, &bucket, &object))
    }

    /// Presigned GET URL valid for `expires`
    pub async fn share_download(&self, expires: Duration) -> Result<String> {
        let (bucket, object) = self.require_bucket()?;
        self.api
            .presigned_get_object(&bucket, &object, expires)
            .await
            .map_err(|e| self.translate(e, &bucket, &object))
    }

    /// Form fields for a presigned POST upload valid for `expires`
    ///
    /// With `recursive` any key below the object prefix may be uploaded.
    pub async fn share_upload(
        &self,
        recursive: bool,
        expires: Duration,
        content_type: &str,
    ) -> Result<BTreeMap<String, String>> {
        let (bucket, object) = self.require_bucket()?;
        let expiration = jiff::Timestamp::now()
            .checked_add(expires)
            .map_err(|e| Error::InvalidArgument(format!("invalid expiry {expires:?}: {e}")))?;
        let key = if recursive {
            KeyCondition::StartsWith(object.clone())
        } else {
            KeyCondition::Exact(object.clone())
        };
        let policy = PostPolicy::new(&bucket, key, expiration).with_content_type(content_type);

        self.api
            .presigned_post_policy(&policy)
            .await
            .map_err(|e| self.translate(e, &bucket, &object))
    }
}

impl fmt::Debug for S3Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Client")
            .field("target", &self.target.to_string())
            .field("virtual_style", &self.virtual_style)
            .finish_non_exhaustive()
    }
}
