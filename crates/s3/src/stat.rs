//! Single-item metadata lookup

use futures::StreamExt;

use bucketfs_core::{ClientContent, Error, Result};

use crate::client::S3Client;

impl S3Client {
    /// Resolve the target into one entry
    ///
    /// A bucket address is confirmed with an existence check. Anything else
    /// is looked up through a non-recursive listing of the key: an exact
    /// match is an object, a match on `key/` is a directory.
    pub async fn stat(&self) -> Result<ClientContent> {
        let _guard = self.lock.lock().await;

        let (bucket, object) = self.bucket_and_object();
        if bucket.is_empty() {
            return Err(Error::BucketNameEmpty);
        }

        let sep = self.target.separator;
        let object = object.trim_end_matches(sep);
        if object.is_empty() {
            let exists = self
                .api
                .bucket_exists(&bucket)
                .await
                .map_err(|e| self.translate(e, &bucket, ""))?;
            if !exists {
                return Err(Error::BucketDoesNotExist { bucket });
            }
            return Ok(ClientContent::dir(
                self.target.as_ref().clone(),
                Some(jiff::Timestamp::now()),
            ));
        }

        let dir_prefix = format!("{object}{sep}");
        let mut is_dir = false;
        let mut entries = self
            .api
            .list_objects(&bucket, object, false, self.list_api_version());
        while let Some(entry) = entries.next().await {
            let entry = entry.map_err(|e| self.translate(e, &bucket, object))?;
            if entry.key == object {
                return Ok(ClientContent::object(
                    self.target.as_ref().clone(),
                    entry.size,
                    entry.last_modified,
                ));
            }
            if entry.key.starts_with(&dir_prefix) {
                is_dir = true;
            }
        }

        if is_dir {
            tracing::debug!(bucket = %bucket, object, "resolved as directory");
            return Ok(ClientContent::dir(
                self.target.as_ref().clone(),
                Some(jiff::Timestamp::now()),
            ));
        }
        Err(Error::ObjectMissing)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bucketfs_core::{BackendError, EntryType, MockStorageApi, ObjectEntry, ResourceAddress};
    use futures::stream;
    use mockall::predicate::eq;

    use super::*;

    fn client(mock: MockStorageApi, url: &str) -> S3Client {
        S3Client::new(Arc::new(mock), ResourceAddress::parse(url).unwrap())
    }

    fn entry(key: &str, size: i64) -> ObjectEntry {
        ObjectEntry {
            key: key.to_string(),
            size,
            last_modified: None,
            storage_class: None,
        }
    }

    #[tokio::test]
    async fn test_stat_missing_bucket() {
        let mut mock = MockStorageApi::new();
        mock.expect_bucket_exists()
            .with(eq("photos"))
            .returning(|_| Ok(false));

        let c = client(mock, "http://localhost:9000/photos/");
        assert!(matches!(
            c.stat().await,
            Err(Error::BucketDoesNotExist { bucket }) if bucket == "photos"
        ));
    }

    #[tokio::test]
    async fn test_stat_prefers_exact_key() {
        let mut mock = MockStorageApi::new();
        mock.expect_list_objects()
            .withf(|bucket, prefix, recursive, _| bucket == "photos" && prefix == "a" && !recursive)
            .returning(|_, _, _, _| {
                stream::iter(vec![Ok(entry("a/", 0)), Ok(entry("a", 7))]).boxed()
            });

        let c = client(mock, "http://localhost:9000/photos/a");
        let content = c.stat().await.unwrap();
        assert_eq!(content.entry_type, EntryType::Object);
        assert_eq!(content.size, 7);
    }

    #[tokio::test]
    async fn test_stat_trims_trailing_separator() {
        let mut mock = MockStorageApi::new();
        mock.expect_list_objects()
            .withf(|_, prefix, _, _| prefix == "dir")
            .returning(|_, _, _, _| stream::iter(vec![Ok(entry("dir/", 0))]).boxed());

        let c = client(mock, "http://localhost:9000/photos/dir/");
        assert!(c.stat().await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_stat_translates_listing_error() {
        let mut mock = MockStorageApi::new();
        mock.expect_list_objects().returning(|_, _, _, _| {
            stream::iter(vec![Err(BackendError::new("NoSuchBucket", "gone"))]).boxed()
        });

        let c = client(mock, "http://localhost:9000/photos/a");
        assert!(matches!(c.stat().await, Err(Error::BucketDoesNotExist { .. })));
    }

    #[tokio::test]
    async fn test_stat_requires_bucket() {
        let c = client(MockStorageApi::new(), "http://localhost:9000/");
        assert!(matches!(c.stat().await, Err(Error::BucketNameEmpty)));
    }
}
