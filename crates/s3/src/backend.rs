//! aws-sdk-s3 storage backend
//!
//! Implements [`StorageApi`] on top of `aws_sdk_s3::Client`. This is the
//! only module that touches the AWS SDK; everything above it works with
//! the SDK-independent types from `bucketfs-core`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::list_multipart_uploads::ListMultipartUploadsOutput;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, FilterRule, FilterRuleName,
    LambdaFunctionConfiguration, NotificationConfiguration, NotificationConfigurationFilter,
    QueueConfiguration, S3KeyFilter, TopicConfiguration,
};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::sync::CancellationToken;

use bucketfs_core::{
    BackendError, BackendResult, BackendStream, BucketInfo, BucketNotification, Error, HostConfig,
    ListApiVersion, NotificationRecord, NotificationRule, ObjectEntry, ObjectReader, PostPolicy,
    Result, StorageApi, UploadEntry,
};

use crate::factory::{BackendBuilder, BackendEndpoint};
use crate::post_policy::{SigningCredentials, sign_post_policy};

/// Delimiter used for non-recursive listings
const DELIMITER: &str = "/";

/// Policy text reported when a bucket has no policy
const NO_POLICY: &str = "none";

/// Characters escaped in `x-amz-copy-source`
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Storage backend talking to S3 through aws-sdk-s3
#[derive(Debug, Clone)]
pub struct AwsBackend {
    client: Client,
    credentials: Credentials,
    region: String,
}

impl AwsBackend {
    /// Connect to `endpoint` with the credentials of `config`
    pub async fn connect(endpoint: &BackendEndpoint, config: &HostConfig) -> Result<Self> {
        if config.is_signature_v2() {
            return Err(Error::UnsupportedFeature(
                "signature version S3v2 is not supported by the AWS SDK".into(),
            ));
        }
        if config.insecure {
            tracing::warn!(
                host = %endpoint.host,
                "insecure mode requested; TLS certificates are still verified"
            );
        }

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "bucketfs-static-credentials",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials.clone())
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(endpoint.url());
        match aws_config::AppName::new(config.app_name.clone()) {
            Ok(app_name) => loader = loader.app_name(app_name),
            Err(e) => tracing::debug!(app_name = %config.app_name, error = %e, "ignoring app name"),
        }
        let sdk_config = loader.load().await;

        // Virtual-host targets let the SDK put the bucket back into the host.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(!endpoint.virtual_style)
            .build();

        tracing::debug!(
            endpoint = %endpoint.url(),
            virtual_style = endpoint.virtual_style,
            debug = config.debug,
            "connected aws backend"
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            credentials,
            region: config.region.clone(),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Builds [`AwsBackend`]s for the client factory
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsBackendBuilder;

#[async_trait]
impl BackendBuilder for AwsBackendBuilder {
    async fn build(
        &self,
        endpoint: &BackendEndpoint,
        config: &HostConfig,
    ) -> Result<Arc<dyn StorageApi>> {
        Ok(Arc::new(AwsBackend::connect(endpoint, config).await?))
    }
}

/// Convert an SDK failure into a raw backend error
///
/// Service errors keep their S3 error code. Failures that never produced a
/// response become transport errors, except for bodies that ended early.
fn backend_error<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    if let Some(service) = err.as_service_error() {
        return BackendError::new(
            service.code().unwrap_or_default(),
            service
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(service).to_string()),
        );
    }

    let message = DisplayErrorContext(&err).to_string();
    if is_unexpected_eof(&err) {
        BackendError::end_of_stream(message)
    } else {
        BackendError::transport(message)
    }
}

fn is_unexpected_eof(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::UnexpectedEof
        {
            return true;
        }
        source = err.source();
    }
    false
}

fn timestamp(dt: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(dt.secs(), dt.subsec_nanos() as i32).ok()
}

/// Markers for the next `ListMultipartUploads` page, if there is one
fn next_upload_page(response: &ListMultipartUploadsOutput) -> Option<(String, Option<String>)> {
    if response.is_truncated() != Some(true) {
        return None;
    }
    let key_marker = response.next_key_marker()?.to_string();
    Some((key_marker, response.next_upload_id_marker().map(str::to_string)))
}

/// Upload ids on one page that belong exactly to `key`
fn upload_ids_for_key(response: &ListMultipartUploadsOutput, key: &str) -> Vec<String> {
    response
        .uploads()
        .iter()
        .filter(|u| u.key() == Some(key))
        .filter_map(|u| u.upload_id().map(str::to_string))
        .collect()
}

async fn upload_size(client: &Client, bucket: &str, key: &str, upload_id: &str) -> BackendResult<i64> {
    let mut size = 0;
    let mut marker: Option<String> = None;
    loop {
        let response = client
            .list_parts()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .set_part_number_marker(marker.take())
            .send()
            .await
            .map_err(backend_error)?;

        size += response.parts().iter().filter_map(|p| p.size()).sum::<i64>();

        match response.next_part_number_marker() {
            Some(next) if response.is_truncated() == Some(true) => marker = Some(next.to_string()),
            _ => return Ok(size),
        }
    }
}

/// Merge a page of keys and common prefixes in key order
fn page_entries(
    contents: &[aws_sdk_s3::types::Object],
    prefixes: &[aws_sdk_s3::types::CommonPrefix],
) -> Vec<ObjectEntry> {
    let mut entries: Vec<ObjectEntry> = contents
        .iter()
        .map(|object| ObjectEntry {
            key: object.key().unwrap_or_default().to_string(),
            size: object.size().unwrap_or(0),
            last_modified: object.last_modified().and_then(timestamp),
            storage_class: object.storage_class().map(|sc| sc.as_str().to_string()),
        })
        .chain(prefixes.iter().filter_map(|p| p.prefix()).map(|prefix| ObjectEntry {
            key: prefix.to_string(),
            size: 0,
            last_modified: None,
            storage_class: None,
        }))
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}

fn filter_rules(rule: &NotificationRule) -> Option<NotificationConfigurationFilter> {
    let mut rules = Vec::new();
    if !rule.prefix.is_empty() {
        rules.push(
            FilterRule::builder()
                .name(FilterRuleName::Prefix)
                .value(&rule.prefix)
                .build(),
        );
    }
    if !rule.suffix.is_empty() {
        rules.push(
            FilterRule::builder()
                .name(FilterRuleName::Suffix)
                .value(&rule.suffix)
                .build(),
        );
    }
    if rules.is_empty() {
        return None;
    }
    Some(
        NotificationConfigurationFilter::builder()
            .key(S3KeyFilter::builder().set_filter_rules(Some(rules)).build())
            .build(),
    )
}

/// `(prefix, suffix)` of an SDK notification filter
fn read_filter(filter: Option<&NotificationConfigurationFilter>) -> (String, String) {
    let mut prefix = String::new();
    let mut suffix = String::new();
    let rules = filter
        .and_then(|f| f.key())
        .map(|k| k.filter_rules())
        .unwrap_or_default();
    for rule in rules {
        let value = rule.value().unwrap_or_default().to_string();
        match rule.name() {
            Some(FilterRuleName::Prefix) => prefix = value,
            Some(FilterRuleName::Suffix) => suffix = value,
            _ => {}
        }
    }
    (prefix, suffix)
}

fn read_rule(
    id: Option<&str>,
    arn: &str,
    events: &[aws_sdk_s3::types::Event],
    filter: Option<&NotificationConfigurationFilter>,
) -> NotificationRule {
    let (prefix, suffix) = read_filter(filter);
    NotificationRule {
        id: id.map(str::to_string),
        arn: arn.to_string(),
        events: events.iter().map(|e| e.as_str().to_string()).collect(),
        prefix,
        suffix,
    }
}

fn sdk_events(rule: &NotificationRule) -> Vec<aws_sdk_s3::types::Event> {
    rule.events
        .iter()
        .map(|e| aws_sdk_s3::types::Event::from(e.as_str()))
        .collect()
}

fn build_error(err: aws_sdk_s3::error::BuildError) -> BackendError {
    BackendError::new("InvalidArgument", err.to_string())
}

fn notification_configuration(config: &BucketNotification) -> BackendResult<NotificationConfiguration> {
    let topics = config
        .topics
        .iter()
        .map(|rule| {
            TopicConfiguration::builder()
                .set_id(rule.id.clone())
                .topic_arn(&rule.arn)
                .set_events(Some(sdk_events(rule)))
                .set_filter(filter_rules(rule))
                .build()
                .map_err(build_error)
        })
        .collect::<BackendResult<Vec<_>>>()?;
    let queues = config
        .queues
        .iter()
        .map(|rule| {
            QueueConfiguration::builder()
                .set_id(rule.id.clone())
                .queue_arn(&rule.arn)
                .set_events(Some(sdk_events(rule)))
                .set_filter(filter_rules(rule))
                .build()
                .map_err(build_error)
        })
        .collect::<BackendResult<Vec<_>>>()?;
    let lambdas = config
        .lambdas
        .iter()
        .map(|rule| {
            LambdaFunctionConfiguration::builder()
                .set_id(rule.id.clone())
                .lambda_function_arn(&rule.arn)
                .set_events(Some(sdk_events(rule)))
                .set_filter(filter_rules(rule))
                .build()
                .map_err(build_error)
        })
        .collect::<BackendResult<Vec<_>>>()?;

    Ok(NotificationConfiguration::builder()
        .set_topic_configurations(Some(topics))
        .set_queue_configurations(Some(queues))
        .set_lambda_function_configurations(Some(lambdas))
        .build())
}

#[async_trait]
impl StorageApi for AwsBackend {
    async fn list_buckets(&self) -> BackendResult<Vec<BucketInfo>> {
        let response = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(backend_error)?;

        Ok(response
            .buckets()
            .iter()
            .map(|b| BucketInfo {
                name: b.name().unwrap_or_default().to_string(),
                creation_date: b.creation_date().and_then(timestamp),
            })
            .collect())
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
        version: ListApiVersion,
    ) -> BackendStream<ObjectEntry> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        let delimiter = (!recursive).then(|| DELIMITER.to_string());

        match version {
            ListApiVersion::V2 => Box::pin(try_stream! {
                let mut continuation_token: Option<String> = None;
                loop {
                    let response = client
                        .list_objects_v2()
                        .bucket(&bucket)
                        .prefix(&prefix)
                        .set_delimiter(delimiter.clone())
                        .set_continuation_token(continuation_token.take())
                        .send()
                        .await
                        .map_err(backend_error)?;

                    for entry in page_entries(response.contents(), response.common_prefixes()) {
                        yield entry;
                    }

                    match response.next_continuation_token() {
                        Some(token) if response.is_truncated() == Some(true) => {
                            continuation_token = Some(token.to_string());
                        }
                        _ => break,
                    }
                }
            }),
            ListApiVersion::V1 => Box::pin(try_stream! {
                let mut marker: Option<String> = None;
                loop {
                    let response = client
                        .list_objects()
                        .bucket(&bucket)
                        .prefix(&prefix)
                        .set_delimiter(delimiter.clone())
                        .set_marker(marker.take())
                        .send()
                        .await
                        .map_err(backend_error)?;

                    let entries = page_entries(response.contents(), response.common_prefixes());
                    // NextMarker is only returned for delimited listings.
                    let next = response
                        .next_marker()
                        .map(str::to_string)
                        .or_else(|| entries.last().map(|e| e.key.clone()));

                    for entry in entries {
                        yield entry;
                    }

                    match next {
                        Some(next) if response.is_truncated() == Some(true) => marker = Some(next),
                        _ => break,
                    }
                }
            }),
        }
    }

    fn list_incomplete_uploads(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> BackendStream<UploadEntry> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        let delimiter = (!recursive).then(|| DELIMITER.to_string());

        Box::pin(try_stream! {
            let mut key_marker: Option<String> = None;
            let mut upload_id_marker: Option<String> = None;
            loop {
                let response = client
                    .list_multipart_uploads()
                    .bucket(&bucket)
                    .prefix(&prefix)
                    .set_delimiter(delimiter.clone())
                    .set_key_marker(key_marker.take())
                    .set_upload_id_marker(upload_id_marker.take())
                    .send()
                    .await
                    .map_err(backend_error)?;

                for upload in response.uploads() {
                    let key = upload.key().unwrap_or_default().to_string();
                    let upload_id = upload.upload_id().unwrap_or_default().to_string();
                    let size = upload_size(&client, &bucket, &key, &upload_id).await?;
                    yield UploadEntry {
                        key,
                        upload_id,
                        size,
                        initiated: upload.initiated().and_then(timestamp),
                    };
                }
                for prefix in response.common_prefixes().iter().filter_map(|p| p.prefix()) {
                    yield UploadEntry {
                        key: prefix.to_string(),
                        upload_id: String::new(),
                        size: 0,
                        initiated: None,
                    };
                }

                match next_upload_page(&response) {
                    Some((key, upload_id)) => {
                        key_marker = Some(key);
                        upload_id_marker = upload_id;
                    }
                    None => break,
                }
            }
        })
    }

    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn make_bucket(&self, bucket: &str, region: &str) -> BackendResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 is the default location and must not be sent explicitly.
        if !region.is_empty() && region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request.send().await.map_err(backend_error)?;
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> BackendResult<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<ObjectReader> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<i64> {
        let size = data.len() as i64;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(size)
    }

    async fn copy_object(&self, bucket: &str, key: &str, source: &str) -> BackendResult<()> {
        let source = source.trim_start_matches('/');
        self.client
            .copy_object()
            .copy_source(utf8_percent_encode(source, COPY_SOURCE).to_string())
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> BackendResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn remove_incomplete_upload(&self, bucket: &str, key: &str) -> BackendResult<()> {
        // Collect every page before aborting so the markers stay valid.
        let mut upload_ids = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;
        loop {
            let response = self
                .client
                .list_multipart_uploads()
                .bucket(bucket)
                .prefix(key)
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_id_marker.take())
                .send()
                .await
                .map_err(backend_error)?;

            upload_ids.extend(upload_ids_for_key(&response, key));
            match next_upload_page(&response) {
                Some((next_key, next_upload_id)) => {
                    key_marker = Some(next_key);
                    upload_id_marker = next_upload_id;
                }
                None => break,
            }
        }

        for upload_id in &upload_ids {
            tracing::debug!(bucket, key, upload_id = %upload_id, "aborting incomplete upload");
            self.client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .send()
                .await
                .map_err(backend_error)?;
        }
        Ok(())
    }

    async fn get_bucket_policy(&self, bucket: &str, _prefix: &str) -> BackendResult<String> {
        match self.client.get_bucket_policy().bucket(bucket).send().await {
            Ok(response) => Ok(response.policy().unwrap_or(NO_POLICY).to_string()),
            Err(e) => {
                let err = backend_error(e);
                if err.code == "NoSuchBucketPolicy" {
                    Ok(NO_POLICY.to_string())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn set_bucket_policy(&self, bucket: &str, _prefix: &str, policy: &str) -> BackendResult<()> {
        if policy == NO_POLICY {
            self.client
                .delete_bucket_policy()
                .bucket(bucket)
                .send()
                .await
                .map_err(backend_error)?;
        } else {
            self.client
                .put_bucket_policy()
                .bucket(bucket)
                .policy(policy)
                .send()
                .await
                .map_err(backend_error)?;
        }
        Ok(())
    }

    async fn list_bucket_policies(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> BackendResult<BTreeMap<String, String>> {
        let policy = self.get_bucket_policy(bucket, prefix).await?;
        if policy == NO_POLICY {
            return Ok(BTreeMap::new());
        }
        Ok(BTreeMap::from([(format!("{bucket}/{prefix}*"), policy)]))
    }

    async fn get_bucket_notification(&self, bucket: &str) -> BackendResult<BucketNotification> {
        let response = self
            .client
            .get_bucket_notification_configuration()
            .bucket(bucket)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(BucketNotification {
            topics: response
                .topic_configurations()
                .iter()
                .map(|c| read_rule(c.id(), c.topic_arn(), c.events(), c.filter()))
                .collect(),
            queues: response
                .queue_configurations()
                .iter()
                .map(|c| read_rule(c.id(), c.queue_arn(), c.events(), c.filter()))
                .collect(),
            lambdas: response
                .lambda_function_configurations()
                .iter()
                .map(|c| read_rule(c.id(), c.lambda_function_arn(), c.events(), c.filter()))
                .collect(),
        })
    }

    async fn set_bucket_notification(
        &self,
        bucket: &str,
        config: &BucketNotification,
    ) -> BackendResult<()> {
        self.client
            .put_bucket_notification_configuration()
            .bucket(bucket)
            .notification_configuration(notification_configuration(config)?)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn remove_all_bucket_notification(&self, bucket: &str) -> BackendResult<()> {
        self.set_bucket_notification(bucket, &BucketNotification::default())
            .await
    }

    fn listen_bucket_notification(
        &self,
        _bucket: &str,
        _prefix: &str,
        _suffix: &str,
        _events: &[String],
        _cancel: CancellationToken,
    ) -> BackendResult<BackendStream<Vec<NotificationRecord>>> {
        Err(BackendError::new(
            "NotImplemented",
            "ListenBucketNotification is a MinIO extension not offered by the AWS SDK",
        ))
    }

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> BackendResult<String> {
        let presigning = PresigningConfig::expires_in(expires)
            .map_err(|e| BackendError::new("InvalidArgument", e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(backend_error)?;
        Ok(request.uri().to_string())
    }

    async fn presigned_post_policy(
        &self,
        policy: &PostPolicy,
    ) -> BackendResult<BTreeMap<String, String>> {
        let creds = SigningCredentials {
            access_key: self.credentials.access_key_id(),
            secret_key: self.credentials.secret_access_key(),
            session_token: self.credentials.session_token(),
            region: &self.region,
        };
        sign_post_policy(policy, &creds, jiff::Timestamp::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(key: &str, size: i64, class: Option<&str>) -> aws_sdk_s3::types::Object {
        aws_sdk_s3::types::Object::builder()
            .key(key)
            .size(size)
            .set_storage_class(class.map(aws_sdk_s3::types::ObjectStorageClass::from))
            .build()
    }

    fn upload(key: &str, upload_id: &str) -> aws_sdk_s3::types::MultipartUpload {
        aws_sdk_s3::types::MultipartUpload::builder()
            .key(key)
            .upload_id(upload_id)
            .build()
    }

    #[test]
    fn test_upload_pages_follow_markers() {
        let first = ListMultipartUploadsOutput::builder()
            .uploads(upload("big.iso", "u1"))
            .uploads(upload("big.iso.bak", "u2"))
            .is_truncated(true)
            .next_key_marker("big.iso.bak")
            .next_upload_id_marker("u2")
            .build();
        assert_eq!(upload_ids_for_key(&first, "big.iso"), ["u1"]);
        assert_eq!(
            next_upload_page(&first),
            Some(("big.iso.bak".to_string(), Some("u2".to_string())))
        );

        let last = ListMultipartUploadsOutput::builder()
            .uploads(upload("big.iso", "u3"))
            .is_truncated(false)
            .next_key_marker("big.iso")
            .build();
        assert_eq!(upload_ids_for_key(&last, "big.iso"), ["u3"]);
        assert_eq!(next_upload_page(&last), None);

        // A truncated page without a key marker cannot be continued.
        let stuck = ListMultipartUploadsOutput::builder().is_truncated(true).build();
        assert_eq!(next_upload_page(&stuck), None);
    }

    #[test]
    fn test_page_entries_merge_prefixes_in_order() {
        let contents = [object("a", 1, None), object("c", 3, Some("GLACIER"))];
        let prefixes = [aws_sdk_s3::types::CommonPrefix::builder().prefix("b/").build()];

        let entries = page_entries(&contents, &prefixes);
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["a", "b/", "c"]);
        assert_eq!(entries[1].size, 0);
        assert_eq!(entries[2].storage_class.as_deref(), Some("GLACIER"));
    }

    #[test]
    fn test_notification_round_trip_through_sdk_types() {
        let config = BucketNotification {
            queues: vec![NotificationRule {
                id: Some("q1".into()),
                arn: "arn:minio:sqs:us-east-1:1:webhook".into(),
                events: vec!["s3:ObjectCreated:*".into()],
                prefix: "raw/".into(),
                suffix: ".jpg".into(),
            }],
            ..Default::default()
        };

        let sdk = notification_configuration(&config).unwrap();
        let queue = &sdk.queue_configurations()[0];
        let rule = read_rule(queue.id(), queue.queue_arn(), queue.events(), queue.filter());
        assert_eq!(rule, config.queues[0]);
        assert!(sdk.topic_configurations().is_empty());
    }

    #[test]
    fn test_filter_omitted_without_prefix_or_suffix() {
        let rule = NotificationRule {
            arn: "arn:aws:sns:us-east-1:1:t".into(),
            ..Default::default()
        };
        assert!(filter_rules(&rule).is_none());
        assert_eq!(read_filter(None), (String::new(), String::new()));
    }

    #[test]
    fn test_copy_source_encoding() {
        let encoded = utf8_percent_encode("photos/2024/cat one+.png", COPY_SOURCE).to_string();
        assert_eq!(encoded, "photos/2024/cat%20one%2B.png");
    }

    #[test]
    fn test_unexpected_eof_detection() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short body");
        assert!(is_unexpected_eof(&eof));
        let other = std::io::Error::other("reset");
        assert!(!is_unexpected_eof(&other));
    }

    #[tokio::test]
    async fn test_signature_v2_rejected() {
        let mut config = HostConfig::new("gcs", "https://storage.googleapis.com", "ak", "sk");
        config.signature = "S3v2".into();
        let endpoint = BackendEndpoint {
            host: "storage.googleapis.com".into(),
            secure: true,
            virtual_style: false,
        };
        let result = AwsBackend::connect(&endpoint, &config).await;
        assert!(matches!(result, Err(Error::UnsupportedFeature(_))));
    }
}
