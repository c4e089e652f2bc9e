//! Bucket notification configuration

use bucketfs_core::notification::parse_event_names;
use bucketfs_core::{Arn, NotificationConfig, NotificationRule, Result, validate_bucket_name};

use crate::client::S3Client;

impl S3Client {
    /// Attach a rule delivering `events` on matching keys to `arn`
    ///
    /// Everything is validated before the bucket's notification document
    /// is fetched.
    pub async fn add_notification_config(
        &self,
        arn: &str,
        events: &[String],
        prefix: &str,
        suffix: &str,
    ) -> Result<()> {
        let (bucket, _) = self.bucket_and_object();
        validate_bucket_name(&bucket)?;
        let parsed: Arn = arn.parse()?;
        let events = parse_event_names(events)?;
        let kind = parsed.target_kind()?;

        let mut config = self
            .api
            .get_bucket_notification(&bucket)
            .await
            .map_err(|e| self.translate(e, &bucket, ""))?;
        config.add(
            kind,
            NotificationRule {
                id: None,
                arn: parsed.to_string(),
                events,
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
        );

        tracing::debug!(bucket = %bucket, arn, "adding notification rule");
        self.api
            .set_bucket_notification(&bucket, &config)
            .await
            .map_err(|e| self.translate(e, &bucket, ""))
    }

    /// Remove the rules targeting `arn`, or every rule when `arn` is empty
    pub async fn remove_notification_config(&self, arn: &str) -> Result<()> {
        let (bucket, _) = self.bucket_and_object();
        validate_bucket_name(&bucket)?;

        if arn.is_empty() {
            tracing::debug!(bucket = %bucket, "removing all notification rules");
            return self
                .api
                .remove_all_bucket_notification(&bucket)
                .await
                .map_err(|e| self.translate(e, &bucket, ""));
        }

        let parsed: Arn = arn.parse()?;
        let kind = parsed.target_kind()?;

        let mut config = self
            .api
            .get_bucket_notification(&bucket)
            .await
            .map_err(|e| self.translate(e, &bucket, ""))?;
        config.remove_by_arn(kind, &parsed.to_string());
        self.api
            .set_bucket_notification(&bucket, &config)
            .await
            .map_err(|e| self.translate(e, &bucket, ""))
    }

    /// Rules of the bucket, restricted to `arn` when it is not empty
    pub async fn list_notification_configs(&self, arn: &str) -> Result<Vec<NotificationConfig>> {
        let (bucket, _) = self.bucket_and_object();
        validate_bucket_name(&bucket)?;

        let config = self
            .api
            .get_bucket_notification(&bucket)
            .await
            .map_err(|e| self.translate(e, &bucket, ""))?;
        Ok(config
            .rules()
            .filter(|rule| arn.is_empty() || rule.arn == arn)
            .map(NotificationConfig::from)
            .collect())
    }
}
