//! Bucket notification types
//!
//! Rules attached to a bucket's notification document, the ARN that names
//! their target, and the raw records delivered by a notification listener.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Event type for every object creation
pub const OBJECT_CREATED_ALL: &str = "s3:ObjectCreated:*";

/// Event type for every object removal
pub const OBJECT_REMOVED_ALL: &str = "s3:ObjectRemoved:*";

/// Event-name prefix of creation records
pub const OBJECT_CREATED_PREFIX: &str = "s3:ObjectCreated:";

/// Event-name prefix of removal records
pub const OBJECT_REMOVED_PREFIX: &str = "s3:ObjectRemoved:";

/// Map user-facing event names (`put`, `delete`) to backend event types
pub fn parse_event_names<S: AsRef<str>>(events: &[S]) -> Result<Vec<String>> {
    events
        .iter()
        .map(|event| match event.as_ref() {
            "put" => Ok(OBJECT_CREATED_ALL.to_string()),
            "delete" => Ok(OBJECT_REMOVED_ALL.to_string()),
            other => Err(Error::InvalidArgument(format!(
                "unsupported event '{other}', expected 'put' or 'delete'"
            ))),
        })
        .collect()
}

/// Kind of target a notification rule delivers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Topic,
    Queue,
    Lambda,
}

impl TargetKind {
    /// Target kind from the ARN service field
    pub fn from_service(service: &str) -> Result<Self> {
        match service {
            "sns" => Ok(Self::Topic),
            "sqs" => Ok(Self::Queue),
            "lambda" => Ok(Self::Lambda),
            other => Err(Error::InvalidArgument(format!(
                "unsupported notification service '{other}'"
            ))),
        }
    }
}

/// `arn:<partition>:<service>:<region>:<account>:<resource>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn target_kind(&self) -> Result<TargetKind> {
        TargetKind::from_service(&self.service)
    }
}

impl FromStr for Arn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split(':').collect();
        let [_, partition, service, region, account_id, resource] = fields.as_slice() else {
            return Err(Error::InvalidArgument(format!(
                "ARN '{s}' must have exactly 6 colon-separated fields"
            )));
        };
        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// A single rule of a bucket notification document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationRule {
    pub id: Option<String>,
    /// Target ARN
    pub arn: String,
    /// Backend event types, e.g. `s3:ObjectCreated:*`
    pub events: Vec<String>,
    /// Key prefix filter, empty when unset
    pub prefix: String,
    /// Key suffix filter, empty when unset
    pub suffix: String,
}

/// A bucket's notification document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketNotification {
    pub topics: Vec<NotificationRule>,
    pub queues: Vec<NotificationRule>,
    pub lambdas: Vec<NotificationRule>,
}

impl BucketNotification {
    fn rules_mut(&mut self, kind: TargetKind) -> &mut Vec<NotificationRule> {
        match kind {
            TargetKind::Topic => &mut self.topics,
            TargetKind::Queue => &mut self.queues,
            TargetKind::Lambda => &mut self.lambdas,
        }
    }

    /// Add a rule to the target list of `kind`
    pub fn add(&mut self, kind: TargetKind, rule: NotificationRule) {
        self.rules_mut(kind).push(rule);
    }

    /// Drop every rule of `kind` that targets `arn`
    pub fn remove_by_arn(&mut self, kind: TargetKind, arn: &str) {
        self.rules_mut(kind).retain(|rule| rule.arn != arn);
    }

    /// All rules, topics first, then queues, then lambdas
    pub fn rules(&self) -> impl Iterator<Item = &NotificationRule> {
        self.topics
            .iter()
            .chain(self.queues.iter())
            .chain(self.lambdas.iter())
    }
}

/// Flattened view of a rule returned to upper-level tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub id: String,
    pub arn: String,
    pub events: Vec<String>,
    pub prefix: String,
    pub suffix: String,
}

impl From<&NotificationRule> for NotificationConfig {
    fn from(rule: &NotificationRule) -> Self {
        Self {
            id: rule.id.clone().unwrap_or_default(),
            arn: rule.arn.clone(),
            events: rule.events.clone(),
            prefix: rule.prefix.clone(),
            suffix: rule.suffix.clone(),
        }
    }
}

/// One record of a bucket notification, as decoded by the SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    /// e.g. `s3:ObjectCreated:Put`
    pub event_name: String,
    pub event_time: jiff::Timestamp,
    pub bucket: String,
    /// Object key, still URL-escaped
    pub key: String,
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arn() {
        let arn: Arn = "arn:minio:sqs:us-east-1:1:webhook".parse().unwrap();
        assert_eq!(arn.partition, "minio");
        assert_eq!(arn.service, "sqs");
        assert_eq!(arn.region, "us-east-1");
        assert_eq!(arn.account_id, "1");
        assert_eq!(arn.resource, "webhook");
        assert_eq!(arn.target_kind().unwrap(), TargetKind::Queue);
        assert_eq!(arn.to_string(), "arn:minio:sqs:us-east-1:1:webhook");
    }

    #[test]
    fn test_parse_arn_wrong_field_count() {
        for raw in ["arn:minio:sqs:us-east-1:1", "arn:minio:sqs:us-east-1:1:a:b", ""] {
            assert!(matches!(raw.parse::<Arn>(), Err(Error::InvalidArgument(_))), "{raw}");
        }
    }

    #[test]
    fn test_target_kind_unknown_service() {
        let arn: Arn = "arn:aws:sms:us-east-1:1:x".parse().unwrap();
        assert!(arn.target_kind().is_err());
    }

    #[test]
    fn test_parse_event_names() {
        assert_eq!(
            parse_event_names(&["put", "delete"]).unwrap(),
            vec![OBJECT_CREATED_ALL, OBJECT_REMOVED_ALL]
        );
        assert!(parse_event_names(&["get"]).is_err());
    }

    #[test]
    fn test_bucket_notification_add_remove() {
        let mut doc = BucketNotification::default();
        let rule = |arn: &str| NotificationRule {
            arn: arn.to_string(),
            events: vec![OBJECT_CREATED_ALL.to_string()],
            ..Default::default()
        };
        doc.add(TargetKind::Queue, rule("arn:minio:sqs::1:a"));
        doc.add(TargetKind::Queue, rule("arn:minio:sqs::1:b"));
        doc.add(TargetKind::Lambda, rule("arn:minio:sqs::1:a"));

        doc.remove_by_arn(TargetKind::Queue, "arn:minio:sqs::1:a");
        assert_eq!(doc.queues.len(), 1);
        assert_eq!(doc.queues[0].arn, "arn:minio:sqs::1:b");
        assert_eq!(doc.lambdas.len(), 1);
        assert_eq!(doc.rules().count(), 2);
    }
}
