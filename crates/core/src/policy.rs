//! Presigned POST policy description
//!
//! The policy only states the upload conditions. Signing it is the
//! backend's job.

/// Condition on the uploaded key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCondition {
    /// Upload must use exactly this key
    Exact(String),
    /// Upload may use any key starting with this prefix
    StartsWith(String),
}

/// Conditions for a browser-based POST upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPolicy {
    pub bucket: String,
    pub key: KeyCondition,
    /// Instant after which the form is rejected
    pub expiration: jiff::Timestamp,
    pub content_type: Option<String>,
}

impl PostPolicy {
    pub fn new(bucket: impl Into<String>, key: KeyCondition, expiration: jiff::Timestamp) -> Self {
        Self {
            bucket: bucket.into(),
            key,
            expiration,
            content_type: None,
        }
    }

    /// Restrict the upload to a content type; blank values are ignored
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        let content_type = content_type.trim();
        if !content_type.is_empty() {
            self.content_type = Some(content_type.to_string());
        }
        self
    }
}
