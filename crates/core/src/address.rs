//! Address resolution
//!
//! A [`ResourceAddress`] is the parsed target URL of a client. This module
//! decides whether a host addresses buckets virtual-host style or path style
//! and splits an address into its bucket and object components.

use std::fmt;

use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};

/// Canonical Amazon S3 endpoint
pub const AMAZON_HOST_NAME: &str = "s3.amazonaws.com";

/// Canonical Google Cloud Storage endpoint
pub const GOOGLE_HOST_NAME: &str = "storage.googleapis.com";

const AMAZON_VIRTUAL_HOST_PATTERN: &str = "*.s3*.amazonaws.com";
const GOOGLE_VIRTUAL_HOST_PATTERN: &str = "*.storage.googleapis.com";

/// Default path separator
pub const SEPARATOR: char = '/';

/// A parsed target URL
///
/// Immutable once parsed. Per-item addresses are derived with
/// [`ResourceAddress::with_path`], which returns a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAddress {
    /// URL scheme (`http`, `https`)
    pub scheme: String,
    /// Host including the port, if any
    pub host: String,
    /// Decoded path
    pub path: String,
    /// Path separator
    pub separator: char,
}

impl ResourceAddress {
    /// Parse an `scheme://host[:port]/path` URL
    pub fn parse(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(Error::InvalidArgument(format!("URL '{raw}' has no host"))),
        };
        let path = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|e| Error::InvalidArgument(format!("URL '{raw}' has an invalid path: {e}")))?
            .into_owned();

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            path,
            separator: SEPARATOR,
        })
    }

    /// Copy of this address with a different path
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            path: path.into(),
            separator: self.separator,
        }
    }

    /// Whether the path ends with the separator (directory semantics)
    pub fn has_trailing_separator(&self) -> bool {
        self.path.ends_with(self.separator)
    }

    /// Whether requests should be sent over TLS
    pub fn is_secure(&self) -> bool {
        self.scheme != "http"
    }

    /// Split the address into `(bucket, object)`
    ///
    /// For virtual-host style addresses the bucket is the host prefix in
    /// front of the provider marker, and the original path becomes the
    /// object. Missing components are empty strings.
    pub fn bucket_and_object(&self, virtual_style: bool) -> (String, String) {
        let sep = self.separator;
        let mut path = self.path.clone();

        if virtual_style {
            if let Some(bucket) = virtual_host_bucket(&self.host) {
                path = format!("{sep}{bucket}{}", self.path);
            }
        }

        let mut splits = path.splitn(3, sep).skip(1);
        let bucket = splits.next().unwrap_or_default().to_string();
        let object = splits.next().unwrap_or_default().to_string();
        (bucket, object)
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}://{}{}", self.scheme, self.host, self.path)
        }
    }
}

/// Bucket label in front of the provider marker of a virtual-host name
///
/// The marker must start a label, so bucket names that contain `s3` are
/// kept whole. The last Amazon marker wins since bucket names may contain
/// dots.
fn virtual_host_bucket(host: &str) -> Option<&str> {
    let marker = if is_google(host) {
        host.find(".storage.googleapis.")
    } else {
        host.rfind(".s3")
    };
    // A marker at position 0 leaves no room for a bucket name.
    marker.filter(|&i| i > 0).map(|i| &host[..i])
}

/// Join path segments under a leading separator
///
/// Empty segments are skipped and separators between segments collapse to
/// one. A trailing separator on the last segment is kept, so directory
/// entries stay recognizable.
pub fn join_path(separator: char, segments: &[&str]) -> String {
    let mut joined = String::new();
    for segment in segments {
        let trimmed = segment.trim_matches(separator);
        if trimmed.is_empty() {
            continue;
        }
        joined.push(separator);
        joined.push_str(trimmed);
    }

    let trailing = segments
        .iter()
        .rev()
        .find(|s| !s.is_empty())
        .is_some_and(|s| s.ends_with(separator));
    if joined.is_empty() || trailing {
        joined.push(separator);
    }
    joined
}

fn host_matches(pattern: &str, host: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(host))
        .unwrap_or(false)
}

/// Host is an Amazon S3 virtual-host endpoint
pub fn is_amazon(host: &str) -> bool {
    host_matches(AMAZON_VIRTUAL_HOST_PATTERN, host)
}

/// Host is a Google Cloud Storage virtual-host endpoint
pub fn is_google(host: &str) -> bool {
    host_matches(GOOGLE_VIRTUAL_HOST_PATTERN, host)
}

/// Whether buckets are addressed through the host name
///
/// Only Amazon S3 and Google Cloud Storage are recognized; every other host
/// uses path style.
pub fn is_virtual_host_style(host: &str) -> bool {
    is_amazon(host) || is_google(host)
}

/// Host the backend SDK should connect to
///
/// Virtual-host style hosts are reduced to the provider's canonical endpoint,
/// the SDK re-adds the bucket itself.
pub fn endpoint_host(host: &str) -> &str {
    if is_amazon(host) {
        AMAZON_HOST_NAME
    } else if is_google(host) {
        GOOGLE_HOST_NAME
    } else {
        host
    }
}

/// Whether a bucket name matches `^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$`
pub fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let edge = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let inner = |b: u8| edge(b) || b == b'.' || b == b'-';

    (3..=63).contains(&bytes.len())
        && edge(bytes[0])
        && edge(bytes[bytes.len() - 1])
        && bytes[1..bytes.len() - 1].iter().all(|&b| inner(b))
}

/// Validate a bucket name, reporting why it was rejected
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BucketNameEmpty);
    }
    if name.len() < 3 || name.len() > 63 {
        return Err(Error::BucketInvalid {
            bucket: name.to_string(),
            reason: "bucket name must be between 3 and 63 characters long".into(),
        });
    }
    if !is_valid_bucket_name(name) {
        return Err(Error::BucketInvalid {
            bucket: name.to_string(),
            reason: "bucket name can contain lowercase letters, numbers, '.' and '-', \
                     and must start and end with a letter or number"
                .into(),
        });
    }
    Ok(())
}
