//! Entries produced by listing and stat

use std::fmt;

use serde::Serialize;

use crate::address::ResourceAddress;

/// Kind of an enumerated entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Object,
    /// Bucket, common prefix or zero-byte directory marker
    Directory,
    /// Multipart upload that was started but never completed
    IncompleteUpload,
}

/// One entry of a listing, or the result of a stat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContent {
    /// Address of the entry
    pub url: ResourceAddress,

    /// Size in bytes, zero for directories
    pub size: i64,

    /// Last-modified time for objects, initiation time for incomplete
    /// uploads, creation time for buckets
    pub time: Option<jiff::Timestamp>,

    pub entry_type: EntryType,
}

impl ClientContent {
    /// Create an entry for an object
    pub fn object(url: ResourceAddress, size: i64, time: Option<jiff::Timestamp>) -> Self {
        Self {
            url,
            size,
            time,
            entry_type: EntryType::Object,
        }
    }

    /// Create an entry for a directory
    pub fn dir(url: ResourceAddress, time: Option<jiff::Timestamp>) -> Self {
        Self {
            url,
            size: 0,
            time,
            entry_type: EntryType::Directory,
        }
    }

    /// Create an entry for an incomplete upload
    pub fn incomplete(url: ResourceAddress, size: i64, initiated: Option<jiff::Timestamp>) -> Self {
        Self {
            url,
            size,
            time: initiated,
            entry_type: EntryType::IncompleteUpload,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    /// Human-readable size
    pub fn size_human(&self) -> String {
        humansize::format_size(self.size.max(0) as u64, humansize::BINARY)
    }
}

impl fmt::Display for ClientContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .time
            .map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| " ".repeat(19));
        write!(f, "[{date}] {:>9} {}", self.size_human(), self.url)
    }
}
