//! bucketfs-s3: S3 adapter for bucketfs
//!
//! This crate presents an S3-compatible service as a resource tree. It
//! provides:
//! - [`S3Client`], the per-URL handle with listing, stat, watch, transfer,
//!   access and notification operations
//! - The client factory, which caches backends per host and credentials
//! - [`AwsBackend`], the `StorageApi` implementation on aws-sdk-s3. It is
//!   the only part that directly depends on the AWS SDK.

pub mod backend;
pub mod client;
pub mod factory;
pub mod listing;
mod notify;
mod post_policy;
mod stat;
pub mod watch;

pub use backend::{AwsBackend, AwsBackendBuilder};
pub use client::S3Client;
pub use factory::{BackendBuilder, BackendEndpoint, ClientFactory};
pub use listing::{ContentStream, ItemErrorPolicy, ListOptions};
pub use watch::{Event, EventKind, WatchObject, WatchParams};
