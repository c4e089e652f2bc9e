//! Error types for bucketfs-core
//!
//! Provides the domain error taxonomy seen by upper-level tools, the raw
//! [`BackendError`] reported by the storage SDK, and [`translate_error`],
//! which maps one onto the other at every adapter boundary.

use thiserror::Error;

/// Result type alias for bucketfs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error code the SDK reports when a request body ended early
pub const CODE_UNEXPECTED_EOF: &str = "UnexpectedEOF";

/// Error code MinIO reports when a key collides with a directory prefix
pub const CODE_EXISTS_AS_DIRECTORY: &str = "XMinioObjectExistsAsDirectory";

/// A raw error reported by the storage SDK
///
/// `code` is the service error code (`NoSuchKey`, `AccessDenied`, ...) or an
/// empty string for transport failures that never reached the service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// An error without a service code (connection reset, timeout, ...)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new("", message)
    }

    /// The request body reached end-of-stream before the announced size
    pub fn end_of_stream(message: impl Into<String>) -> Self {
        Self::new(CODE_UNEXPECTED_EOF, message)
    }
}

/// Error types for bucketfs operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed argument detected before any backend call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The address carries no bucket component
    #[error("Bucket name cannot be empty")]
    BucketNameEmpty,

    /// A bucket can only be created at the top level
    #[error("Bucket name cannot be nested below another path component")]
    BucketNameTopLevel,

    /// Bucket name rejected locally or by the backend
    #[error("Bucket name '{bucket}' is invalid: {reason}")]
    BucketInvalid { bucket: String, reason: String },

    #[error("Bucket '{bucket}' does not exist")]
    BucketDoesNotExist { bucket: String },

    #[error("Object does not exist")]
    ObjectMissing,

    #[error("Object '{object}' already exists")]
    ObjectAlreadyExists { object: String },

    #[error("Object '{object}' already exists as a directory")]
    ObjectAlreadyExistsAsDirectory { object: String },

    /// Archived object that cannot be read without a restore
    #[error("Object '{object}' is archived and must be restored before it can be read")]
    ObjectOnGlacier { object: String },

    #[error("Insufficient permissions to access '{path}'")]
    PathInsufficientPermission { path: String },

    /// Upload ended before the announced size was written
    #[error("Unexpected short write: wrote {written} of {expected} bytes")]
    UnexpectedShortWrite { expected: i64, written: i64 },

    /// Backend error without a domain counterpart
    #[error("Backend error: {0}")]
    Backend(BackendError),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Feature not supported by the backend
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_)
            | Error::BucketNameEmpty
            | Error::BucketNameTopLevel
            | Error::BucketInvalid { .. }
            | Error::Config(_)
            | Error::InvalidUrl(_) => 2, // UsageError
            Error::UnexpectedShortWrite { .. } => 3, // NetworkError
            Error::PathInsufficientPermission { .. } => 4, // AuthError
            Error::BucketDoesNotExist { .. } | Error::ObjectMissing => 5, // NotFound
            Error::ObjectAlreadyExists { .. } | Error::ObjectAlreadyExistsAsDirectory { .. } => 6, // Conflict
            Error::ObjectOnGlacier { .. } | Error::UnsupportedFeature(_) => 7, // UnsupportedFeature
            _ => 1, // GeneralError
        }
    }
}

/// What the failing operation was acting on
///
/// Supplies the names carried by the translated error. `expected`/`written`
/// are only meaningful for uploads.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext<'a> {
    pub bucket: &'a str,
    pub object: &'a str,
    /// Display form of the address the operation targeted
    pub path: &'a str,
    pub expected: i64,
    pub written: i64,
}

impl<'a> ErrorContext<'a> {
    pub fn new(bucket: &'a str, object: &'a str, path: &'a str) -> Self {
        Self {
            bucket,
            object,
            path,
            ..Default::default()
        }
    }

    /// Attach upload progress for short-write reporting
    pub fn with_progress(mut self, expected: i64, written: i64) -> Self {
        self.expected = expected;
        self.written = written;
        self
    }
}

/// Map a backend error onto the domain taxonomy
///
/// Total: every code has exactly one outcome, unknown codes fall through to
/// [`Error::Backend`].
pub fn translate_error(err: BackendError, ctx: &ErrorContext<'_>) -> Error {
    match err.code.as_str() {
        "AccessDenied" => Error::PathInsufficientPermission {
            path: ctx.path.to_string(),
        },
        "NoSuchBucket" => Error::BucketDoesNotExist {
            bucket: ctx.bucket.to_string(),
        },
        "InvalidBucketName" => Error::BucketInvalid {
            bucket: ctx.bucket.to_string(),
            reason: err.message,
        },
        "NoSuchKey" | "InvalidArgument" => Error::ObjectMissing,
        CODE_UNEXPECTED_EOF => Error::UnexpectedShortWrite {
            expected: ctx.expected,
            written: ctx.written,
        },
        "MethodNotAllowed" => Error::ObjectAlreadyExists {
            object: ctx.object.to_string(),
        },
        CODE_EXISTS_AS_DIRECTORY => Error::ObjectAlreadyExistsAsDirectory {
            object: ctx.object.to_string(),
        },
        _ => Error::Backend(err),
    }
}
