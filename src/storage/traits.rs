//! Object storage trait and its error type.
//!
//! The trait is synchronous. Backends built on async SDKs run their own
//! runtime internally and block on it, see [`crate::storage::s3`].

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Core Error Type
// ============================================================================

/// Error returned by every [`ObjectStorage`] operation.
#[derive(Debug, Clone)]
pub struct StorageError {
    pub message: String,
    pub kind: ErrorKind,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    InvalidInput,
    Network,
    Timeout,
    ServiceUnavailable,
    RateLimited,
    Other,
}

impl ErrorKind {
    /// Transient kinds worth another attempt.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::ServiceUnavailable | Self::RateLimited
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl Error for StorageError {}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            source: None,
        }
    }

    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("object {bucket}/{key} not found"))
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Authorization,
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            std::io::ErrorKind::Interrupted => ErrorKind::Network,
            _ => ErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// ObjectStorage
// ============================================================================

/// Blocking object storage operations used by the transfer orchestrator.
pub trait ObjectStorage: Send + Sync {
    /// Short backend name for logs (`"local"`, `"s3"`, ...).
    fn name(&self) -> &str;

    /// Check whether a bucket exists and is accessible.
    ///
    /// # Errors
    ///
    /// Returns an error only when the check itself could not be performed;
    /// a missing or forbidden bucket is `Ok(false)`.
    fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    /// List object keys under `prefix`, in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist or the listing fails
    fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>>;

    /// Download one object into `local_path` and return the written path.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::NotFound`] error if the object doesn't exist, and
    /// another kind for any other failure
    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<PathBuf>;

    /// Upload the file at `local_path` to `bucket/key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns an error if the local file cannot be read or the upload fails
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()>;
}

/// Join a key prefix and a file name with exactly one `/` between them.
///
/// An empty prefix yields the bare name.
#[must_use]
pub fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}/{name}")
    }
}

/// True for keys that only mark the listed prefix as a directory.
#[must_use]
pub fn is_prefix_marker(key: &str, prefix: &str) -> bool {
    let bare = prefix.trim_end_matches('/');
    if bare.is_empty() {
        return false;
    }
    key == bare || key.strip_suffix('/') == Some(bare)
}
