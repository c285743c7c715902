//! Storage collaborators.
//!
//! The orchestrator only talks to the [`ObjectStorage`] trait:
//!
//! - [`LocalStorage`] - buckets are directories under a root
//! - [`FakeStorage`] - in-memory, with failure injection for tests
//! - `S3Storage` - AWS S3 or compatible endpoints (feature: `s3`)
//!
//! Transient failures ([`ErrorKind::is_retryable`]) are retried by
//! [`retry::retry_with_backoff`].

pub mod fake;
pub mod local;
pub mod retry;
#[cfg_attr(docsrs, doc(cfg(feature = "s3")))]
#[cfg(feature = "s3")]
pub mod s3;
pub mod traits;

pub use fake::FakeStorage;
pub use local::LocalStorage;
pub use retry::{RetryConfig, retry_with_backoff};
#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Storage};
pub use traits::*;
