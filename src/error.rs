//! Error taxonomy for conversion and transfer.
//!
//! Errors fall into a handful of groups that callers treat differently:
//!
//! - **Configuration** ([`Error::Config`], [`Error::UnsupportedFormat`],
//!   [`Error::Settings`]) fail fast before any I/O and are never retried.
//! - **Missing objects** ([`Error::NotFound`]) skip one object in a batch.
//! - **Decoding** ([`Error::Decode`]) triggers the one-shot encoding fallback
//!   in [`crate::pipeline::ConversionPipeline`].
//! - **Storage** ([`Error::Storage`]) abort the current file; siblings in a
//!   batch continue.
//! - Everything else (malformed rows, casts, transforms, Arrow/Parquet/IO)
//!   aborts the current file.

use crate::storage::{ErrorKind, StorageError};
use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("settings error: {0}")]
    Settings(#[from] ::config::ConfigError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot decode line {line} as {encoding}")]
    Decode { encoding: &'static str, line: u64 },

    #[error("malformed row at line {line}: {message}")]
    Malformed { line: u64, message: String },

    #[error("column {column:?}: cannot parse {value:?} as {target} (line {line})")]
    Cast {
        column: String,
        value: String,
        target: &'static str,
        line: u64,
    },

    #[error("chunk transform failed: {0}")]
    Transform(#[source] anyhow::Error),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
}

impl Error {
    /// True for decoding failures that the pipeline may recover from by
    /// re-reading with the fallback encoding.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Storage(err) => err.kind == ErrorKind::NotFound,
            _ => false,
        }
    }

    /// True for errors raised before any I/O took place.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnsupportedFormat(_) | Self::Settings(_)
        )
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err.kind {
            ErrorKind::NotFound => Self::NotFound(err.message),
            _ => Self::Storage(err),
        }
    }
}
