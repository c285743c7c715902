//! File and environment configuration for the `parquetify` binary.
//!
//! Settings are read from a TOML (or any format the `config` crate
//! recognises) file, then overridden by `PARQUETIFY_` environment variables
//! using `__` between sections, e.g. `PARQUETIFY_STORAGE__SECRET_KEY`.
//!
//! ```toml
//! [storage]
//! backend = "local"
//! root = "/srv/buckets"
//!
//! [transfer]
//! source_bucket = "raw"
//! source_prefix = "incoming/"
//! target_bucket = "curated"
//! target_prefix = "parquet"
//!
//! [convert]
//! chunk_size = 50000
//! compression = "zstd"
//! dtype = ["Month=utf8"]
//! ```

use crate::config::{Codec, ColumnTypeMap, ConvertOptions, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::io::encoding;
use crate::logging::Verbosity;
use crate::storage::{LocalStorage, ObjectStorage, RetryConfig};
use crate::transfer::TransferConfig;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub convert: ConvertSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory of the local backend.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_region")]
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransferSettings {
    #[serde(default)]
    pub source_bucket: String,
    #[serde(default)]
    pub source_prefix: String,
    #[serde(default)]
    pub target_bucket: String,
    #[serde(default)]
    pub target_prefix: String,
    #[serde(default = "default_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_true")]
    pub use_key_names: bool,
    #[serde(default = "default_true")]
    pub delete_source: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConvertSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub skip_rows: usize,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    pub encoding: Option<String>,
    #[serde(default = "default_fallback_encoding")]
    pub fallback_encoding: String,
    pub compression: Option<Codec>,
    #[serde(default = "default_file_type")]
    pub file_type: String,
    #[serde(default = "default_dir")]
    pub output_dir: PathBuf,
    /// `COLUMN=TYPE` entries; the loader lowercases table keys.
    #[serde(default)]
    pub dtype: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogSettings {
    #[serde(default)]
    pub verbosity: Verbosity,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_fallback_encoding() -> String {
    "windows-1252".to_string()
}

fn default_file_type() -> String {
    "csv".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_root(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            force_path_style: false,
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            source_bucket: String::new(),
            source_prefix: String::new(),
            target_bucket: String::new(),
            target_prefix: String::new(),
            work_dir: default_dir(),
            use_key_names: true,
            delete_source: true,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_rows: 0,
            has_header: true,
            delimiter: default_delimiter(),
            encoding: None,
            fallback_encoding: default_fallback_encoding(),
            compression: None,
            file_type: default_file_type(),
            output_dir: default_dir(),
            dtype: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (if given) and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Settings`] when the file is missing or malformed, or
    /// a value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("PARQUETIFY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        debug!(
            backend = ?settings.storage.backend,
            source = %settings.transfer.source_bucket,
            target = %settings.transfer.target_bucket,
            "loaded settings"
        );
        Ok(settings)
    }
}

/// Parse a single-byte delimiter; `\t` and `tab` mean a tab.
///
/// # Errors
///
/// Returns [`Error::Config`] for anything but one ASCII character.
pub fn parse_delimiter(value: &str) -> Result<u8> {
    if matches!(value, "\\t" | "tab") {
        return Ok(b'\t');
    }
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(Error::Config(format!(
            "delimiter must be a single ASCII character, got {value:?}"
        ))),
    }
}

/// Resolve an encoding label, where `none` or an empty string disables it.
fn optional_encoding(label: &str) -> Result<Option<&'static encoding_rs::Encoding>> {
    let label = label.trim();
    if label.is_empty() || label.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        encoding::resolve(label).map(Some)
    }
}

impl ConvertSettings {
    /// # Errors
    ///
    /// Returns [`Error::Config`] or [`Error::UnsupportedFormat`] for values
    /// that do not resolve.
    pub fn to_options(&self) -> Result<ConvertOptions> {
        let mut options = ConvertOptions::new()
            .with_chunk_size(self.chunk_size)
            .with_skip_rows(self.skip_rows)
            .with_header(self.has_header)
            .with_delimiter(parse_delimiter(&self.delimiter)?)
            .with_fallback_encoding(optional_encoding(&self.fallback_encoding)?)
            .with_column_types(ColumnTypeMap::parse_entries(&self.dtype)?)
            .with_output_dir(&self.output_dir)
            .with_file_type(&self.file_type)?;
        if let Some(label) = &self.encoding {
            options = options.with_encoding_label(label)?;
        }
        if let Some(codec) = self.compression {
            options = options.with_codec(codec);
        }
        options.validate()?;
        Ok(options)
    }
}

impl TransferSettings {
    #[must_use]
    pub fn to_config(&self) -> TransferConfig {
        TransferConfig {
            source_bucket: self.source_bucket.clone(),
            source_prefix: self.source_prefix.clone(),
            target_bucket: self.target_bucket.clone(),
            target_prefix: self.target_prefix.clone(),
            work_dir: self.work_dir.clone(),
            use_key_names: self.use_key_names,
            delete_source: self.delete_source,
            retry: self.retry,
        }
    }
}

impl StorageSettings {
    /// Build the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for missing S3 credentials, or when the S3
    /// backend is requested from a build without the `s3` feature.
    pub fn build(&self) -> Result<Arc<dyn ObjectStorage>> {
        match self.backend {
            StorageBackend::Local => Ok(Arc::new(LocalStorage::new(&self.root))),
            StorageBackend::S3 => self.build_s3(),
        }
    }

    #[cfg(feature = "s3")]
    fn build_s3(&self) -> Result<Arc<dyn ObjectStorage>> {
        use crate::storage::{S3Config, S3Storage};

        let config = S3Config {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone().unwrap_or_default(),
            secret_key: self.secret_key.clone().unwrap_or_default(),
            force_path_style: self.force_path_style,
        };
        Ok(Arc::new(S3Storage::new(&config)?))
    }

    #[cfg(not(feature = "s3"))]
    fn build_s3(&self) -> Result<Arc<dyn ObjectStorage>> {
        Err(Error::Config(
            "the s3 backend requires building with the `s3` feature".into(),
        ))
    }
}
