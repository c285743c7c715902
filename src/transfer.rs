//! Conversion plus upload to object storage.
//!
//! [`TransferOrchestrator`] has two modes:
//!
//! - **single file**: [`TransferOrchestrator::convert_and_upload`] converts
//!   a local file and uploads every part under the target prefix.
//! - **storage scan**: [`TransferOrchestrator::convert_and_upload_from_storage`]
//!   lists the source prefix, then downloads, converts and uploads each
//!   object in turn.
//!
//! Parts are deleted locally as soon as they are uploaded (and also when the
//! file fails), so local disk holds at most one part at a time. In scan mode
//! one bad object never aborts the batch: a failed download marks it
//! [`ObjectOutcome::Skipped`], a failed conversion or upload marks it
//! [`ObjectOutcome::Failed`], and the next object is processed.

use crate::config::ConvertOptions;
use crate::error::{Error, Result};
use crate::io::parquet::Part;
use crate::pipeline::convert;
use crate::storage::{
    ErrorKind, ObjectStorage, RetryConfig, is_prefix_marker, join_key, retry_with_backoff,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where files come from and go to.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub source_bucket: String,
    pub source_prefix: String,
    pub target_bucket: String,
    pub target_prefix: String,
    /// Scratch directory for downloaded objects.
    pub work_dir: PathBuf,
    /// Name downloads after the object key's base name instead of a random id.
    pub use_key_names: bool,
    /// Delete a user-supplied source after a successful single-file upload.
    pub delete_source: bool,
    pub retry: RetryConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            source_bucket: String::new(),
            source_prefix: String::new(),
            target_bucket: String::new(),
            target_prefix: String::new(),
            work_dir: PathBuf::from("."),
            use_key_names: true,
            delete_source: true,
            retry: RetryConfig::default(),
        }
    }
}

impl TransferConfig {
    #[must_use]
    pub fn new(target_bucket: impl Into<String>, target_prefix: impl Into<String>) -> Self {
        Self {
            target_bucket: target_bucket.into(),
            target_prefix: target_prefix.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_source(mut self, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.source_bucket = bucket.into();
        self.source_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    #[must_use]
    pub fn with_key_names(mut self, use_key_names: bool) -> Self {
        self.use_key_names = use_key_names;
        self
    }

    #[must_use]
    pub fn with_delete_source(mut self, delete_source: bool) -> Self {
        self.delete_source = delete_source;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Result of converting and uploading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub source: PathBuf,
    /// Uploaded keys, in part order.
    pub uploaded_keys: Vec<String>,
    pub rows: usize,
    pub fallback_used: bool,
}

impl FileReport {
    #[must_use]
    pub fn parts(&self) -> usize {
        self.uploaded_keys.len()
    }
}

/// What happened to one listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOutcome {
    Converted(FileReport),
    /// Download failed; nothing was converted.
    Skipped { reason: String, not_found: bool },
    /// Conversion or upload failed after a successful download.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReport {
    pub key: String,
    pub outcome: ObjectOutcome,
}

/// Per-object outcomes of one storage scan, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub objects: Vec<ObjectReport>,
}

impl TransferReport {
    pub fn converted(&self) -> impl Iterator<Item = (&str, &FileReport)> {
        self.objects.iter().filter_map(|o| match &o.outcome {
            ObjectOutcome::Converted(report) => Some((o.key.as_str(), report)),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.objects
            .iter()
            .filter(|o| matches!(o.outcome, ObjectOutcome::Skipped { .. }))
            .map(|o| o.key.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.objects
            .iter()
            .filter(|o| matches!(o.outcome, ObjectOutcome::Failed { .. }))
            .map(|o| o.key.as_str())
    }

    #[must_use]
    pub fn parts_uploaded(&self) -> usize {
        self.converted().map(|(_, r)| r.parts()).sum()
    }

    #[must_use]
    pub fn rows_uploaded(&self) -> usize {
        self.converted().map(|(_, r)| r.rows).sum()
    }

    /// No object failed. Skipped objects do not count as failures.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Progress callbacks. Every method has an empty default.
pub trait TransferObserver: Send + Sync {
    /// `position` is 1-based.
    fn object_started(&self, _key: &str, _position: usize, _total: usize) {}

    fn part_uploaded(&self, _part: &Part, _key: &str) {}

    fn object_finished(&self, _key: &str, _outcome: &ObjectOutcome) {}
}

/// Reports progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl TransferObserver for LogObserver {
    fn object_started(&self, key: &str, position: usize, total: usize) {
        info!(key, "processing object {position}/{total}");
    }

    fn part_uploaded(&self, part: &Part, key: &str) {
        info!(key, rows = part.rows, "uploaded part");
    }

    fn object_finished(&self, key: &str, outcome: &ObjectOutcome) {
        match outcome {
            ObjectOutcome::Converted(report) => {
                info!(key, parts = report.parts(), rows = report.rows, "object converted");
            }
            ObjectOutcome::Skipped { reason, .. } => warn!(key, reason = %reason, "object skipped"),
            ObjectOutcome::Failed { error } => error!(key, error = %error, "object failed"),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Converts files and moves the parts into object storage.
pub struct TransferOrchestrator {
    storage: Arc<dyn ObjectStorage>,
    config: TransferConfig,
    options: ConvertOptions,
    observer: Arc<dyn TransferObserver>,
}

impl std::fmt::Debug for TransferOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("storage", &self.storage.name())
            .field("config", &self.config)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Delete a local file, tolerating its absence.
fn remove_local(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed local file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "could not remove local file"),
    }
}

fn check_bucket(storage: &dyn ObjectStorage, role: &str, bucket: &str) -> Result<()> {
    if bucket.is_empty() {
        return Err(Error::Config(format!("no {role} bucket configured")));
    }
    if !storage.bucket_exists(bucket)? {
        return Err(Error::Config(format!(
            "{role} bucket {bucket:?} does not exist on {}",
            storage.name()
        )));
    }
    Ok(())
}

impl TransferOrchestrator {
    /// Validate configuration and bucket existence before any transfer.
    ///
    /// The target bucket is required. The source bucket is checked when set,
    /// and is required only by storage-scan mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid options or a missing bucket.
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        config: TransferConfig,
        options: ConvertOptions,
    ) -> Result<Self> {
        options.validate()?;
        check_bucket(storage.as_ref(), "target", &config.target_bucket)?;
        if !config.source_bucket.is_empty() {
            check_bucket(storage.as_ref(), "source", &config.source_bucket)?;
        }

        Ok(Self {
            storage,
            config,
            options,
            observer: Arc::new(LogObserver),
        })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Convert a local file and upload its parts.
    ///
    /// With `delete_source`, the file is deleted after every part was
    /// uploaded. On failure the source is kept and any local parts are removed.
    ///
    /// # Errors
    ///
    /// The first conversion or upload error.
    pub fn convert_and_upload(&self, path: impl AsRef<Path>) -> Result<FileReport> {
        let path = path.as_ref();
        let report = self.upload_parts(path)?;
        if self.config.delete_source {
            remove_local(path);
        }
        Ok(report)
    }

    /// Convert and upload every object under the source prefix.
    ///
    /// # Errors
    ///
    /// Only a missing source bucket, an unusable work directory or a failed
    /// listing abort the whole scan. Per-object failures are recorded in the
    /// returned [`TransferReport`].
    pub fn convert_and_upload_from_storage(&self) -> Result<TransferReport> {
        let bucket = &self.config.source_bucket;
        let prefix = &self.config.source_prefix;
        if bucket.is_empty() {
            return Err(Error::Config("no source bucket configured".into()));
        }

        let keys: Vec<String> = retry_with_backoff(&self.config.retry, "list", || {
            self.storage.list_objects(bucket, prefix)
        })?
        .into_iter()
        .filter(|key| !is_prefix_marker(key, prefix))
        .collect();
        info!(%bucket, %prefix, count = keys.len(), "listed source objects");

        fs::create_dir_all(&self.config.work_dir)?;

        let total = keys.len();
        let mut report = TransferReport::default();
        for (i, key) in keys.into_iter().enumerate() {
            self.observer.object_started(&key, i + 1, total);
            let outcome = self.process_object(&key);
            self.observer.object_finished(&key, &outcome);
            report.objects.push(ObjectReport { key, outcome });
        }

        info!(
            converted = report.converted().count(),
            skipped = report.skipped().count(),
            failed = report.failed().count(),
            parts = report.parts_uploaded(),
            rows = report.rows_uploaded(),
            "scan finished"
        );
        Ok(report)
    }

    fn process_object(&self, key: &str) -> ObjectOutcome {
        let local = self.config.work_dir.join(self.local_name(key));

        let downloaded = retry_with_backoff(&self.config.retry, "download", || {
            self.storage
                .download(&self.config.source_bucket, key, &local)
        });
        let path = match downloaded {
            Ok(path) => path,
            Err(err) => {
                remove_local(&local);
                return ObjectOutcome::Skipped {
                    not_found: err.kind == ErrorKind::NotFound,
                    reason: err.to_string(),
                };
            }
        };

        let converted = self.upload_parts(&path);
        remove_local(&path);
        match converted {
            Ok(report) => ObjectOutcome::Converted(report),
            Err(err) => ObjectOutcome::Failed {
                error: err.to_string(),
            },
        }
    }

    /// Local file name for a downloaded object. Random names keep the key's
    /// extensions so compressed inputs are still recognised.
    fn local_name(&self, key: &str) -> String {
        let base = key.rsplit('/').next().unwrap_or(key);
        if self.config.use_key_names && !base.is_empty() {
            return base.to_string();
        }
        let id = Uuid::new_v4();
        match base.find('.') {
            Some(dot) => format!("{id}{}", &base[dot..]),
            None => id.to_string(),
        }
    }

    fn upload_parts(&self, source: &Path) -> Result<FileReport> {
        let mut pipeline = convert(source, &self.options)?;
        // Keyed by index: a fallback restart re-uploads the same parts.
        let mut uploaded: BTreeMap<usize, (String, usize)> = BTreeMap::new();

        for next in &mut pipeline {
            let part = next?;
            let key = join_key(&self.config.target_prefix, &part.file_name);
            let result = retry_with_backoff(&self.config.retry, "upload", || {
                self.storage
                    .upload(&part.path, &self.config.target_bucket, &key)
            });
            remove_local(&part.path);
            result?;

            self.observer.part_uploaded(&part, &key);
            uploaded.insert(part.index, (key, part.rows));
        }

        let (uploaded_keys, rows) = uploaded.into_values().fold(
            (Vec::new(), 0),
            |(mut keys, total), (key, rows)| {
                keys.push(key);
                (keys, total + rows)
            },
        );
        Ok(FileReport {
            source: source.to_path_buf(),
            uploaded_keys,
            rows,
            fallback_used: pipeline.fallback_used(),
        })
    }
}
