//! In-memory storage for tests.
//!
//! [`FakeStorage`] keeps every bucket in a shared map, so clones observe the
//! same state. Failures can be injected per key to exercise the orchestrator's
//! skip and cleanup paths without a real backend.

use crate::storage::traits::{ErrorKind, ObjectStorage, StorageError, StorageResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type BucketStorage = Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>;
type FailureMap = Arc<Mutex<HashMap<String, ErrorKind>>>;

#[derive(Clone, Default)]
pub struct FakeStorage {
    buckets: BucketStorage,
    download_failures: FailureMap,
    upload_failures: FailureMap,
    uploads: Arc<Mutex<Vec<String>>>,
}

impl FakeStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bucket if it does not exist yet.
    ///
    /// # Panics
    ///
    /// Panics if the storage mutex is poisoned.
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default();
    }

    /// Store `data` under `bucket/key`, creating the bucket on demand.
    ///
    /// # Panics
    ///
    /// Panics if the storage mutex is poisoned.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.buckets
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    /// # Panics
    ///
    /// Panics if the storage mutex is poisoned.
    #[must_use]
    pub fn get_object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .expect("storage mutex poisoned")
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
    }

    /// All keys currently stored in `bucket`, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the storage mutex is poisoned.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .expect("storage mutex poisoned")
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every successful upload as `bucket/key`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the uploads mutex is poisoned.
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().expect("uploads mutex poisoned").clone()
    }

    /// Make every download of `key` fail with `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the failure mutex is poisoned.
    pub fn fail_download(&self, key: &str, kind: ErrorKind) {
        self.download_failures
            .lock()
            .expect("failure mutex poisoned")
            .insert(key.to_string(), kind);
    }

    /// Make every upload whose key contains `fragment` fail with `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the failure mutex is poisoned.
    pub fn fail_upload(&self, fragment: &str, kind: ErrorKind) {
        self.upload_failures
            .lock()
            .expect("failure mutex poisoned")
            .insert(fragment.to_string(), kind);
    }

    fn injected_download_failure(&self, key: &str) -> Option<ErrorKind> {
        self.download_failures
            .lock()
            .expect("failure mutex poisoned")
            .get(key)
            .copied()
    }

    fn injected_upload_failure(&self, key: &str) -> Option<ErrorKind> {
        self.upload_failures
            .lock()
            .expect("failure mutex poisoned")
            .iter()
            .find(|(fragment, _)| key.contains(fragment.as_str()))
            .map(|(_, kind)| *kind)
    }
}

impl ObjectStorage for FakeStorage {
    fn name(&self) -> &str {
        "fake"
    }

    fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        Ok(self
            .buckets
            .lock()
            .expect("storage mutex poisoned")
            .contains_key(bucket))
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let buckets = self.buckets.lock().expect("storage mutex poisoned");
        let objects = buckets.get(bucket).ok_or_else(|| {
            StorageError::new(ErrorKind::NotFound, format!("bucket {bucket} not found"))
        })?;
        Ok(objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<PathBuf> {
        if let Some(kind) = self.injected_download_failure(key) {
            return Err(StorageError::new(
                kind,
                format!("injected download failure for {bucket}/{key}"),
            ));
        }
        let data = self
            .get_object(bucket, key)
            .ok_or_else(|| StorageError::not_found(bucket, key))?;
        fs::write(local_path, data)?;
        Ok(local_path.to_path_buf())
    }

    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()> {
        if let Some(kind) = self.injected_upload_failure(key) {
            return Err(StorageError::new(
                kind,
                format!("injected upload failure for {bucket}/{key}"),
            ));
        }
        let data = fs::read(local_path)?;
        self.put_object(bucket, key, data);
        self.uploads
            .lock()
            .expect("uploads mutex poisoned")
            .push(format!("{bucket}/{key}"));
        Ok(())
    }
}
