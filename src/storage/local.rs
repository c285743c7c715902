//! Filesystem-backed storage.
//!
//! A bucket is a directory under the storage root and a key is a `/`-separated
//! path relative to that directory. This is what lets the orchestrator target
//! local disk through the same [`ObjectStorage`] interface as S3.

use crate::storage::traits::{ErrorKind, ObjectStorage, StorageError, StorageResult};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." {
            return Err(StorageError::new(
                ErrorKind::InvalidInput,
                format!("invalid bucket name {bucket:?}"),
            ));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::new(
                ErrorKind::InvalidInput,
                format!("invalid object key {key:?}"),
            ));
        }
        Ok(self.bucket_dir(bucket)?.join(relative))
    }
}

/// Collect every file under `dir` as a `/`-separated key relative to `base`.
fn collect_keys(base: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_keys(base, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(key);
        }
    }
    Ok(())
}

impl ObjectStorage for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        Ok(self.bucket_dir(bucket)?.is_dir())
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(StorageError::new(
                ErrorKind::NotFound,
                format!("bucket {bucket} not found under {}", self.root.display()),
            ));
        }
        let mut keys = Vec::new();
        collect_keys(&dir, &dir, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<PathBuf> {
        let source = self.object_path(bucket, key)?;
        if !source.is_file() {
            return Err(StorageError::not_found(bucket, key));
        }
        fs::copy(&source, local_path)
            .map_err(|e| StorageError::from(e).with_source(source.display().to_string()))?;
        Ok(local_path.to_path_buf())
    }

    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()> {
        let target = self.object_path(bucket, key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(local_path, &target)
            .map_err(|e| StorageError::from(e).with_source(local_path.display().to_string()))?;
        Ok(())
    }
}
