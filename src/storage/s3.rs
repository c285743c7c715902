//! S3 (and S3-compatible, e.g. MinIO) storage backend.
//!
//! The AWS SDK is async; [`S3Storage`] owns a current-thread Tokio runtime and
//! blocks on it so that it can implement the synchronous [`ObjectStorage`] trait.

use crate::error::{Error, Result};
use crate::storage::traits::{ErrorKind, ObjectStorage, StorageError, StorageResult};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub force_path_style: bool,
}

pub struct S3Storage {
    client: Client,
    runtime: Runtime,
}

impl S3Storage {
    /// Build a client from explicit credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when credentials or the region are missing, and
    /// [`Error::Io`] if the runtime cannot be started.
    pub fn new(config: &S3Config) -> Result<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(Error::Config("no S3 credentials provided".into()));
        }
        if config.region.is_empty() {
            return Err(Error::Config("no S3 region provided".into()));
        }

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client: Client::from_conf(builder.build()),
            runtime,
        })
    }
}

fn sdk_error<E, R>(what: String, err: &SdkError<E, R>) -> StorageError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let kind = match err {
        SdkError::TimeoutError(_) => ErrorKind::Timeout,
        SdkError::DispatchFailure(_) => ErrorKind::Network,
        SdkError::ResponseError(_) => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Other,
    };
    StorageError::new(kind, what).with_source(err.to_string())
}

impl ObjectStorage for S3Storage {
    fn name(&self) -> &str {
        "s3"
    }

    fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        self.runtime.block_on(async {
            match self.client.head_bucket().bucket(bucket).send().await {
                Ok(_) => Ok(true),
                Err(SdkError::ServiceError(err)) => {
                    debug!(bucket, error = ?err.err(), "bucket not accessible");
                    Ok(false)
                }
                Err(e) => Err(sdk_error(format!("head bucket {bucket}"), &e)),
            }
        })
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        self.runtime.block_on(async {
            let mut keys = Vec::new();
            let mut continuation_token = None;

            loop {
                let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
                if let Some(token) = &continuation_token {
                    request = request.continuation_token(token);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| sdk_error(format!("list {bucket}/{prefix}"), &e))?;

                if let Some(contents) = response.contents {
                    keys.extend(contents.into_iter().filter_map(|object| object.key));
                }

                continuation_token = response.next_continuation_token;
                if continuation_token.is_none() {
                    break;
                }
            }

            keys.sort();
            Ok(keys)
        })
    }

    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<PathBuf> {
        self.runtime.block_on(async {
            let response = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| match e {
                    SdkError::ServiceError(ref err) if err.err().is_no_such_key() => {
                        StorageError::not_found(bucket, key)
                    }
                    _ => sdk_error(format!("download {bucket}/{key}"), &e),
                })?;

            let mut file = std::fs::File::create(local_path)?;
            let mut body = response.body;
            while let Some(bytes) = body.next().await {
                let bytes = bytes.map_err(|e| {
                    StorageError::new(ErrorKind::Network, format!("read body of {bucket}/{key}"))
                        .with_source(e.to_string())
                })?;
                file.write_all(&bytes)?;
            }
            file.flush()?;
            Ok(local_path.to_path_buf())
        })
    }

    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(local_path).await.map_err(|e| {
                StorageError::new(
                    ErrorKind::InvalidInput,
                    format!("read {}", local_path.display()),
                )
                .with_source(e.to_string())
            })?;
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| sdk_error(format!("upload {bucket}/{key}"), &e))?;
            Ok(())
        })
    }
}
