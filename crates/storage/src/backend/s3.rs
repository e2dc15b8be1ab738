//! S3-compatible object store.
//!
//! This module provides an object store implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and
//! others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file; a single
//! client (and therefore a single set of credentials) serves every bucket
//! named in a run.

use crate::ObjectStore;
use crate::error::{ErrorKind, Result};
use crate::models::{ListPage, Metadata, ObjectKey};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, retry::RetryConfig};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use exn::ResultExt;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
///
/// The worker pool already bounds how many leaves run at once; this is a
/// ceiling for the client as a whole.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible object store.
///
/// # Supported Services
///
/// - AWS S3
/// - Backblaze B2 (via S3-compatible API)
/// - Tigris (Fly.io storage)
/// - MinIO
/// - Other S3-compatible services
///
/// # Examples
///
/// ```no_run
/// use downscale_storage::backend::S3Store;
///
/// let store = S3Store::new(
///     "s3",
///     "cn-northwest-1",
///     None::<String>,
///     "access_key_id",
///     "secret_access_key",
/// );
/// ```
#[derive(Debug, Clone)]
pub struct S3Store {
    name: String,
    client: Client,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Store {
    /// Create a new S3 object store.
    ///
    /// # Arguments
    /// * `name` - A name for this store (used in display/logging)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "downscale-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::from_client(name, Client::from_conf(config_builder.build()))
    }

    /// Wrap an already-configured client.
    pub fn from_client(name: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            client,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        }
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        // unwrap is safe: semaphore is never closed
        self.rate_limiter.clone().acquire_owned().await.unwrap()
    }

    /// Classify an SDK failure by its S3 error code.
    fn map_sdk_error<E, R>(bucket: &str, key: Option<&ObjectKey>, err: SdkError<E, R>) -> ErrorKind
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
        R: Debug + Send + Sync + 'static,
    {
        let key = key.map(ToString::to_string).unwrap_or_default();
        match err.code() {
            Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => ErrorKind::NotFound(bucket.to_string(), key),
            Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
                ErrorKind::PermissionDenied(format!("{bucket}/{key}"))
            },
            _ => ErrorKind::Network(DisplayErrorContext(&err).to_string()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, bucket: &str, continuation: Option<&str>) -> Result<ListPage> {
        let _permit = self.acquire_permit().await;
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation.map(str::to_string))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(bucket, None, e))?;
        let keys = output.contents().iter().filter_map(|object| object.key()).map(ObjectKey::from).collect();
        let next_token = output.next_continuation_token().map(str::to_string);
        Ok(ListPage { keys, next_token })
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<Vec<u8>> {
        let _permit = self.acquire_permit().await;
        let output =
            self.client.get_object().bucket(bucket).key(key.as_str()).send().await.map_err(|e| {
                match e.as_service_error() {
                    Some(service) if service.is_no_such_key() => ErrorKind::NotFound(bucket.to_string(), key.to_string()),
                    _ => Self::map_sdk_error(bucket, Some(key), e),
                }
            })?;
        // The permit is held until the body has been drained; the connection
        // is still in use until then.
        let body = output
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed to read body of {bucket}/{key}")))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn put(&self, bucket: &str, key: &ObjectKey, data: Vec<u8>, metadata: &Metadata) -> Result<()> {
        let _permit = self.acquire_permit().await;
        let size = data.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key.as_str())
            .set_metadata(Some(metadata.clone()))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(bucket, Some(key), e))?;
        tracing::trace!(store = %self.name, bucket, key = %key, bytes = size, "Uploaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
    use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
    use aws_sdk_s3::operation::put_object::PutObjectOutput;
    use aws_sdk_s3::types::Object;
    use aws_sdk_s3::types::error::NoSuchKey;
    use aws_smithy_mocks::{RuleMode, mock, mock_client};

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let first = mock!(Client::list_objects_v2)
            .match_requests(|req| req.bucket() == Some("photos") && req.continuation_token().is_none())
            .then_output(|| {
                ListObjectsV2Output::builder()
                    .contents(Object::builder().key("a.jpg").build())
                    .contents(Object::builder().key("b.png").build())
                    .is_truncated(true)
                    .next_continuation_token("page-2")
                    .build()
            });
        let second = mock!(Client::list_objects_v2)
            .match_requests(|req| req.continuation_token() == Some("page-2"))
            .then_output(|| ListObjectsV2Output::builder().contents(Object::builder().key("notes.txt").build()).build());
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&first, &second]);
        let store = S3Store::from_client("test", client);

        let keys = store.list("photos").await.unwrap();
        assert_eq!(keys, vec![ObjectKey::from("a.jpg"), ObjectKey::from("b.png"), ObjectKey::from("notes.txt")]);
        assert_eq!(first.num_calls(), 1);
        assert_eq!(second.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let rule = mock!(Client::get_object)
            .match_requests(|req| req.bucket() == Some("photos") && req.key() == Some("a.jpg"))
            .then_output(|| GetObjectOutput::builder().body(ByteStream::from_static(b"jpeg bytes")).build());
        let client = mock_client!(aws_sdk_s3, [&rule]);
        let store = S3Store::from_client("test", client);

        let data = store.get("photos", &ObjectKey::from("a.jpg")).await.unwrap();
        assert_eq!(data, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let rule = mock!(Client::get_object)
            .then_error(|| GetObjectError::NoSuchKey(NoSuchKey::builder().build()));
        let client = mock_client!(aws_sdk_s3, [&rule]);
        let store = S3Store::from_client("test", client);

        let err = store.get("photos", &ObjectKey::from("missing.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(bucket, key) if bucket == "photos" && key == "missing.jpg"));
    }

    #[tokio::test]
    async fn test_put_sends_metadata() {
        let rule = mock!(Client::put_object)
            .match_requests(|req| {
                req.bucket() == Some("thumbs")
                    && req.key() == Some("a.jpg")
                    && req.metadata().and_then(|m| m.get("origin")).map(String::as_str) == Some("downscale")
            })
            .then_output(|| PutObjectOutput::builder().build());
        let client = mock_client!(aws_sdk_s3, [&rule]);
        let store = S3Store::from_client("test", client);

        let metadata = Metadata::from([("origin".to_string(), "downscale".to_string())]);
        store.put("thumbs", &ObjectKey::from("a.jpg"), b"data".to_vec(), &metadata).await.unwrap();
        assert_eq!(rule.num_calls(), 1);
    }
}
