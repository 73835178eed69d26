use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use bytes::Bytes;
use tracing::{debug, error, info, instrument};

use laporan_blob::error::BlobError;
use laporan_blob::store::FileStore;

use crate::config::S3BlobConfig;

/// S3-backed [`FileStore`] with presigned GET URLs.
///
/// The client is built once at startup and injected wherever a file store is
/// needed; it is never mutated after construction.
pub struct S3FileStore {
    config: S3BlobConfig,
    client: aws_sdk_s3::Client,
}

impl std::fmt::Debug for S3FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3FileStore")
            .field("config", &self.config)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3FileStore {
    /// Create a new `S3FileStore` by building an AWS SDK client from ambient
    /// credentials and the given config.
    pub async fn new(config: S3BlobConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(ref endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);

        Self { config, client }
    }

    /// Create an `S3FileStore` with a pre-built client (for testing).
    pub fn with_client(config: S3BlobConfig, client: aws_sdk_s3::Client) -> Self {
        Self { config, client }
    }

    /// Verify the bucket is reachable with the configured credentials.
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    pub async fn health_check(&self) -> Result<(), BlobError> {
        debug!("performing S3 health check");
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "S3 health check failed");
                BlobError::Storage(format!("S3 health check failed: {e}"))
            })?;
        Ok(())
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    #[instrument(skip(self, data), fields(bucket = %self.config.bucket, key = %key, size = data.len()))]
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> Result<(), BlobError> {
        debug!("uploading object to S3");
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "S3 put_object failed");
                BlobError::Storage(e.to_string())
            })?;
        info!("S3 object uploaded");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket, key = %key))]
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| BlobError::Storage(format!("invalid presign TTL: {e}")))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                error!(error = %e, "S3 presign failed");
                BlobError::Storage(e.to_string())
            })?;

        Ok(presigned.uri().to_string())
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket, key = %key))]
    async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        debug!("deleting object from S3");
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "S3 delete_object failed");
                BlobError::Storage(e.to_string())
            })?;
        // S3 deletes are idempotent and don't report prior existence.
        Ok(true)
    }
}
