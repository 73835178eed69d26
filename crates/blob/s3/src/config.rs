use serde::{Deserialize, Serialize};

/// Configuration for the S3 file store backend.
///
/// `endpoint_url` and `force_path_style` support S3-compatible stores
/// (Wasabi, MinIO, LocalStack) alongside AWS proper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BlobConfig {
    /// AWS region (or the region string the compatible store expects).
    pub region: String,

    /// Bucket holding all attachment objects.
    pub bucket: String,

    /// Endpoint URL override for S3-compatible stores.
    pub endpoint_url: Option<String>,

    /// Use path-style addressing instead of virtual-hosted buckets.
    #[serde(default)]
    pub force_path_style: bool,
}

impl S3BlobConfig {
    /// Create a new config for the given region and bucket.
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            bucket: bucket.into(),
            endpoint_url: None,
            force_path_style: false,
        }
    }

    /// Set the endpoint URL override.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Enable path-style addressing.
    #[must_use]
    pub fn with_path_style(mut self) -> Self {
        self.force_path_style = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_region_and_bucket() {
        let config = S3BlobConfig::new("ap-southeast-1", "laporan-files");
        assert_eq!(config.region, "ap-southeast-1");
        assert_eq!(config.bucket, "laporan-files");
        assert!(config.endpoint_url.is_none());
        assert!(!config.force_path_style);
    }

    #[test]
    fn builder_chain() {
        let config = S3BlobConfig::new("us-east-1", "b")
            .with_endpoint_url("https://s3.wasabisys.com")
            .with_path_style();
        assert_eq!(
            config.endpoint_url.as_deref(),
            Some("https://s3.wasabisys.com")
        );
        assert!(config.force_path_style);
    }
}
