use crate::domain::ports::BlobStorage;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Stores objects as files under `{root}/{bucket}/{key}`. Used for local runs without S3.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let target = self.object_path(bucket, key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::copy(local_path, &target).await?;

        // 本地模式下把 metadata 存成旁邊的 JSON 檔
        if !metadata.is_empty() {
            let mut sidecar = target.into_os_string();
            sidecar.push(".metadata.json");
            tokio::fs::write(sidecar, serde_json::to_vec_pretty(metadata)?).await?;
        }
        Ok(())
    }

    fn object_uri(&self, bucket: &str, key: &str) -> String {
        format!("file://{}", self.object_path(bucket, key).display())
    }
}

#[cfg(feature = "s3")]
pub use s3::S3BlobStorage;

#[cfg(feature = "s3")]
mod s3 {
    use super::*;
    use crate::utils::error::EtlError;
    use aws_config::BehaviorVersion;
    use aws_sdk_s3::config::Region;
    use aws_sdk_s3::error::DisplayErrorContext;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::Client as S3Client;

    #[derive(Debug, Clone)]
    pub struct S3BlobStorage {
        client: S3Client,
    }

    impl S3BlobStorage {
        pub fn new(client: S3Client) -> Self {
            Self { client }
        }

        /// Builds a client from the default AWS credential chain.
        pub async fn from_env(region: Option<String>) -> Self {
            let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
            let mut builder = aws_sdk_s3::config::Builder::from(&shared);
            if let Some(region) = region {
                builder = builder.region(Region::new(region));
            }
            Self::new(S3Client::from_conf(builder.build()))
        }
    }

    #[async_trait]
    impl BlobStorage for S3BlobStorage {
        async fn put_file(
            &self,
            bucket: &str,
            key: &str,
            local_path: &Path,
            metadata: &HashMap<String, String>,
        ) -> Result<()> {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|e| EtlError::StorageError {
                    message: format!("Failed to read {}: {}", local_path.display(), e),
                })?;

            let metadata = (!metadata.is_empty()).then(|| metadata.clone());

            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_type("text/csv")
                .set_metadata(metadata)
                .body(body)
                .send()
                .await
                .map_err(|e| EtlError::StorageError {
                    message: format!("Failed to write to S3: {}", DisplayErrorContext(&e)),
                })?;

            Ok(())
        }

        fn object_uri(&self, bucket: &str, key: &str) -> String {
            format!("s3://{}/{}", bucket, key)
        }
    }
}
