use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Durable object storage: store a local file's bytes under `bucket`/`key`.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        metadata: &HashMap<String, String>,
    ) -> Result<()>;

    /// Location of an object as shown to operators (e.g. `s3://bucket/key`).
    fn object_uri(&self, bucket: &str, key: &str) -> String;
}

#[async_trait]
impl<T: BlobStorage + ?Sized> BlobStorage for Box<T> {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        (**self).put_file(bucket, key, local_path, metadata).await
    }

    fn object_uri(&self, bucket: &str, key: &str) -> String {
        (**self).object_uri(bucket, key)
    }
}
