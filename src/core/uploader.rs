use crate::domain::ports::BlobStorage;
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::path::Path;

/// `{prefix}/date={YYYY-MM-DD}/{file name}`; `None` when the path has no file name.
pub fn partitioned_key(prefix: &str, date: NaiveDate, local_path: &Path) -> Option<String> {
    let file_name = local_path.file_name()?.to_str()?;
    let partition = format!("date={}", date.format("%Y-%m-%d"));
    let prefix = prefix.trim_end_matches('/');

    if prefix.is_empty() {
        Some(format!("{}/{}", partition, file_name))
    } else {
        Some(format!("{}/{}/{}", prefix, partition, file_name))
    }
}

/// Uploads finished extracts under a date-partitioned key.
///
/// Failures never propagate: they are logged and reported as `None`, and the local file stays
/// where it is.
pub struct StorageUploader<S: BlobStorage> {
    storage: S,
}

impl<S: BlobStorage> StorageUploader<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn upload(&self, local_path: &Path, bucket: &str, prefix: &str) -> Option<String> {
        self.upload_with_metadata(local_path, bucket, prefix, &HashMap::new())
            .await
    }

    pub async fn upload_with_metadata(
        &self,
        local_path: &Path,
        bucket: &str,
        prefix: &str,
        metadata: &HashMap<String, String>,
    ) -> Option<String> {
        self.upload_on(Local::now().date_naive(), local_path, bucket, prefix, metadata)
            .await
    }

    /// 以指定日期分區上傳
    pub async fn upload_on(
        &self,
        date: NaiveDate,
        local_path: &Path,
        bucket: &str,
        prefix: &str,
        metadata: &HashMap<String, String>,
    ) -> Option<String> {
        let Some(key) = partitioned_key(prefix, date, local_path) else {
            tracing::error!("❌ Cannot derive an object key from {}", local_path.display());
            return None;
        };

        tracing::info!("☁️ Uploading {} to {}", local_path.display(), self.storage.object_uri(bucket, &key));

        match self.storage.put_file(bucket, &key, local_path, metadata).await {
            Ok(()) => {
                let uri = self.storage.object_uri(bucket, &key);
                tracing::info!("✅ Upload successful: {}", uri);
                Some(uri)
            }
            Err(e) => {
                tracing::error!("❌ Upload failed: {}", e);
                tracing::warn!("💾 Local file kept at {}", local_path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{EtlError, Result};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingStorage {
        uploads: Arc<Mutex<Vec<(String, String, HashMap<String, String>)>>>,
        fail: bool,
    }

    #[async_trait]
    impl BlobStorage for RecordingStorage {
        async fn put_file(
            &self,
            bucket: &str,
            key: &str,
            _local_path: &Path,
            metadata: &HashMap<String, String>,
        ) -> Result<()> {
            if self.fail {
                return Err(EtlError::StorageError {
                    message: "access denied".to_string(),
                });
            }
            self.uploads
                .lock()
                .await
                .push((bucket.to_string(), key.to_string(), metadata.clone()));
            Ok(())
        }

        fn object_uri(&self, bucket: &str, key: &str) -> String {
            format!("mem://{}/{}", bucket, key)
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_partitioned_key() {
        let path = PathBuf::from("/tmp/out/customers_extract_20240309_101500.csv");
        assert_eq!(
            partitioned_key("raw/customers", date(), &path).unwrap(),
            "raw/customers/date=2024-03-09/customers_extract_20240309_101500.csv"
        );
        assert_eq!(
            partitioned_key("raw/customers/", date(), &path).unwrap(),
            "raw/customers/date=2024-03-09/customers_extract_20240309_101500.csv"
        );
        assert_eq!(
            partitioned_key("", date(), &path).unwrap(),
            "date=2024-03-09/customers_extract_20240309_101500.csv"
        );
        assert!(partitioned_key("raw", date(), Path::new("/")).is_none());
    }

    #[tokio::test]
    async fn test_upload_returns_uri_and_passes_metadata() {
        let storage = RecordingStorage::default();
        let uploader = StorageUploader::new(storage.clone());
        let mut metadata = HashMap::new();
        metadata.insert("records-ingested".to_string(), "5".to_string());

        let uri = uploader
            .upload_on(date(), Path::new("local/a.csv"), "bucket", "raw", &metadata)
            .await;

        assert_eq!(uri.as_deref(), Some("mem://bucket/raw/date=2024-03-09/a.csv"));
        let uploads = storage.uploads.lock().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1, "raw/date=2024-03-09/a.csv");
        assert_eq!(uploads[0].2.get("records-ingested").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn test_upload_failure_is_swallowed() {
        let storage = RecordingStorage {
            fail: true,
            ..Default::default()
        };
        let uploader = StorageUploader::new(storage);

        assert!(uploader.upload(Path::new("a.csv"), "bucket", "raw").await.is_none());
    }
}
