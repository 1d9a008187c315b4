//! End-to-end extraction run: page loop, streaming CSV write, upload, report.

use crate::config::IngestConfig;
use crate::core::cleaner::{CleaningSummary, RecordCleaner};
use crate::core::client::{ApiClientSettings, PagedApiClient};
use crate::core::stats::RunStatistics;
use crate::core::uploader::StorageUploader;
use crate::core::writer::StreamingCsvWriter;
use crate::domain::ports::BlobStorage;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use crate::utils::retry::backoff_duration;
use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound of the random extra wait added to the courtesy delay between pages.
const PAGE_DELAY_JITTER_SECS: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub endpoint: String,
    pub records_per_page: u32,
    /// Seconds to wait between pages, before jitter.
    pub inter_page_delay: f64,
    pub output_dir: PathBuf,
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub local_path: PathBuf,
    /// `None` when nothing was uploaded; the local file is still complete.
    pub remote_uri: Option<String>,
    pub stats: RunStatistics,
    pub cleaning: CleaningSummary,
}

pub fn extract_filename() -> String {
    format!("customers_extract_{}.csv", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Number of pages to fetch given page 1's `metadata.total_pages`. Never less than 1.
fn page_count(reported: Option<i64>) -> u32 {
    match reported {
        None => {
            tracing::warn!("⚠️ Page 1 has no metadata.total_pages; assuming a single page");
            1
        }
        Some(n) if n < 1 => {
            tracing::warn!("⚠️ Page 1 reports total_pages={}; keeping page 1 only", n);
            1
        }
        Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
    }
}

/// Seconds to wait before the next page: `base + U(0, 0.5)`, with a negative base treated as 0.
pub fn courtesy_wait<R: Rng + ?Sized>(base: f64, rng: &mut R) -> f64 {
    base.max(0.0) + rng.gen_range(0.0..PAGE_DELAY_JITTER_SECS)
}

/// 客戶資料抽取流程
pub struct CustomerExtractor<S: BlobStorage> {
    settings: ExtractionSettings,
    client: PagedApiClient,
    writer: StreamingCsvWriter,
    uploader: StorageUploader<S>,
    stats: RunStatistics,
    rng: StdRng,
    monitor: SystemMonitor,
}

impl<S: BlobStorage> CustomerExtractor<S> {
    pub fn new(settings: ExtractionSettings, client: PagedApiClient, storage: S) -> Self {
        let path = settings.output_dir.join(extract_filename());
        Self {
            writer: StreamingCsvWriter::new(path, RecordCleaner::new()),
            settings,
            client,
            uploader: StorageUploader::new(storage),
            stats: RunStatistics::new(),
            rng: StdRng::from_entropy(),
            monitor: SystemMonitor::new(false),
        }
    }

    /// Creates `output_dir` if it is missing. Nothing is sent over the network here.
    pub fn from_config(config: &IngestConfig, storage: S) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;

        let mut client = PagedApiClient::new(ApiClientSettings {
            base_url: config.api_base_url.clone(),
            token: config.api_token.clone(),
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff_secs,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })?;
        if let Some(seed) = config.jitter_seed {
            client = client.with_rng(StdRng::seed_from_u64(seed));
        }

        let settings = ExtractionSettings {
            endpoint: config.api_endpoint.clone(),
            records_per_page: config.records_per_page,
            inter_page_delay: config.inter_page_delay_secs,
            output_dir: PathBuf::from(&config.output_dir),
            bucket: config.s3_bucket.clone(),
            prefix: config.s3_prefix.clone(),
        };

        let extractor = Self::new(settings, client, storage);
        Ok(match config.jitter_seed {
            Some(seed) => extractor.with_rng(StdRng::seed_from_u64(seed.wrapping_add(1))),
            None => extractor,
        })
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    /// Where the extract is written. Fixed at construction.
    pub fn output_path(&self) -> &Path {
        self.writer.path()
    }

    /// Runs the extraction. `Ok(None)` means page 1 could not be fetched and nothing was written.
    pub async fn run(mut self) -> Result<Option<ExtractionOutcome>> {
        let endpoint = self.settings.endpoint.clone();
        let limit = self.settings.records_per_page;

        tracing::info!("🚀 Starting customer extraction from {}{}", self.client.settings().base_url, endpoint);
        tracing::info!("🎯 Upload target: {}/{}/", self.settings.bucket, self.settings.prefix);
        self.monitor.log_stats("Start");

        tracing::info!("📡 Fetching metadata (page 1)...");
        let Some(first) = self.client.fetch_page(&mut self.stats, &endpoint, 1, limit).await else {
            tracing::error!("❌ Failed to get first page, extraction aborted");
            println!("{}", self.stats);
            return Ok(None);
        };

        let total_pages = page_count(first.total_pages());
        tracing::info!(
            "📄 Total pages: {}, records per page: {}, estimated records: ~{}",
            total_pages,
            limit,
            u64::from(total_pages) * u64::from(limit)
        );

        self.stats.pages_requested = 1;
        let accepted = self.writer.write_records(&first.data)?;
        self.stats.add_success(accepted as u64);
        tracing::info!("✅ Page 1/{}: {} raw → {} cleaned", total_pages, first.data.len(), accepted);

        for page in 2..=total_pages {
            self.courtesy_delay().await;
            self.stats.pages_requested += 1;

            match self.client.fetch_page(&mut self.stats, &endpoint, page, limit).await {
                Some(response) => {
                    let accepted = self.writer.write_records(&response.data)?;
                    self.stats.add_success(accepted as u64);
                    tracing::info!(
                        "✅ Page {}/{}: {} raw → {} cleaned",
                        page,
                        total_pages,
                        response.data.len(),
                        accepted
                    );
                }
                None => tracing::warn!("❌ Page {}/{}: failed, continuing", page, total_pages),
            }
        }
        self.monitor.log_stats("Extraction");

        tracing::info!("📁 Data extraction complete! Local file: {}", self.writer.path().display());
        println!("\n{}", self.writer.cleaner().summary());

        let remote_uri = if self.writer.columns().is_some() {
            let metadata = self.upload_metadata();
            self.uploader
                .upload_with_metadata(
                    self.writer.path(),
                    &self.settings.bucket,
                    &self.settings.prefix,
                    &metadata,
                )
                .await
        } else {
            tracing::warn!("⚠️ No records were accepted, nothing to upload");
            None
        };

        println!("{}", self.stats);
        tracing::info!("📊 Run statistics: {}", serde_json::to_string(&self.stats.snapshot())?);
        self.monitor.log_final_stats();

        Ok(Some(ExtractionOutcome {
            local_path: self.writer.path().to_path_buf(),
            remote_uri,
            cleaning: self.writer.cleaner().summary().clone(),
            stats: self.stats,
        }))
    }

    fn next_courtesy_wait(&mut self) -> f64 {
        courtesy_wait(self.settings.inter_page_delay, &mut self.rng)
    }

    async fn courtesy_delay(&mut self) {
        let wait = self.next_courtesy_wait();
        tracing::debug!("Waiting {:.2}s before the next page", wait);
        tokio::time::sleep(backoff_duration(wait)).await;
    }

    fn upload_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("source-endpoint".to_string(), self.settings.endpoint.clone()),
            ("pages-requested".to_string(), self.stats.pages_requested.to_string()),
            ("successful-pages".to_string(), self.stats.successful_pages.to_string()),
            ("failed-pages".to_string(), self.stats.failed_pages.to_string()),
            ("total-retries".to_string(), self.stats.total_retries.to_string()),
            ("records-ingested".to_string(), self.stats.records_ingested.to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalBlobStorage;

    fn extractor(inter_page_delay: f64) -> CustomerExtractor<LocalBlobStorage> {
        let client = PagedApiClient::new(ApiClientSettings {
            base_url: "http://127.0.0.1:1".to_string(),
            token: "t".to_string(),
            max_retries: 1,
            initial_backoff: 0.0,
            request_timeout: Duration::from_secs(1),
        })
        .unwrap();
        let settings = ExtractionSettings {
            endpoint: "/api/v1/customers".to_string(),
            records_per_page: 10,
            inter_page_delay,
            output_dir: PathBuf::from("."),
            bucket: "customer-data".to_string(),
            prefix: "raw/customers".to_string(),
        };
        CustomerExtractor::new(settings, client, LocalBlobStorage::new("."))
    }

    #[test]
    fn test_extract_filename_format() {
        let name = extract_filename();
        assert!(name.starts_with("customers_extract_"));
        assert!(name.ends_with(".csv"));
        // customers_extract_YYYYmmdd_HHMMSS.csv
        assert_eq!(name.len(), "customers_extract_".len() + 15 + ".csv".len());
    }

    #[test]
    fn test_page_count_clamps_bad_values() {
        assert_eq!(page_count(None), 1);
        assert_eq!(page_count(Some(-1)), 1);
        assert_eq!(page_count(Some(0)), 1);
        assert_eq!(page_count(Some(7)), 7);
        assert_eq!(page_count(Some(i64::MAX)), u32::MAX);
    }

    #[test]
    fn test_courtesy_wait_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let wait = courtesy_wait(0.5, &mut rng);
            assert!((0.5..=1.0).contains(&wait), "wait {} out of range", wait);
        }
        let wait = courtesy_wait(-3.0, &mut rng);
        assert!((0.0..PAGE_DELAY_JITTER_SECS).contains(&wait));
    }

    #[test]
    fn test_seeded_extractor_waits_are_reproducible() {
        let mut first = extractor(0.25).with_rng(StdRng::seed_from_u64(42));
        let mut second = extractor(0.25).with_rng(StdRng::seed_from_u64(42));

        let a: Vec<f64> = (0..5).map(|_| first.next_courtesy_wait()).collect();
        let b: Vec<f64> = (0..5).map(|_| second.next_courtesy_wait()).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|w| (0.25..=0.75).contains(w)));

        let mut other = extractor(0.25).with_rng(StdRng::seed_from_u64(43));
        let c: Vec<f64> = (0..5).map(|_| other.next_courtesy_wait()).collect();
        assert_ne!(a, c);
    }
}
