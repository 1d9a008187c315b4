pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;
pub use config::IngestConfig;

#[cfg(feature = "s3")]
pub use adapters::storage::S3BlobStorage;
pub use adapters::storage::LocalBlobStorage;

pub use core::cleaner::{CleaningSummary, RecordCleaner};
pub use core::client::{ApiClientSettings, PagedApiClient};
pub use core::extractor::{CustomerExtractor, ExtractionOutcome, ExtractionSettings};
pub use core::stats::RunStatistics;
pub use core::uploader::StorageUploader;
pub use core::writer::StreamingCsvWriter;
pub use domain::ports::BlobStorage;
pub use utils::error::{EtlError, Result};
