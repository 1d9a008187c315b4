pub mod cleaner;
pub mod client;
pub mod extractor;
pub mod stats;
pub mod uploader;
pub mod writer;

pub use crate::domain::model::{CleanedRecord, PageResponse, RawRecord};
pub use crate::domain::ports::BlobStorage;
pub use crate::utils::error::Result;
