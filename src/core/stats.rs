use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Number of error messages shown in the final report.
const REPORTED_ERRORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageError {
    pub page: u32,
    pub message: String,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {}: {}", self.page, self.message)
    }
}

/// 整次抽取的統計資料
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub pages_requested: u32,
    pub successful_pages: u32,
    pub failed_pages: u32,
    pub total_retries: u32,
    pub records_ingested: u64,
    pub started_at: DateTime<Local>,
    pub errors: Vec<PageError>,
    start: Instant,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatistics {
    pub fn new() -> Self {
        Self {
            pages_requested: 0,
            successful_pages: 0,
            failed_pages: 0,
            total_retries: 0,
            records_ingested: 0,
            started_at: Local::now(),
            errors: Vec::new(),
            start: Instant::now(),
        }
    }

    pub fn add_success(&mut self, records: u64) {
        self.successful_pages += 1;
        self.records_ingested += records;
    }

    pub fn add_failure(&mut self, page: u32, message: impl Into<String>) {
        self.failed_pages += 1;
        self.errors.push(PageError {
            page,
            message: message.into(),
        });
    }

    pub fn add_retry(&mut self) {
        self.total_retries += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time as `"<m>m <s>s"`.
    pub fn execution_time(&self) -> String {
        format_elapsed(self.elapsed())
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_requested: self.pages_requested,
            successful_pages: self.successful_pages,
            failed_pages: self.failed_pages,
            total_retries: self.total_retries,
            records_ingested: self.records_ingested,
            started_at: self.started_at.to_rfc3339(),
            execution_time: self.execution_time(),
            errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{}", rule)?;
        writeln!(f, "--- Execution Report ---")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Pages Requested: {}", self.pages_requested)?;
        writeln!(f, "Successful Pages: {}", self.successful_pages)?;
        writeln!(f, "Failed Pages: {}", self.failed_pages)?;
        writeln!(f, "Total Retries: {}", self.total_retries)?;
        writeln!(f, "Records Ingested: {}", self.records_ingested)?;
        writeln!(f, "Execution Time: {}", self.execution_time())?;
        writeln!(f, "Format Chosen: CSV (streaming append, bounded memory)")?;
        writeln!(f, "Cleaning Strategy: ETL (clean before load)")?;

        if !self.errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "Errors encountered: {}", self.errors.len())?;
            for error in self.errors.iter().take(REPORTED_ERRORS) {
                writeln!(f, "  - {}", error)?;
            }
        }
        writeln!(f, "{}", rule)
    }
}

/// Serializable copy of the run statistics, attached to uploads and logged at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub pages_requested: u32,
    pub successful_pages: u32,
    pub failed_pages: u32,
    pub total_retries: u32,
    pub records_ingested: u64,
    pub started_at: String,
    pub execution_time: String,
    pub errors: Vec<String>,
}
