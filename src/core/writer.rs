use crate::core::cleaner::RecordCleaner;
use crate::domain::model::{CleanedRecord, RawRecord};
use crate::utils::error::Result;
use crate::utils::normalize::DEFAULT_TEXT;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Appends cleaned customer rows to a CSV file one page at a time.
///
/// The header is fixed by the first batch that yields at least one accepted record. The file is
/// opened and closed on every call, so only one page of records is held in memory.
#[derive(Debug)]
pub struct StreamingCsvWriter {
    path: PathBuf,
    cleaner: RecordCleaner,
    columns: Option<Vec<String>>,
    rows_written: u64,
}

impl StreamingCsvWriter {
    pub fn new(path: impl Into<PathBuf>, cleaner: RecordCleaner) -> Self {
        Self {
            path: path.into(),
            cleaner,
            columns: None,
            rows_written: 0,
        }
    }

    /// Cleans and appends one batch. Returns the number of rows written for this batch.
    pub fn write_records(&mut self, records: &[RawRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let cleaned: Vec<CleanedRecord> = records
            .iter()
            .filter_map(|record| self.cleaner.clean(record))
            .collect();

        if cleaned.is_empty() {
            tracing::debug!("All {} records in batch rejected, nothing written", records.len());
            return Ok(0);
        }

        let first_batch = self.columns.is_none();
        let columns = self.columns.get_or_insert_with(|| {
            let keys: BTreeSet<&str> = cleaned.iter().flat_map(|record| record.columns()).collect();
            keys.into_iter().map(str::to_string).collect()
        });

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(first_batch)
            .append(!first_batch)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if first_batch {
            tracing::debug!("Writing header with {} columns to {}", columns.len(), self.path.display());
            writer.write_record(columns.iter())?;
        }

        for record in &cleaned {
            writer.write_record(columns.iter().map(|column| {
                record
                    .get(column)
                    .map_or_else(|| DEFAULT_TEXT.to_string(), Cow::into_owned)
            }))?;
        }
        writer.flush()?;

        self.rows_written += cleaned.len() as u64;
        Ok(cleaned.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header columns, once the first non-empty batch has been written.
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn cleaner(&self) -> &RecordCleaner {
        &self.cleaner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn batch(values: serde_json::Value) -> Vec<RawRecord> {
        serde_json::from_value(values).unwrap()
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_round_trip_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = StreamingCsvWriter::new(&path, RecordCleaner::new());

        let written = writer
            .write_records(&batch(json!([
                {"id": 1, "name": "ann", "segment": "smb"},
                {"id": 2, "name": "bob", "email": "BOB@X.IO"},
                {"id": 3, "name": "cy", "city": "boston, ma"}
            ])))
            .unwrap();
        assert_eq!(written, 3);

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 4);

        let mut expected: Vec<String> = crate::domain::model::CORE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(["id".to_string(), "segment".to_string()])
            .collect();
        expected.sort();
        assert_eq!(rows[0], expected);
        assert_eq!(writer.columns().unwrap(), expected.as_slice());

        let city = expected.iter().position(|c| c == "city").unwrap();
        assert_eq!(rows[3][city], "Boston, Ma");
        let segment = expected.iter().position(|c| c == "segment").unwrap();
        assert_eq!(rows[1][segment], "smb");
        assert_eq!(rows[2][segment], "N/A");
    }

    #[test]
    fn test_later_batches_keep_first_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = StreamingCsvWriter::new(&path, RecordCleaner::new());

        writer
            .write_records(&batch(json!([{"id": 1, "name": "a", "segment": "smb"}])))
            .unwrap();
        writer
            .write_records(&batch(json!([{"id": 2, "name": "b", "region": "west"}])))
            .unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 3);
        assert!(!rows[0].contains(&"region".to_string()));
        let segment = rows[0].iter().position(|c| c == "segment").unwrap();
        assert_eq!(rows[2][segment], "N/A");
        assert_eq!(rows[2].len(), rows[0].len());
        assert_eq!(writer.rows_written(), 2);
    }

    #[test]
    fn test_empty_or_fully_rejected_batch_does_not_touch_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = StreamingCsvWriter::new(&path, RecordCleaner::new());

        assert_eq!(writer.write_records(&[]).unwrap(), 0);
        assert_eq!(
            writer
                .write_records(&batch(json!([{"name": "no id"}, {"id": 5}])))
                .unwrap(),
            0
        );

        assert!(!path.exists());
        assert!(writer.columns().is_none());
        assert_eq!(writer.cleaner().summary().records_rejected, 2);
    }

    #[test]
    fn test_first_write_truncates_stale_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale,content\n1,2\n").unwrap();

        let mut writer = StreamingCsvWriter::new(&path, RecordCleaner::new());
        writer
            .write_records(&batch(json!([{"id": 1, "name": "a"}])))
            .unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "address");
    }
}
