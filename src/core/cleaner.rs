use crate::domain::model::{CleanedRecord, RawRecord, CORE_COLUMNS};
use crate::utils::normalize::{
    normalize_age, normalize_email, normalize_name, normalize_phone, normalize_state,
    normalize_string, normalize_zip_code, validate_required_fields, DEFAULT_EMAIL, DEFAULT_TEXT,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

const REQUIRED_FIELDS: [&str; 2] = ["id", "name"];

/// 清洗統計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningSummary {
    pub records_processed: u64,
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub rejection_reasons: HashMap<String, u64>,
}

impl CleaningSummary {
    /// Rejection reasons, most frequent first (ties broken alphabetically).
    pub fn sorted_reasons(&self) -> Vec<(&str, u64)> {
        let mut reasons: Vec<(&str, u64)> = self
            .rejection_reasons
            .iter()
            .map(|(reason, count)| (reason.as_str(), *count))
            .collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        reasons
    }
}

impl fmt::Display for CleaningSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.records_processed == 0 {
            return writeln!(f, "No records processed");
        }

        let total = self.records_processed as f64;
        writeln!(f, "Data Cleaning Summary:")?;
        writeln!(f, "  Total records processed: {}", self.records_processed)?;
        writeln!(
            f,
            "  Accepted: {} ({:.1}%)",
            self.records_accepted,
            self.records_accepted as f64 / total * 100.0
        )?;
        writeln!(
            f,
            "  Rejected: {} ({:.1}%)",
            self.records_rejected,
            self.records_rejected as f64 / total * 100.0
        )?;

        if !self.rejection_reasons.is_empty() {
            writeln!(f, "  Rejection reasons:")?;
            for (reason, count) in self.sorted_reasons() {
                writeln!(f, "    - {}: {}", reason, count)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum CleaningError {
    #[error("id must be a scalar value, got {0}")]
    NonScalarId(&'static str),
}

/// Validates and normalizes raw customer records, keeping accept/reject tallies.
#[derive(Debug, Default)]
pub struct RecordCleaner {
    summary: CleaningSummary,
}

impl RecordCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when the record is rejected; the reason is tallied in the summary.
    pub fn clean(&mut self, record: &RawRecord) -> Option<CleanedRecord> {
        self.summary.records_processed += 1;

        if let Err(reason) = validate_required_fields(record, &REQUIRED_FIELDS) {
            tracing::debug!("Rejected record: {}", reason);
            self.reject(reason);
            return None;
        }

        match Self::clean_fields(record) {
            Ok(cleaned) => {
                self.summary.records_accepted += 1;
                Some(cleaned)
            }
            Err(e) => {
                tracing::debug!("Rejected record: {}", e);
                self.reject(format!("Cleaning error: {}", e));
                None
            }
        }
    }

    fn clean_fields(record: &RawRecord) -> std::result::Result<CleanedRecord, CleaningError> {
        let customer_id = match record.get("id") {
            Some(Value::Array(_)) => return Err(CleaningError::NonScalarId("array")),
            Some(Value::Object(_)) => return Err(CleaningError::NonScalarId("object")),
            other => normalize_string(other, DEFAULT_TEXT),
        };

        let extra: BTreeMap<String, String> = record
            .iter()
            .filter(|(key, _)| !CORE_COLUMNS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), normalize_string(Some(value), DEFAULT_TEXT)))
            .collect();

        Ok(CleanedRecord {
            customer_id,
            uuid: normalize_string(record.get("uuid"), DEFAULT_TEXT),
            name: normalize_name(record.get("name"), DEFAULT_TEXT),
            email: normalize_email(record.get("email"), DEFAULT_EMAIL),
            age: normalize_age(record.get("age")),
            phone: normalize_phone(record.get("phone"), DEFAULT_TEXT),
            address: normalize_string(record.get("address"), DEFAULT_TEXT),
            city: normalize_name(record.get("city"), DEFAULT_TEXT),
            state: normalize_state(record.get("state"), DEFAULT_TEXT),
            zip_code: normalize_zip_code(record.get("zip_code"), DEFAULT_TEXT),
            extra,
        })
    }

    fn reject(&mut self, reason: String) {
        self.summary.records_rejected += 1;
        *self.summary.rejection_reasons.entry(reason).or_insert(0) += 1;
    }

    pub fn summary(&self) -> &CleaningSummary {
        &self.summary
    }

    pub fn reset(&mut self) {
        self.summary = CleaningSummary::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_clean_full_record() {
        let mut cleaner = RecordCleaner::new();
        let record = raw(json!({
            "id": 17,
            "uuid": "a1b2",
            "name": "  jane DOE ",
            "email": " Jane@Example.COM",
            "age": "45",
            "phone": "+1 (555) 010-9999",
            "address": " 1 Main St ",
            "city": "new york",
            "state": "ny",
            "zip_code": "10001-0001",
            "loyalty_tier": " gold "
        }));

        let cleaned = cleaner.clean(&record).unwrap();
        assert_eq!(cleaned.customer_id, "17");
        assert_eq!(cleaned.uuid, "a1b2");
        assert_eq!(cleaned.name, "Jane Doe");
        assert_eq!(cleaned.email, "jane@example.com");
        assert_eq!(cleaned.age, 45);
        assert_eq!(cleaned.phone, "15550109999");
        assert_eq!(cleaned.address, "1 Main St");
        assert_eq!(cleaned.city, "New York");
        assert_eq!(cleaned.state, "NY");
        assert_eq!(cleaned.zip_code, "10001-0001");
        assert_eq!(cleaned.extra.get("loyalty_tier").map(String::as_str), Some("gold"));
        assert_eq!(cleaned.extra.get("id").map(String::as_str), Some("17"));
        assert_eq!(cleaner.summary().records_accepted, 1);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let mut cleaner = RecordCleaner::new();
        let cleaned = cleaner.clean(&raw(json!({"id": "x-1", "name": "bo"}))).unwrap();
        assert_eq!(cleaned.email, "no-email@example.com");
        assert_eq!(cleaned.age, 0);
        for value in [&cleaned.uuid, &cleaned.phone, &cleaned.address, &cleaned.city, &cleaned.state, &cleaned.zip_code] {
            assert_eq!(value, "N/A");
        }
    }

    #[test]
    fn test_rejects_missing_or_empty_required_fields() {
        let mut cleaner = RecordCleaner::new();
        let bad = [
            json!({"name": "No Id"}),
            json!({"id": 3}),
            json!({"id": "   ", "name": "Blank"}),
            json!({"id": 4, "name": ""}),
            json!({"id": null, "name": "Null"}),
        ];

        for (i, record) in bad.iter().enumerate() {
            let accepted_before = cleaner.summary().records_accepted;
            assert!(cleaner.clean(&raw(record.clone())).is_none());
            assert_eq!(cleaner.summary().records_rejected, i as u64 + 1);
            assert_eq!(cleaner.summary().records_accepted, accepted_before);
        }

        let reasons = &cleaner.summary().rejection_reasons;
        assert_eq!(reasons.get("Missing field: id"), Some(&1));
        assert_eq!(reasons.get("Missing field: name"), Some(&1));
        assert_eq!(reasons.get("Empty field: id"), Some(&2));
        assert_eq!(reasons.get("Empty field: name"), Some(&1));
    }

    #[test]
    fn test_non_scalar_id_is_a_cleaning_error() {
        let mut cleaner = RecordCleaner::new();
        assert!(cleaner.clean(&raw(json!({"id": [1, 2], "name": "Arr"}))).is_none());
        assert_eq!(
            cleaner.summary().rejection_reasons.get("Cleaning error: id must be a scalar value, got array"),
            Some(&1)
        );
        assert_eq!(cleaner.summary().records_processed, 1);
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let mut cleaner = RecordCleaner::new();
        let first = cleaner
            .clean(&raw(json!({
                "id": " 9 ",
                "name": "ALICE o'hara",
                "email": "ALICE@EXAMPLE.ORG ",
                "age": 150,
                "phone": "555.123",
                "city": "los angeles",
                "state": "ca",
                "zip_code": "90001 "
            })))
            .unwrap();

        let mut again = RawRecord::new();
        again.insert("id".to_string(), json!(first.customer_id));
        for column in first.columns().filter(|c| *c != "customer_id") {
            again.insert(column.to_string(), json!(first.get(column).unwrap()));
        }

        let second = cleaner.clean(&again).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_summary_display_and_reset() {
        let mut cleaner = RecordCleaner::new();
        cleaner.clean(&raw(json!({"id": 1, "name": "a"})));
        cleaner.clean(&raw(json!({"id": 2})));
        cleaner.clean(&raw(json!({"id": 3})));

        let text = cleaner.summary().to_string();
        assert!(text.contains("Total records processed: 3"));
        assert!(text.contains("Accepted: 1 (33.3%)"));
        assert!(text.contains("Missing field: name: 2"));

        cleaner.reset();
        assert_eq!(cleaner.summary(), &CleaningSummary::default());
        assert_eq!(cleaner.summary().to_string(), "No records processed\n");
    }
}
