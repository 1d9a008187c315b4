use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// One customer as returned by the API. No fixed schema.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Signed so a bogus value such as `-1` still parses; the extractor clamps it.
    pub total_pages: Option<i64>,
}

/// 單頁 API 回應
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResponse {
    #[serde(default)]
    pub metadata: Option<PageMetadata>,
    #[serde(default)]
    pub data: Vec<RawRecord>,
}

impl PageResponse {
    pub fn total_pages(&self) -> Option<i64> {
        self.metadata.as_ref().and_then(|m| m.total_pages)
    }
}

/// Column names produced by the cleaner for every accepted record.
pub const CORE_COLUMNS: [&str; 10] = [
    "customer_id",
    "uuid",
    "name",
    "email",
    "age",
    "phone",
    "address",
    "city",
    "state",
    "zip_code",
];

/// A validated customer. `customer_id` and `name` are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub customer_id: String,
    pub uuid: String,
    pub name: String,
    pub email: String,
    pub age: u8,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    /// Fields the API sent that are not core columns, keyed by their original name.
    pub extra: BTreeMap<String, String>,
}

impl CleanedRecord {
    pub fn get(&self, column: &str) -> Option<Cow<'_, str>> {
        let core = match column {
            "customer_id" => &self.customer_id,
            "uuid" => &self.uuid,
            "name" => &self.name,
            "email" => &self.email,
            "age" => return Some(Cow::Owned(self.age.to_string())),
            "phone" => &self.phone,
            "address" => &self.address,
            "city" => &self.city,
            "state" => &self.state,
            "zip_code" => &self.zip_code,
            other => return self.extra.get(other).map(|v| Cow::Borrowed(v.as_str())),
        };
        Some(Cow::Borrowed(core.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        let core: &[&str] = &CORE_COLUMNS;
        core.iter()
            .copied()
            .chain(self.extra.keys().map(String::as_str))
    }
}
