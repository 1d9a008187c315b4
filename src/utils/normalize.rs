//! Field-level normalizers and validators used by the record cleaner.
//!
//! Every function here is total: bad or missing input maps to the supplied default.

use crate::domain::model::RawRecord;
use serde_json::Value;

pub const DEFAULT_TEXT: &str = "N/A";
pub const DEFAULT_EMAIL: &str = "no-email@example.com";
pub const DEFAULT_AGE: u8 = 0;
pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 120;

/// 將 JSON 值轉成字串；null 視為缺值
pub fn stringify(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn or_default(cleaned: String, default: &str) -> String {
    if cleaned.is_empty() {
        default.to_string()
    } else {
        cleaned
    }
}

pub fn normalize_string(value: Option<&Value>, default: &str) -> String {
    match stringify(value) {
        Some(s) => or_default(s.trim().to_string(), default),
        None => default.to_string(),
    }
}

pub fn normalize_email(value: Option<&Value>, default: &str) -> String {
    let Some(raw) = stringify(value) else {
        return default.to_string();
    };

    let cleaned = raw.trim().to_lowercase();
    if validate_email_format(&cleaned) {
        cleaned
    } else {
        default.to_string()
    }
}

pub fn normalize_phone(value: Option<&Value>, default: &str) -> String {
    match stringify(value) {
        Some(s) => or_default(extract_digits(&s), default),
        None => default.to_string(),
    }
}

/// 姓名與城市：去空白後轉成 title case
pub fn normalize_name(value: Option<&Value>, default: &str) -> String {
    match stringify(value) {
        Some(s) => or_default(title_case(s.trim()), default),
        None => default.to_string(),
    }
}

pub fn normalize_state(value: Option<&Value>, default: &str) -> String {
    match stringify(value) {
        Some(s) => or_default(s.trim().to_uppercase(), default),
        None => default.to_string(),
    }
}

pub fn normalize_zip_code(value: Option<&Value>, default: &str) -> String {
    match stringify(value) {
        Some(s) => or_default(
            s.trim()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '-')
                .collect(),
            default,
        ),
        None => default.to_string(),
    }
}

/// Validated age, or [`DEFAULT_AGE`] when the value is missing, unparseable or out of range.
pub fn normalize_age(value: Option<&Value>) -> u8 {
    validate_age_range(value, MIN_AGE, MAX_AGE).1
}

pub fn extract_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Upper-cases a letter that follows a non-letter and lower-cases every other letter.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_is_letter = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// 檢查必要欄位是否存在且不為空白
pub fn validate_required_fields(
    record: &RawRecord,
    required_fields: &[&str],
) -> std::result::Result<(), String> {
    for field in required_fields {
        let Some(value) = record.get(*field) else {
            return Err(format!("Missing field: {}", field));
        };

        let blank = stringify(Some(value)).map_or(true, |s| s.trim().is_empty());
        if blank {
            return Err(format!("Empty field: {}", field));
        }
    }
    Ok(())
}

pub fn validate_email_format(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.contains('@') && email.contains('.')
}

/// Returns `(is_valid, age)`; invalid input yields `(false, DEFAULT_AGE)`.
pub fn validate_age_range(value: Option<&Value>, min_age: i64, max_age: i64) -> (bool, u8) {
    let age = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match age {
        Some(age) if (min_age..=max_age).contains(&age) => match u8::try_from(age) {
            Ok(age) => (true, age),
            Err(_) => (false, DEFAULT_AGE),
        },
        _ => (false, DEFAULT_AGE),
    }
}
