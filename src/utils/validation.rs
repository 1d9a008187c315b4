use crate::utils::error::{EtlError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> EtlError {
    EtlError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(field_name, url_str, format!("Invalid URL format: {}", e))),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

/// Path must be usable as a directory: either missing (it will be created) or an existing
/// directory.
pub fn validate_directory_path(field_name: &str, path: &str) -> Result<()> {
    validate_path(field_name, path)?;

    let p = std::path::Path::new(path);
    if p.exists() && !p.is_dir() {
        return Err(invalid(field_name, path, "Path exists but is not a directory"));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// S3 naming rules: 3-63 chars of lowercase letters, digits, hyphens and dots, no leading or
/// trailing hyphen.
pub fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.is_empty() {
        return Err(invalid(field_name, bucket_name, "S3 bucket name cannot be empty"));
    }

    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid(
            field_name,
            bucket_name,
            "S3 bucket name must be between 3 and 63 characters",
        ));
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            field_name,
            bucket_name,
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid(
            field_name,
            bucket_name,
            "S3 bucket name cannot start or end with a hyphen",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api_base_url", "https://example.com").is_ok());
        assert!(validate_url("api_base_url", "http://localhost:8080").is_ok());
        assert!(validate_url("api_base_url", "").is_err());
        assert!(validate_url("api_base_url", "invalid-url").is_err());
        assert!(validate_url("api_base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("max_retries", 5, 1, 20).is_ok());
        assert!(validate_range("max_retries", 0, 1, 20).is_err());
        assert!(validate_range("initial_backoff_secs", 0.0, 0.0, 60.0).is_ok());
        assert!(validate_range("initial_backoff_secs", -0.5, 0.0, 60.0).is_err());
    }

    #[test]
    fn test_validate_s3_bucket_name() {
        assert!(validate_s3_bucket_name("s3_bucket", "customer-data.raw").is_ok());
        assert!(validate_s3_bucket_name("s3_bucket", "ab").is_err());
        assert!(validate_s3_bucket_name("s3_bucket", "Customer_Data").is_err());
        assert!(validate_s3_bucket_name("s3_bucket", "-customers").is_err());
    }

    #[test]
    fn test_validate_non_empty_string_and_path() {
        assert!(validate_non_empty_string("api_token", "  ").is_err());
        assert!(validate_non_empty_string("api_token", "abc").is_ok());
        assert!(validate_path("output_dir", "").is_err());
        assert!(validate_path("output_dir", "./out").is_ok());
    }

    #[test]
    fn test_validate_directory_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("extract.csv");
        std::fs::write(&file, "x").unwrap();
        let missing = dir.path().join("not/yet/there");

        assert!(validate_directory_path("output_dir", dir.path().to_str().unwrap()).is_ok());
        assert!(validate_directory_path("output_dir", missing.to_str().unwrap()).is_ok());
        assert!(validate_directory_path("output_dir", file.to_str().unwrap()).is_err());
    }
}
