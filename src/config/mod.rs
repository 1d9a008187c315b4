#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

fn default_api_endpoint() -> String {
    "/api/v1/customers".to_string()
}

fn default_s3_prefix() -> String {
    "raw/customers".to_string()
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_secs() -> f64 {
    1.0
}

fn default_records_per_page() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_inter_page_delay_secs() -> f64 {
    0.5
}

/// Everything the extraction needs, loaded from the environment or a TOML file.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub api_base_url: String,
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    pub api_token: String,
    pub s3_bucket: String,
    #[serde(default = "default_s3_prefix")]
    pub s3_prefix: String,
    #[serde(default)]
    pub s3_region: Option<String>,
    /// When set, uploads go to this local directory instead of S3.
    #[serde(default)]
    pub storage_root: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: f64,
    #[serde(default = "default_records_per_page")]
    pub records_per_page: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_inter_page_delay_secs")]
    pub inter_page_delay_secs: f64,
    #[serde(default)]
    pub jitter_seed: Option<u64>,
}

impl IngestConfig {
    /// 從環境變數載入配置
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key → value source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| EtlError::MissingConfigError {
                field: key.to_string(),
            })
        };

        Ok(Self {
            api_base_url: required("API_BASE_URL")?,
            api_endpoint: get("API_ENDPOINT").unwrap_or_else(default_api_endpoint),
            api_token: required("API_TOKEN")?,
            s3_bucket: required("S3_BUCKET")?,
            s3_prefix: get("S3_PREFIX").unwrap_or_else(default_s3_prefix),
            s3_region: get("S3_REGION"),
            storage_root: get("STORAGE_ROOT"),
            output_dir: get("OUTPUT_DIR").unwrap_or_else(default_output_dir),
            max_retries: parse_or("MAX_RETRIES", get("MAX_RETRIES"), default_max_retries)?,
            initial_backoff_secs: parse_or(
                "INITIAL_BACKOFF",
                get("INITIAL_BACKOFF"),
                default_initial_backoff_secs,
            )?,
            records_per_page: parse_or(
                "RECORDS_PER_PAGE",
                get("RECORDS_PER_PAGE"),
                default_records_per_page,
            )?,
            request_timeout_secs: parse_or(
                "REQUEST_TIMEOUT",
                get("REQUEST_TIMEOUT"),
                default_request_timeout_secs,
            )?,
            inter_page_delay_secs: parse_or(
                "INTER_PAGE_DELAY",
                get("INTER_PAGE_DELAY"),
                default_inter_page_delay_secs,
            )?,
            jitter_seed: get("JITTER_SEED")
                .map(|raw| parse_value("JITTER_SEED", &raw))
                .transpose()?,
        })
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，支援 ${VAR} 環境變數替換
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Token shown as `********************...abcd`.
    pub fn masked_token(&self) -> String {
        mask_secret(&self.api_token)
    }
}

/// Keeps only the last four characters of a secret.
pub(crate) fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", "*".repeat(20), tail)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| EtlError::InvalidConfigValueError {
            field: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_or<T>(key: &str, raw: Option<String>, default: fn() -> T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default()),
    }
}

/// 替換環境變數 (例如 ${API_TOKEN})；未設定的變數保持原樣
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}

fn validate_finite(field_name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be a finite number".to_string(),
        })
    }
}

impl Validate for IngestConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("api_base_url", &self.api_base_url)?;
        validation::validate_non_empty_string("api_endpoint", &self.api_endpoint)?;
        validation::validate_non_empty_string("api_token", &self.api_token)?;

        match &self.storage_root {
            Some(root) => {
                validation::validate_path("storage_root", root)?;
                validation::validate_non_empty_string("s3_bucket", &self.s3_bucket)?;
            }
            None => validation::validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?,
        }
        validation::validate_non_empty_string("s3_prefix", &self.s3_prefix)?;
        validation::validate_directory_path("output_dir", &self.output_dir)?;

        validation::validate_range("max_retries", self.max_retries, 1, 20)?;
        validate_finite("initial_backoff_secs", self.initial_backoff_secs)?;
        validation::validate_range("initial_backoff_secs", self.initial_backoff_secs, 0.0, 300.0)?;
        validation::validate_range("records_per_page", self.records_per_page, 1, 10_000)?;
        validation::validate_range("request_timeout_secs", self.request_timeout_secs, 1, 600)?;
        validate_finite("inter_page_delay_secs", self.inter_page_delay_secs)?;
        validation::validate_range("inter_page_delay_secs", self.inter_page_delay_secs, 0.0, 60.0)?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_token", &self.masked_token())
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_prefix", &self.s3_prefix)
            .field("s3_region", &self.s3_region)
            .field("storage_root", &self.storage_root)
            .field("output_dir", &self.output_dir)
            .field("max_retries", &self.max_retries)
            .field("initial_backoff_secs", &self.initial_backoff_secs)
            .field("records_per_page", &self.records_per_page)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("inter_page_delay_secs", &self.inter_page_delay_secs)
            .field("jitter_seed", &self.jitter_seed)
            .finish()
    }
}

impl fmt::Display for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📋 Current configuration:")?;
        writeln!(f, "  API URL: {}{}", self.api_base_url, self.api_endpoint)?;
        writeln!(f, "  API Token: {}", self.masked_token())?;
        match &self.storage_root {
            Some(root) => writeln!(f, "  Storage: local directory {}", root)?,
            None => writeln!(
                f,
                "  S3 Region: {}",
                self.s3_region.as_deref().unwrap_or("(default chain)")
            )?,
        }
        writeln!(f, "  Bucket: {}", self.s3_bucket)?;
        writeln!(f, "  Prefix: {}", self.s3_prefix)?;
        writeln!(f, "  Output Dir: {}", self.output_dir)?;
        writeln!(f, "  Max Retries: {}", self.max_retries)?;
        writeln!(f, "  Initial Backoff: {}s", self.initial_backoff_secs)?;
        writeln!(f, "  Records per Page: {}", self.records_per_page)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Inter-page Delay: {}s", self.inter_page_delay_secs)
    }
}
