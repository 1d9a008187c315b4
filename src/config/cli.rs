use crate::config::IngestConfig;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "customer-ingest")]
#[command(about = "Extract customers from a paged API, clean them to CSV and upload to S3")]
pub struct CliArgs {
    /// Path to a TOML configuration file; environment variables are used when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the local CSV extract
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Upload into this local directory instead of S3
    #[arg(long)]
    pub storage_root: Option<String>,

    /// Seed for retry and delay jitter
    #[arg(long)]
    pub jitter_seed: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    /// Validate and print the configuration, then exit without any network activity
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// 載入配置並套用命令列覆蓋設定
    pub fn load_config(&self) -> Result<IngestConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                IngestConfig::from_file(path)?
            }
            None => IngestConfig::from_env()?,
        };

        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(root) = &self.storage_root {
            config.storage_root = Some(root.clone());
        }
        if let Some(seed) = self.jitter_seed {
            config.jitter_seed = Some(seed);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "customer-ingest",
            "--config",
            "ingest.toml",
            "--output-dir",
            "/data/out",
            "--dry-run",
            "-v",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("ingest.toml")));
        assert_eq!(args.output_dir.as_deref(), Some("/data/out"));
        assert!(args.dry_run);
        assert!(args.verbose);
        assert!(!args.monitor);
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingest.toml");
        std::fs::write(
            &path,
            r#"
api_base_url = "https://api.example.com"
api_token = "abc"
s3_bucket = "customer-data"
output_dir = "./from-file"
"#,
        )
        .unwrap();

        let args = CliArgs::parse_from([
            "customer-ingest",
            "--config",
            path.to_str().unwrap(),
            "--output-dir",
            "./from-cli",
            "--jitter-seed",
            "9",
        ]);
        let config = args.load_config().unwrap();
        assert_eq!(config.output_dir, "./from-cli");
        assert_eq!(config.jitter_seed, Some(9));
        assert_eq!(config.storage_root, None);
    }
}
