use clap::Parser;
use customer_ingest::utils::error::ErrorSeverity;
use customer_ingest::utils::{logger, validation::Validate};
use customer_ingest::{
    BlobStorage, CliArgs, CustomerExtractor, EtlError, IngestConfig, LocalBlobStorage,
};
use std::path::Path;

fn exit_code(e: &EtlError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 重試錯誤
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn report_error(context: &str, e: &EtlError) {
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
}

#[cfg(feature = "s3")]
async fn s3_storage(config: &IngestConfig) -> customer_ingest::Result<Box<dyn BlobStorage>> {
    let storage = customer_ingest::S3BlobStorage::from_env(config.s3_region.clone()).await;
    Ok(Box::new(storage))
}

#[cfg(not(feature = "s3"))]
async fn s3_storage(_config: &IngestConfig) -> customer_ingest::Result<Box<dyn BlobStorage>> {
    Err(EtlError::ConfigError {
        message: "Built without S3 support; set STORAGE_ROOT or --storage-root".to_string(),
    })
}

async fn build_storage(config: &IngestConfig) -> customer_ingest::Result<Box<dyn BlobStorage>> {
    match &config.storage_root {
        Some(root) => Ok(Box::new(LocalBlobStorage::new(root))),
        None => s3_storage(config).await,
    }
}

/// Ctrl-C may land during the upload, so the message cannot claim nothing was uploaded.
fn interrupted_message(output_path: &Path) -> String {
    format!(
        "⚠️ Interrupted. Pages written so far remain in {}; upload not confirmed",
        output_path.display()
    )
}

fn load_config(args: &CliArgs) -> customer_ingest::Result<IngestConfig> {
    let config = args.load_config()?;
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }
    tracing::info!("Starting customer-ingest");

    // 驗證配置（在任何網路請求之前）
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            report_error("Configuration validation failed", &e);
            std::process::exit(exit_code(&e).max(1));
        }
    };
    println!("{}", config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - configuration is valid, no requests sent");
        return;
    }

    let extractor = match build_storage(&config)
        .await
        .and_then(|storage| CustomerExtractor::from_config(&config, storage))
    {
        Ok(extractor) => extractor.with_monitoring(args.monitor),
        Err(e) => {
            report_error("Failed to initialise extraction", &e);
            std::process::exit(exit_code(&e).max(1));
        }
    };
    let output_path = extractor.output_path().to_path_buf();

    tokio::select! {
        result = extractor.run() => match result {
            Ok(Some(outcome)) => {
                println!("✅ Extraction completed: {}", outcome.local_path.display());
                match outcome.remote_uri {
                    Some(uri) => println!("☁️ Uploaded to: {}", uri),
                    None => println!("💾 Not uploaded; the local file is kept for a manual upload"),
                }
            }
            Ok(None) => {
                eprintln!("❌ Extraction aborted: the first page could not be fetched");
                std::process::exit(1);
            }
            Err(e) => {
                report_error("Extraction failed", &e);
                std::process::exit(exit_code(&e).max(1));
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("⚠️ Interrupted by user, upload not confirmed");
            eprintln!("\n{}", interrupted_message(&output_path));
            std::process::exit(130);
        }
    }
}
