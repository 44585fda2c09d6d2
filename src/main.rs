use clap::Parser;
use retail_etl::core::audit;
use retail_etl::core::encoder::{RETURNS_TABLE, SALES_TABLE};
use retail_etl::core::{ConfigProvider, Pipeline};
use retail_etl::utils::error::{EtlError, ErrorSeverity};
use retail_etl::utils::{logger, validation::Validate};
use retail_etl::{CliConfig, EtlEngine, LocalStorage, RetailPipeline, TomlConfig};

fn exit_code(e: &EtlError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // I/O 錯誤，可重試
        ErrorSeverity::High => 1,     // 資料處理或驗證失敗
        ErrorSeverity::Critical => 3, // 設定錯誤
    }
}

fn fail(e: &EtlError) -> ! {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

async fn run<C: ConfigProvider + Validate>(config: C, monitor_enabled: bool) {
    if let Err(e) = config.validate() {
        fail(&e);
    }

    tracing::info!(
        "📁 Input: {} | Output: {}",
        config.input_path(),
        config.output_path()
    );

    // 輸入路徑可為相對或絕對路徑，因此以目前目錄為基準
    let storage = LocalStorage::new(".");
    let pipeline = RetailPipeline::new(storage, config);
    let output_path = pipeline.output_path().to_string();
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(outcome) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("✅ Cleaning completed.");
            println!(
                "   sales={} returns={} rejected={}",
                outcome.sales_rows, outcome.return_rows, outcome.rejected_rows
            );
            println!("📁 Output saved to: {}", output_path);
            if outcome.report.has_hard_failures() {
                println!("⚠️ Validation reported hard failures; see validation_report.json");
            }
        }
        Err(e) => fail(&e),
    }
}

/// 只檢查已寫出的 sales/returns 表，不重跑 ETL
async fn validate_only(cli: &CliConfig, output_path: &str, strict: bool) {
    let sales = cli
        .sales
        .clone()
        .unwrap_or_else(|| audit::table_path(output_path, SALES_TABLE));
    let returns = cli
        .returns
        .clone()
        .unwrap_or_else(|| audit::table_path(output_path, RETURNS_TABLE));
    tracing::info!("🔎 Validating written outputs: {} | {}", sales, returns);

    let storage = LocalStorage::new(".");
    let report = match audit::validate_outputs(&storage, &sales, &returns).await {
        Ok(report) => report,
        Err(e) => fail(&e),
    };
    print!("{}", report);

    let failed_checks: Vec<String> = report
        .hard_failures()
        .iter()
        .map(|c| c.check_name.clone())
        .collect();
    if strict && !failed_checks.is_empty() {
        fail(&EtlError::ValidationFailed { failed_checks });
    }
    println!("✅ Validation completed.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    match cli.config.clone() {
        Some(path) => {
            let mut config = match TomlConfig::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path, e);
                    eprintln!("💡 Make sure the file exists and is valid TOML format");
                    std::process::exit(3);
                }
            };
            cli.apply_overrides(&mut config);

            let log_format = if cli.log_format.is_some() {
                cli.log_format()
            } else {
                config.log_format()
            };
            logger::init_cli_logger(cli.verbose, log_format);
            tracing::info!("🚀 Starting retail-etl with config: {}", path);
            if cli.verbose {
                tracing::debug!("Config: {:?}", config);
            }

            if cli.validate_only {
                validate_only(&cli, config.output_path(), config.strict()).await;
            } else {
                let monitor_enabled = cli.monitor || config.monitoring_enabled();
                run(config, monitor_enabled).await;
            }
        }
        None => {
            logger::init_cli_logger(cli.verbose, cli.log_format());
            tracing::info!("🚀 Starting retail-etl");
            if cli.verbose {
                tracing::debug!("CLI config: {:?}", cli);
            }

            if cli.validate_only {
                validate_only(&cli, cli.output_path(), cli.strict).await;
            } else {
                let monitor_enabled = cli.monitor;
                run(cli, monitor_enabled).await;
            }
        }
    }

    Ok(())
}
