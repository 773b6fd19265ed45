use anyhow::Context;
use churn_batch::core::export::{format_probability, prediction_label, render_table};
use churn_batch::domain::model::RawRecord;
use churn_batch::domain::ports::{ConfigProvider, Predictor};
use churn_batch::domain::schema::{sample_template, FORM_DEFAULTS};
use churn_batch::utils::error::ErrorSeverity;
use churn_batch::utils::{logger, validation::Validate};
use churn_batch::{
    BatchEngine, BatchError, BatchPipeline, CliConfig, ClientConfig, Command, FeatureSchema,
    LocalStorage, PredictionClient, TomlConfig,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose, cli.json_logs);

    tracing::info!("Starting churn-batch CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        report_failure(&e);
    }

    Ok(())
}

async fn run(cli: &CliConfig) -> anyhow::Result<()> {
    match &cli.config {
        Some(path) => {
            tracing::info!("📄 Loading configuration from: {}", path);
            let mut config = TomlConfig::from_file(path)?;
            config.apply_overrides(cli);
            let monitor_enabled = config.monitoring_enabled();
            dispatch(&cli.command, config, monitor_enabled).await
        }
        None => dispatch(&cli.command, cli.clone(), cli.monitor).await,
    }
}

async fn dispatch<C>(command: &Command, config: C, monitor_enabled: bool) -> anyhow::Result<()>
where
    C: ConfigProvider + Validate + 'static,
{
    // 範本只寫本機檔案，不需要服務設定
    if let Command::Template { path } = command {
        std::fs::write(path, sample_template())
            .with_context(|| format!("failed to write template to {}", path))?;
        println!("📝 Template written to: {}", path);
        return Ok(());
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let client = PredictionClient::new(ClientConfig::from_provider(&config))?;
    tracing::debug!("Prediction service: {}", client.base_url());

    match command {
        Command::Batch { input } => run_batch(input, client, config, monitor_enabled).await,
        Command::Predict { overrides } => {
            predict_one(&client, overrides, config.strict_validation()).await
        }
        Command::Kpis => {
            let kpis = client.fetch_kpis().await?;
            println!("{}", kpis);
            Ok(())
        }
        Command::Health => {
            let health = client.health().await?;
            println!("✅ Service status: {}", health.status);
            if let Some(model) = health.model {
                println!("🤖 Model: {}", model);
            }
            Ok(())
        }
        Command::Template { .. } => Ok(()),
    }
}

async fn run_batch<C>(
    input: &str,
    client: PredictionClient,
    config: C,
    monitor_enabled: bool,
) -> anyhow::Result<()>
where
    C: ConfigProvider + 'static,
{
    // 輸入與輸出路徑皆相對於目前目錄
    let storage = LocalStorage::new(".".to_string());
    let pipeline = BatchPipeline::new(storage, client, config, input);

    let cancel = pipeline.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Cancellation requested, stopping after the current record");
            cancel.cancel();
        }
    });

    let mut progress = pipeline.orchestrator().subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = *progress.borrow_and_update();
            tracing::info!(
                "⏳ Progress: {}/{} ({:.0}%, {} failed)",
                p.processed,
                p.total,
                p.fraction() * 100.0,
                p.failed
            );
        }
    });

    let engine = BatchEngine::new_with_monitoring(pipeline, monitor_enabled);
    let result = engine.run().await;
    reporter.abort();
    ctrl_c.abort();

    let report = result?;
    let summary = &report.summary;

    if summary.cancelled {
        println!(
            "⚠️ Batch cancelled: {} of {} records attempted",
            summary.succeeded + summary.failed,
            summary.total
        );
    } else {
        println!("✅ Batch prediction completed!");
    }
    println!(
        "📊 {} scored, {} failed, {} high risk",
        summary.succeeded, summary.failed, summary.high_risk
    );
    if let Some(avg) = summary.avg_churn_probability_pct {
        println!("📈 Average churn probability: {:.1}%", avg);
    }

    if !report.rows.is_empty() {
        println!();
        println!("{}", render_table(&report.rows));
    }

    if !report.failures.is_empty() {
        println!();
        println!("❌ Failed records:");
        for failure in &report.failures {
            println!("  {}", failure);
        }
    }

    println!("📁 Output saved to: {}", report.output_path);
    Ok(())
}

async fn predict_one(
    client: &PredictionClient,
    overrides: &[(String, String)],
    strict: bool,
) -> anyhow::Result<()> {
    // 表單預設值在前，命令列覆寫在後 (同名欄位以後者為準)
    let fields = FORM_DEFAULTS
        .iter()
        .map(|(name, value)| (name.to_string(), Some(value.to_string())))
        .chain(overrides.iter().map(|(name, value)| {
            let value = (!value.is_empty()).then(|| value.clone());
            (name.clone(), value)
        }))
        .collect();
    let record = RawRecord::new(0, fields);

    let schema = if strict {
        FeatureSchema::strict()
    } else {
        FeatureSchema::new()
    };
    let features = schema.coerce(&record).map_err(BatchError::from)?;
    let prediction = client
        .predict(0, &features)
        .await
        .map_err(BatchError::from)?;

    println!(
        "Churn probability: {}",
        format_probability(prediction.churn_probability)
    );
    println!(
        "Prediction:        {}",
        prediction_label(prediction.churn_prediction)
    );
    println!("Risk level:        {}", prediction.risk_level);
    Ok(())
}

fn report_failure(e: &anyhow::Error) -> ! {
    let Some(batch_error) = e.downcast_ref::<BatchError>() else {
        tracing::error!("❌ Command failed: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    };

    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Batch process failed: {} (Category: {:?}, Severity: {:?})",
        batch_error,
        batch_error.category(),
        batch_error.severity()
    );
    tracing::error!(
        "💡 Recovery suggestion: {}",
        batch_error.recovery_suggestion()
    );

    eprintln!("❌ {}", batch_error.user_friendly_message());
    eprintln!("💡 建議: {}", batch_error.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match batch_error.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 重試錯誤
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    };
    std::process::exit(exit_code);
}
