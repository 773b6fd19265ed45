use crate::core::export::{display_rows, summarize, BatchSummary, DisplayRow};
use crate::domain::ports::Pipeline;
use crate::utils::error::{RecordError, Result};
use crate::utils::monitor::SystemMonitor;

/// 一次完整執行的結果
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub output_path: String,
    pub summary: BatchSummary,
    pub rows: Vec<DisplayRow>,
    pub failures: Vec<RecordError>,
}

pub struct BatchEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> BatchEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        let monitor = SystemMonitor::new(monitor_enabled);
        if monitor.is_enabled() {
            tracing::info!("🔍 System monitoring enabled");
        }
        Self { pipeline, monitor }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<BatchReport> {
        tracing::info!("Starting batch prediction process...");
        self.monitor.log_stats("Start");

        // Extract
        let records = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", records.len());
        self.monitor.log_stats("Extract");

        // Transform
        let outcome = self.pipeline.transform(records).await?;
        tracing::info!(
            "Scored {} records ({} failed)",
            outcome.succeeded(),
            outcome.failed()
        );
        self.monitor.log_stats("Transform");

        // Load
        let output_path = self.pipeline.load(&outcome).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(BatchReport {
            output_path,
            summary: summarize(&outcome),
            rows: display_rows(&outcome),
            failures: outcome.failures,
        })
    }
}
