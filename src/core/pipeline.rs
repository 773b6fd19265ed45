use crate::core::export::{build_archive, export_files};
use crate::core::orchestrator::{BatchOrchestrator, CancelToken};
use crate::core::parser::parse_bytes;
use crate::domain::model::{BatchOutcome, RecordSet};
use crate::domain::ports::{ConfigProvider, Pipeline, Predictor, Storage};
use crate::domain::schema::FeatureSchema;
use crate::utils::error::Result;
use std::path::Path;

/// 批次預測 Pipeline：
/// extract 讀取並解析上傳的 CSV，transform 逐筆呼叫評分服務，load 寫出匯出檔。
pub struct BatchPipeline<S: Storage, P: Predictor, C: ConfigProvider> {
    storage: S,
    config: C,
    orchestrator: BatchOrchestrator<P>,
    input_path: String,
    cancel: CancelToken,
}

impl<S: Storage, P: Predictor, C: ConfigProvider> BatchPipeline<S, P, C> {
    pub fn new(storage: S, predictor: P, config: C, input_path: impl Into<String>) -> Self {
        let schema = if config.strict_validation() {
            FeatureSchema::strict()
        } else {
            FeatureSchema::new()
        };
        Self {
            storage,
            config,
            orchestrator: BatchOrchestrator::new(predictor).with_schema(schema),
            input_path: input_path.into(),
            cancel: CancelToken::new(),
        }
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator<P> {
        &self.orchestrator
    }

    /// 觸發後，目前的請求結束就停止並輸出部分結果
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }
}

#[async_trait::async_trait]
impl<S: Storage, P: Predictor, C: ConfigProvider> Pipeline for BatchPipeline<S, P, C> {
    async fn extract(&self) -> Result<RecordSet> {
        tracing::info!("📥 Reading batch input from: {}", self.input_path);
        let data = self.storage.read_file(&self.input_path).await?;
        let records = parse_bytes(&data)?;
        tracing::info!(
            "📋 Parsed {} records ({} columns)",
            records.len(),
            records.headers.len()
        );
        Ok(records)
    }

    async fn transform(&self, data: RecordSet) -> Result<BatchOutcome> {
        Ok(self.orchestrator.run_records(data, &self.cancel).await)
    }

    async fn load(&self, outcome: &BatchOutcome) -> Result<String> {
        let options = self.config.export_options();
        let files = export_files(outcome, &options)?;

        match &options.zip_filename {
            Some(zip_name) => {
                let zip_data = build_archive(&files)?;
                let output_path = self.output_file(zip_name);
                tracing::debug!(
                    "Writing ZIP file ({} bytes, {} entries) to storage",
                    zip_data.len(),
                    files.len()
                );
                self.storage.write_file(&output_path, &zip_data).await?;
                tracing::info!("📦 Batch export saved: {}", output_path);
                Ok(output_path)
            }
            None => {
                for file in &files {
                    let path = self.output_file(&file.name);
                    self.storage.write_file(&path, &file.contents).await?;
                    tracing::debug!("Wrote {} ({} bytes)", path, file.contents.len());
                }
                let output_path = self.config.output_path().to_string();
                tracing::info!("📁 Batch export saved under: {}", output_path);
                Ok(output_path)
            }
        }
    }
}
