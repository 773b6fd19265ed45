use crate::domain::model::{BatchOutcome, CustomerFeatures, PredictionResult, RecordSet};
use crate::utils::error::{RecordError, Result};
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 匯出檔案的設定
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub csv_filename: String,
    pub summary_filename: String,
    pub failures_filename: String,
    /// `Some(檔名)` 時打包成 ZIP，否則分別寫出
    pub zip_filename: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            csv_filename: "churn_predictions.csv".to_string(),
            summary_filename: "summary.json".to_string(),
            failures_filename: "failures.json".to_string(),
            zip_filename: Some("churn_batch.zip".to_string()),
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn output_path(&self) -> &str;
    fn strict_validation(&self) -> bool;
    fn export_options(&self) -> ExportOptions;
}

/// 對單筆客戶資料呼叫評分服務。`index` 會帶進錯誤裡，方便呼叫端歸責。
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(
        &self,
        index: usize,
        features: &CustomerFeatures,
    ) -> std::result::Result<PredictionResult, RecordError>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RecordSet>;
    async fn transform(&self, data: RecordSet) -> Result<BatchOutcome>;
    async fn load(&self, outcome: &BatchOutcome) -> Result<String>;
}
