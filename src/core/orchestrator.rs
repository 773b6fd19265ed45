use crate::core::parser::parse_records;
use crate::domain::model::{BatchOutcome, BatchProgress, BatchRow, PredictionResult, RawRecord, RecordSet};
use crate::domain::ports::Predictor;
use crate::domain::schema::FeatureSchema;
use crate::utils::error::{RecordError, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// 取消批次的旗標；可複製後交給其他 task 觸發
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 批次協調器：依檔案順序逐筆呼叫評分服務，一次只有一個請求在進行。
///
/// 單筆失敗 (結構不符或遠端錯誤) 只記錄在結果裡，不會中止後續記錄。
pub struct BatchOrchestrator<P: Predictor> {
    predictor: P,
    schema: FeatureSchema,
    progress: watch::Sender<BatchProgress>,
}

impl<P: Predictor> BatchOrchestrator<P> {
    pub fn new(predictor: P) -> Self {
        let (progress, _) = watch::channel(BatchProgress::default());
        Self {
            predictor,
            schema: FeatureSchema::new(),
            progress,
        }
    }

    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// 訂閱批次進度，展示層可以輪詢或等待變更
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    /// 解析 CSV 文字並跑完整個批次。只有無法解析 (沒有標頭) 時才回傳錯誤。
    pub async fn run_batch(&self, raw_text: &str) -> Result<BatchOutcome> {
        self.run_batch_cancellable(raw_text, &CancelToken::new())
            .await
    }

    pub async fn run_batch_cancellable(
        &self,
        raw_text: &str,
        cancel: &CancelToken,
    ) -> Result<BatchOutcome> {
        let records = parse_records(raw_text)?;
        Ok(self.run_records(records, cancel).await)
    }

    /// 對已解析的記錄逐筆評分。取消後會等目前的請求結束，再回傳已累積的部分結果。
    pub async fn run_records(&self, set: RecordSet, cancel: &CancelToken) -> BatchOutcome {
        let started_at = Utc::now();
        let total = set.records.len();
        let mut outcome = BatchOutcome {
            headers: set.headers,
            total,
            results: Vec::with_capacity(total),
            failures: Vec::new(),
            cancelled: false,
            started_at,
            finished_at: started_at,
        };
        self.publish(&outcome);

        if total == 0 {
            tracing::info!("📭 Batch has no data rows, nothing to score");
            return outcome;
        }

        tracing::info!("🚀 Starting batch prediction for {} records", total);

        for record in set.records {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "🛑 Batch cancelled after {}/{} records",
                    outcome.attempted(),
                    total
                );
                outcome.cancelled = true;
                break;
            }

            match self.score(&record).await {
                Ok(prediction) => {
                    tracing::debug!(
                        "✅ Record {}: probability {:.3}, risk {}",
                        record.index,
                        prediction.churn_probability,
                        prediction.risk_level
                    );
                    outcome.results.push(BatchRow {
                        index: record.index,
                        record,
                        prediction,
                    });
                }
                Err(err) => {
                    tracing::warn!("⚠️ {}", err);
                    outcome.failures.push(err);
                }
            }

            self.publish(&outcome);
        }

        outcome.finished_at = Utc::now();
        tracing::info!(
            "📊 Batch finished: {} succeeded, {} failed, {} total",
            outcome.succeeded(),
            outcome.failed(),
            total
        );
        outcome
    }

    async fn score(&self, record: &RawRecord) -> std::result::Result<PredictionResult, RecordError> {
        let features = self.schema.coerce(record)?;
        self.predictor.predict(record.index, &features).await
    }

    fn publish(&self, outcome: &BatchOutcome) {
        self.progress.send_replace(BatchProgress {
            total: outcome.total,
            processed: outcome.attempted(),
            succeeded: outcome.succeeded(),
            failed: outcome.failed(),
        });
    }
}
