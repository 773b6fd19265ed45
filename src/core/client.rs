use crate::domain::model::{CustomerFeatures, HealthStatus, KpiSnapshot, PredictionResult};
use crate::domain::ports::{ConfigProvider, Predictor};
use crate::utils::error::{RecordError, Result};
use crate::utils::validation::{validate_url, Validate};
use async_trait::async_trait;
use reqwest::Client;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn from_provider<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self::new(config.base_url())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        validate_url("service.base_url", &self.base_url)
    }
}

/// 模型服務的 HTTP 客戶端。
///
/// 每次呼叫都是獨立請求：不快取、不重試，也不另設逾時 (交給底層 transport)。
#[derive(Debug, Clone)]
pub struct PredictionClient {
    client: Client,
    base_url: String,
}

impl PredictionClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// `GET /kpis`
    pub async fn fetch_kpis(&self) -> Result<KpiSnapshot> {
        let url = self.endpoint("kpis");
        tracing::debug!("Fetching KPI snapshot from: {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let kpis = response.json::<KpiSnapshot>().await?;

        tracing::debug!(
            "KPI snapshot: {} customers, churn rate {:.1}%",
            kpis.total_customers,
            kpis.churn_rate
        );
        Ok(kpis)
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.endpoint("health");
        tracing::debug!("Checking service health at: {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json::<HealthStatus>().await?)
    }
}

#[async_trait]
impl Predictor for PredictionClient {
    async fn predict(
        &self,
        index: usize,
        features: &CustomerFeatures,
    ) -> std::result::Result<PredictionResult, RecordError> {
        let url = self.endpoint("predict");
        tracing::debug!("📡 Record {}: POST {}", index, url);

        let response = self
            .client
            .post(&url)
            .json(features)
            .send()
            .await
            .map_err(|e| remote_error(index, None, format!("request failed: {}", e)))?;

        let status = response.status();
        tracing::debug!("📡 Record {}: response status {}", index, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body.trim())
            };
            return Err(remote_error(index, Some(status.as_u16()), reason));
        }

        let result = response.json::<PredictionResult>().await.map_err(|e| {
            remote_error(
                index,
                Some(status.as_u16()),
                format!("invalid response body: {}", e),
            )
        })?;

        if !(0.0..=1.0).contains(&result.churn_probability) {
            return Err(remote_error(
                index,
                Some(status.as_u16()),
                format!(
                    "churn_probability out of range: {}",
                    result.churn_probability
                ),
            ));
        }

        Ok(result)
    }
}

fn remote_error(index: usize, status: Option<u16>, reason: String) -> RecordError {
    RecordError::RemoteInvocation {
        index,
        status,
        reason,
    }
}
