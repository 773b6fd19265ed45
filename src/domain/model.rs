use crate::utils::error::RecordError;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 一列 CSV 資料：欄位名稱對應原始字串值，順序與標頭一致。
///
/// 值為 `None` 表示該列的欄位數少於標頭 (缺值標記)，與空字串不同。
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub index: usize,
    fields: Vec<(String, Option<String>)>,
}

impl RawRecord {
    pub fn new(index: usize, fields: Vec<(String, Option<String>)>) -> Self {
        Self { index, fields }
    }

    /// 取得欄位值；欄位不存在或為缺值標記時回傳 `None`。
    /// 重複的標頭以最後一欄為準。
    pub fn get(&self, name: &str) -> Option<&str> {
        self.lookup(name).and_then(|value| value.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn is_missing(&self, name: &str) -> bool {
        matches!(self.lookup(name), Some(None))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&Option<String>> {
        self.fields
            .iter()
            .rev()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// 解析結果：標頭與資料列 (依檔案順序)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Text(s) => write!(f, "{}", s),
            FeatureValue::Integer(n) => write!(f, "{}", n),
            FeatureValue::Float(n) => write!(f, "{}", n),
        }
    }
}

/// 已依特徵結構驗證並轉型的客戶資料，序列化後即為 `/predict` 的請求本體
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerFeatures {
    values: Vec<(String, FeatureValue)>,
}

impl CustomerFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FeatureValue) {
        let name = name.into();
        match self.values.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for CustomerFeatures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// 模型服務回傳的預測結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub churn_probability: f64,
    #[serde(with = "binary_flag")]
    pub churn_prediction: bool,
    pub risk_level: String,
}

/// `churn_prediction` 在線路上是 0|1，也接受布林值
mod binary_flag {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(i64),
        Bool(bool),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Flag::deserialize(deserializer)? {
            Flag::Int(0) => Ok(false),
            Flag::Int(1) => Ok(true),
            Flag::Int(other) => Err(serde::de::Error::custom(format!(
                "churn_prediction must be 0 or 1, got {}",
                other
            ))),
            Flag::Bool(b) => Ok(b),
        }
    }
}

/// 成功預測的一列：原始欄位 + 預測結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub index: usize,
    pub record: RawRecord,
    pub prediction: PredictionResult,
}

/// 一次批次上傳的完整結果。失敗的記錄不留空位，只記在 `failures`。
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub headers: Vec<String>,
    pub total: usize,
    pub results: Vec<BatchRow>,
    pub failures: Vec<RecordError>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchOutcome {
    pub fn empty(headers: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            headers,
            total: 0,
            results: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded() + self.failed()
    }

    /// 所有解析出的記錄都已處理 (未被取消)
    pub fn is_complete(&self) -> bool {
        self.attempted() == self.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub total_customers: u64,
    pub churned_customers: u64,
    /// 百分比 (0-100)
    pub churn_rate: f64,
    pub avg_monthly_charges: f64,
}

impl fmt::Display for KpiSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Customers:     {}", self.total_customers)?;
        writeln!(f, "Churned Customers:   {}", self.churned_customers)?;
        writeln!(f, "Churn Rate:          {:.1}%", self.churn_rate)?;
        write!(f, "Avg Monthly Charges: ${:.2}", self.avg_monthly_charges)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
}
