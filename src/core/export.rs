use crate::domain::model::{BatchOutcome, BatchRow};
use crate::domain::ports::ExportOptions;
use crate::utils::error::{BatchError, Result};
use chrono::{DateTime, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

/// 匯出時放在原始欄位之前的預測欄位
pub const PREDICTION_COLUMNS: [&str; 3] = ["churn_probability", "churn_prediction", "risk_level"];

/// 結果表格的一列
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub index: usize,
    pub tenure: Option<String>,
    pub contract: Option<String>,
    pub probability: String,
    pub label: &'static str,
    pub risk_level: String,
}

impl From<&BatchRow> for DisplayRow {
    fn from(row: &BatchRow) -> Self {
        Self {
            index: row.index,
            tenure: row.record.get("tenure").map(str::to_string),
            contract: row.record.get("Contract").map(str::to_string),
            probability: format_probability(row.prediction.churn_probability),
            label: prediction_label(row.prediction.churn_prediction),
            risk_level: row.prediction.risk_level.clone(),
        }
    }
}

pub fn format_probability(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

pub fn prediction_label(churn: bool) -> &'static str {
    if churn {
        "CHURN"
    } else {
        "STAY"
    }
}

pub fn display_rows(outcome: &BatchOutcome) -> Vec<DisplayRow> {
    outcome.results.iter().map(DisplayRow::from).collect()
}

/// 以固定寬度輸出結果表格 (CLI 用)
pub fn render_table(rows: &[DisplayRow]) -> String {
    let mut lines = vec![format!(
        "{:<6} {:<8} {:<16} {:<12} {:<10} {}",
        "Row", "Tenure", "Contract", "Probability", "Prediction", "Risk"
    )];
    for row in rows {
        lines.push(format!(
            "{:<6} {:<8} {:<16} {:<12} {:<10} {}",
            row.index + 1,
            row.tenure.as_deref().unwrap_or("-"),
            row.contract.as_deref().unwrap_or("-"),
            row.probability,
            row.label,
            row.risk_level
        ));
    }
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub high_risk: usize,
    /// 成功記錄的平均流失機率 (百分比)；沒有成功記錄時為 `None`
    pub avg_churn_probability_pct: Option<f64>,
    pub risk_breakdown: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub fn summarize(outcome: &BatchOutcome) -> BatchSummary {
    let mut risk_breakdown = BTreeMap::new();
    for row in &outcome.results {
        *risk_breakdown
            .entry(row.prediction.risk_level.clone())
            .or_insert(0) += 1;
    }

    let high_risk = outcome
        .results
        .iter()
        .filter(|row| row.prediction.risk_level.eq_ignore_ascii_case("high"))
        .count();

    let avg_churn_probability_pct = if outcome.results.is_empty() {
        None
    } else {
        let sum: f64 = outcome
            .results
            .iter()
            .map(|row| row.prediction.churn_probability)
            .sum();
        Some(sum / outcome.results.len() as f64 * 100.0)
    };

    BatchSummary {
        total: outcome.total,
        succeeded: outcome.succeeded(),
        failed: outcome.failed(),
        cancelled: outcome.cancelled,
        high_risk,
        avg_churn_probability_pct,
        risk_breakdown,
        started_at: outcome.started_at,
        finished_at: outcome.finished_at,
    }
}

/// 把成功的記錄寫回 CSV：預測欄位 + 原始標頭。
///
/// 與解析器一樣不加引號。每列只寫到最後一個有值的欄位，
/// 重新解析時缺值標記仍是缺值，而不是空字串。
pub fn to_csv(outcome: &BatchOutcome) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(
        PREDICTION_COLUMNS
            .into_iter()
            .chain(outcome.headers.iter().map(String::as_str)),
    )?;

    for row in &outcome.results {
        let values: Vec<Option<&str>> = row.record.fields().map(|(_, value)| value).collect();
        let present = values
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1);

        let mut fields = vec![
            row.prediction.churn_probability.to_string(),
            u8::from(row.prediction.churn_prediction).to_string(),
            row.prediction.risk_level.clone(),
        ];
        fields.extend(
            values[..present]
                .iter()
                .map(|value| value.unwrap_or_default().to_string()),
        );
        writer.write_record(&fields)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| BatchError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| {
        BatchError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// 匯出的一個檔案
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub name: String,
    pub contents: Vec<u8>,
}

/// 組出匯出檔案：預測 CSV、摘要 JSON，有失敗時再加失敗清單
pub fn export_files(outcome: &BatchOutcome, options: &ExportOptions) -> Result<Vec<ExportFile>> {
    let mut files = vec![
        ExportFile {
            name: options.csv_filename.clone(),
            contents: to_csv(outcome)?.into_bytes(),
        },
        ExportFile {
            name: options.summary_filename.clone(),
            contents: serde_json::to_vec_pretty(&summarize(outcome))?,
        },
    ];

    if !outcome.failures.is_empty() {
        files.push(ExportFile {
            name: options.failures_filename.clone(),
            contents: serde_json::to_vec_pretty(&outcome.failures)?,
        });
    }

    Ok(files)
}

pub fn build_archive(files: &[ExportFile]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for file in files {
        zip.start_file(file.name.as_str(), SimpleFileOptions::default())?;
        zip.write_all(&file.contents)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
