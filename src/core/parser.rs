use crate::domain::model::{RawRecord, RecordSet};
use crate::utils::error::{BatchError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};

/// 解析上傳的 CSV 文字。
///
/// 第一個非空行是標頭，其餘非空行是資料列。只以逗號切分，不支援引號跳脫：
/// 值裡的逗號一定會被當作分隔符，引號字元原樣保留。
/// 欄位數少於標頭時，缺的欄位為 `None`；多出的值直接忽略。
pub fn parse_records(text: &str) -> Result<RecordSet> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = reader.records().filter(|row| match row {
        Ok(record) => !is_blank(record),
        Err(_) => true,
    });

    let headers: Vec<String> = match rows.next() {
        Some(row) => row
            .map_err(|e| BatchError::parse(format!("unreadable header row: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Err(BatchError::parse("input has no header row")),
    };

    let mut records = Vec::new();
    for (index, row) in rows.enumerate() {
        let row = row.map_err(|e| BatchError::parse(format!("unreadable data row {}: {}", index, e)))?;
        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), row.get(i).map(str::to_string)))
            .collect();
        records.push(RawRecord::new(index, fields));
    }

    tracing::debug!(
        "Parsed {} records with {} columns",
        records.len(),
        headers.len()
    );

    Ok(RecordSet { headers, records })
}

/// 從檔案位元組解析，非 UTF-8 內容視為解析錯誤
pub fn parse_bytes(data: &[u8]) -> Result<RecordSet> {
    let text = std::str::from_utf8(data)
        .map_err(|e| BatchError::parse(format!("input is not valid UTF-8: {}", e)))?;
    parse_records(text)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty) && record.len() <= 1
}
