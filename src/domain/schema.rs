use crate::domain::model::{CustomerFeatures, FeatureValue, RawRecord};
use crate::utils::error::RecordError;

const YES_NO: &[&str] = &["Yes", "No"];
const INTERNET_ADDON: &[&str] = &["Yes", "No", "No internet service"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeKind {
    Categorical(&'static [&'static str]),
    Integer { min: i64, max: i64 },
    /// `exclusive_min` 為 true 時下限不含等號
    Float { min: f64, exclusive_min: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn is_numeric(&self) -> bool {
        !matches!(self.kind, AttributeKind::Categorical(_))
    }
}

/// 模型服務 `/predict` 接受的 19 個特徵
pub const ATTRIBUTES: [Attribute; 19] = [
    Attribute { name: "gender", kind: AttributeKind::Categorical(&["Male", "Female"]) },
    Attribute { name: "SeniorCitizen", kind: AttributeKind::Categorical(YES_NO) },
    Attribute { name: "Partner", kind: AttributeKind::Categorical(YES_NO) },
    Attribute { name: "Dependents", kind: AttributeKind::Categorical(YES_NO) },
    Attribute { name: "tenure", kind: AttributeKind::Integer { min: 0, max: 100 } },
    Attribute { name: "PhoneService", kind: AttributeKind::Categorical(YES_NO) },
    Attribute {
        name: "MultipleLines",
        kind: AttributeKind::Categorical(&["Yes", "No", "No phone service"]),
    },
    Attribute {
        name: "InternetService",
        kind: AttributeKind::Categorical(&["DSL", "Fiber optic", "No"]),
    },
    Attribute { name: "OnlineSecurity", kind: AttributeKind::Categorical(INTERNET_ADDON) },
    Attribute { name: "OnlineBackup", kind: AttributeKind::Categorical(INTERNET_ADDON) },
    Attribute { name: "DeviceProtection", kind: AttributeKind::Categorical(INTERNET_ADDON) },
    Attribute { name: "TechSupport", kind: AttributeKind::Categorical(INTERNET_ADDON) },
    Attribute { name: "StreamingTV", kind: AttributeKind::Categorical(INTERNET_ADDON) },
    Attribute { name: "StreamingMovies", kind: AttributeKind::Categorical(INTERNET_ADDON) },
    Attribute {
        name: "Contract",
        kind: AttributeKind::Categorical(&["Month-to-month", "One year", "Two year"]),
    },
    Attribute { name: "PaperlessBilling", kind: AttributeKind::Categorical(YES_NO) },
    Attribute {
        name: "PaymentMethod",
        kind: AttributeKind::Categorical(&[
            "Electronic check",
            "Mailed check",
            "Bank transfer (automatic)",
            "Credit card (automatic)",
        ]),
    },
    Attribute {
        name: "MonthlyCharges",
        kind: AttributeKind::Float { min: 0.0, exclusive_min: true },
    },
    Attribute {
        name: "TotalCharges",
        kind: AttributeKind::Float { min: 0.0, exclusive_min: false },
    },
];

pub fn attribute(name: &str) -> Option<&'static Attribute> {
    ATTRIBUTES.iter().find(|attr| attr.name == name)
}

/// 單筆預測表單的預設值
pub const FORM_DEFAULTS: [(&str, &str); 19] = [
    ("gender", "Male"),
    ("SeniorCitizen", "No"),
    ("Partner", "Yes"),
    ("Dependents", "No"),
    ("tenure", "12"),
    ("PhoneService", "Yes"),
    ("MultipleLines", "No"),
    ("InternetService", "Fiber optic"),
    ("OnlineSecurity", "No"),
    ("OnlineBackup", "No"),
    ("DeviceProtection", "No"),
    ("TechSupport", "No"),
    ("StreamingTV", "Yes"),
    ("StreamingMovies", "Yes"),
    ("Contract", "Month-to-month"),
    ("PaperlessBilling", "Yes"),
    ("PaymentMethod", "Electronic check"),
    ("MonthlyCharges", "70.0"),
    ("TotalCharges", "1000.0"),
];

/// 兩筆範例客戶的 CSV 範本，可直接作為批次上傳的起點
pub fn sample_template() -> String {
    let header = ATTRIBUTES
        .iter()
        .map(|attr| attr.name)
        .collect::<Vec<_>>()
        .join(",");
    [
        header.as_str(),
        "Male,No,Yes,No,12,Yes,No,Fiber optic,No,No,No,No,Yes,Yes,Month-to-month,Yes,Electronic check,85.0,1020.0",
        "Female,Yes,No,No,24,Yes,Yes,DSL,Yes,Yes,No,Yes,No,No,One year,No,Mailed check,65.0,1560.0",
    ]
    .join("\n")
}

/// 把原始字串記錄轉成 `CustomerFeatures`。
///
/// 標頭中的每個欄位都必須是已知特徵；數值欄位必須能轉成數字。
/// `strict` 模式另外在本地檢查類別值與數值範圍，否則交由模型服務判斷。
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureSchema {
    strict: bool,
}

impl FeatureSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn coerce(&self, record: &RawRecord) -> Result<CustomerFeatures, RecordError> {
        let mut features = CustomerFeatures::new();

        for (name, value) in record.fields() {
            let attr = attribute(name).ok_or_else(|| mismatch(record, name, "is not a known attribute"))?;

            let Some(raw) = value else {
                if attr.is_numeric() {
                    return Err(mismatch(record, name, "is missing"));
                }
                // 類別欄位缺值時不送出，由服務端決定
                continue;
            };

            let typed = match attr.kind {
                AttributeKind::Categorical(allowed) => {
                    if self.strict && !allowed.iter().any(|candidate| *candidate == raw) {
                        return Err(mismatch(
                            record,
                            name,
                            &format!("has unexpected value '{}' (expected one of: {})", raw, allowed.join(", ")),
                        ));
                    }
                    FeatureValue::Text(raw.to_string())
                }
                AttributeKind::Integer { min, max } => {
                    let n = parse_whole_number(raw)
                        .ok_or_else(|| mismatch(record, name, &format!("is not a whole number: '{}'", raw)))?;
                    if self.strict && (n < min || n > max) {
                        return Err(mismatch(
                            record,
                            name,
                            &format!("must be between {} and {}, got {}", min, max, n),
                        ));
                    }
                    FeatureValue::Integer(n)
                }
                AttributeKind::Float { min, exclusive_min } => {
                    let n = raw
                        .parse::<f64>()
                        .ok()
                        .filter(|n| n.is_finite())
                        .ok_or_else(|| mismatch(record, name, &format!("is not a number: '{}'", raw)))?;
                    let below = if exclusive_min { n <= min } else { n < min };
                    if self.strict && below {
                        let op = if exclusive_min { ">" } else { ">=" };
                        return Err(mismatch(record, name, &format!("must be {} {}, got {}", op, min, n)));
                    }
                    FeatureValue::Float(n)
                }
            };

            features.insert(name, typed);
        }

        Ok(features)
    }
}

fn parse_whole_number(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn mismatch(record: &RawRecord, field: &str, reason: &str) -> RecordError {
    RecordError::SchemaMismatch {
        index: record.index,
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
