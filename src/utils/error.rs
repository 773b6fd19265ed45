use serde::Serialize;
use thiserror::Error;

/// 單筆記錄的錯誤，不會中止整個批次
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordError {
    #[error("Record {index}: remote invocation failed: {reason}")]
    RemoteInvocation {
        index: usize,
        status: Option<u16>,
        reason: String,
    },

    #[error("Record {index}: field '{field}' {reason}")]
    SchemaMismatch {
        index: usize,
        field: String,
        reason: String,
    },
}

impl RecordError {
    /// 出錯記錄在資料列中的位置 (0 起算)
    pub fn index(&self) -> usize {
        match self {
            RecordError::RemoteInvocation { index, .. } => *index,
            RecordError::SchemaMismatch { index, .. } => *index,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            RecordError::RemoteInvocation { reason, .. } => reason,
            RecordError::SchemaMismatch { reason, .. } => reason,
        }
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Network,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BatchError {
    pub fn parse(message: impl Into<String>) -> Self {
        BatchError::Parse {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BatchError::Parse { .. }
            | BatchError::Csv(_)
            | BatchError::Record(RecordError::SchemaMismatch { .. }) => ErrorCategory::Input,
            BatchError::Api(_) | BatchError::Record(RecordError::RemoteInvocation { .. }) => {
                ErrorCategory::Network
            }
            BatchError::Io(_) | BatchError::Serialization(_) | BatchError::Zip(_) => {
                ErrorCategory::Storage
            }
            BatchError::Config { .. }
            | BatchError::ConfigValidation { .. }
            | BatchError::InvalidConfigValue { .. }
            | BatchError::MissingConfig { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BatchError::Api(_) | BatchError::Record(RecordError::RemoteInvocation { .. }) => {
                ErrorSeverity::Medium
            }
            BatchError::Parse { .. }
            | BatchError::Csv(_)
            | BatchError::Record(RecordError::SchemaMismatch { .. }) => ErrorSeverity::High,
            BatchError::Config { .. }
            | BatchError::ConfigValidation { .. }
            | BatchError::InvalidConfigValue { .. }
            | BatchError::MissingConfig { .. } => ErrorSeverity::High,
            BatchError::Io(_) | BatchError::Serialization(_) | BatchError::Zip(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => {
                "Check that the file is comma-delimited text with a header row on the first non-empty line"
            }
            ErrorCategory::Network => {
                "Check that the prediction service is running and reachable at the configured base URL"
            }
            ErrorCategory::Storage => "Check the output path exists and is writable",
            ErrorCategory::Configuration => {
                "Fix the configuration value named above and run again"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BatchError::Parse { message } => format!("Could not read the uploaded CSV: {}", message),
            BatchError::Record(e) => format!("A record could not be scored: {}", e),
            BatchError::Api(e) if e.is_connect() => {
                "Could not connect to the prediction service".to_string()
            }
            BatchError::Api(e) => format!("The prediction service request failed: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
