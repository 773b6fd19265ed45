pub mod client;
pub mod engine;
pub mod export;
pub mod orchestrator;
pub mod parser;
pub mod pipeline;

pub use crate::domain::model::{BatchOutcome, BatchRow, RawRecord, RecordSet};
pub use crate::domain::ports::{ConfigProvider, ExportOptions, Pipeline, Predictor, Storage};
pub use crate::utils::error::Result;
