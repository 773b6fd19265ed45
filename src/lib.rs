pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig, Command};
pub use config::toml_config::TomlConfig;

pub use core::{
    client::{ClientConfig, PredictionClient},
    engine::{BatchEngine, BatchReport},
    orchestrator::{BatchOrchestrator, CancelToken},
    parser::parse_records,
    pipeline::BatchPipeline,
};
pub use domain::schema::FeatureSchema;
pub use utils::error::{BatchError, RecordError, Result};
