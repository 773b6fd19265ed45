#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::client::DEFAULT_BASE_URL;
#[cfg(feature = "cli")]
use crate::domain::ports::{ConfigProvider, ExportOptions};
#[cfg(feature = "cli")]
use crate::utils::error::{BatchError, Result};
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_path, validate_url, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

pub const DEFAULT_OUTPUT_PATH: &str = "./output";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "churn-batch")]
#[command(about = "Score customers for churn against a model-serving API")]
pub struct CliConfig {
    /// Base URL of the prediction service
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Directory for exported results
    #[arg(long, global = true)]
    pub output_path: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Reject out-of-vocabulary categories and out-of-range numbers locally
    #[arg(long, global = true)]
    pub strict: bool,

    /// Write loose files instead of a ZIP archive
    #[arg(long, global = true)]
    pub no_zip: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Score every row of a CSV file and export the results
    Batch {
        /// CSV file with a header row
        input: String,
    },
    /// Score one customer, starting from the form defaults
    Predict {
        /// Override a field, e.g. --set tenure=24 --set "Contract=One year"
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        overrides: Vec<(String, String)>,
    },
    /// Show the aggregate churn KPIs
    Kpis,
    /// Check that the prediction service is up
    Health,
    /// Write the sample customer CSV template
    Template {
        #[arg(default_value = "customer_template.csv")]
        path: String,
    },
}

#[cfg(feature = "cli")]
fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    fn output_path(&self) -> &str {
        self.output_path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    fn strict_validation(&self) -> bool {
        self.strict
    }

    fn export_options(&self) -> ExportOptions {
        let mut options = ExportOptions::default();
        if self.no_zip {
            options.zip_filename = None;
        }
        options
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        // 範本只寫本機檔案
        if matches!(self.command, Command::Template { .. }) {
            return Ok(());
        }

        validate_url("--base-url", self.base_url())?;
        validate_path("--output-path", self.output_path())?;

        if let Command::Batch { input } = &self.command {
            if input.trim().is_empty() {
                return Err(BatchError::MissingConfig {
                    field: "input".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_command_with_defaults() {
        let config = CliConfig::try_parse_from(["churn-batch", "batch", "customers.csv"]).unwrap();

        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.output_path(), "./output");
        assert!(!config.strict_validation());
        assert!(config.export_options().zip_filename.is_some());
        assert!(matches!(config.command, Command::Batch { ref input } if input == "customers.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let config = CliConfig::try_parse_from([
            "churn-batch",
            "batch",
            "customers.csv",
            "--base-url",
            "http://models.internal:9000",
            "--no-zip",
            "--strict",
        ])
        .unwrap();

        assert_eq!(config.base_url(), "http://models.internal:9000");
        assert!(config.export_options().zip_filename.is_none());
        assert!(config.strict_validation());
    }

    #[test]
    fn test_predict_overrides() {
        let config = CliConfig::try_parse_from([
            "churn-batch",
            "predict",
            "--set",
            "tenure=24",
            "--set",
            "Contract = One year",
        ])
        .unwrap();

        match config.command {
            Command::Predict { overrides } => assert_eq!(
                overrides,
                vec![
                    ("tenure".to_string(), "24".to_string()),
                    ("Contract".to_string(), "One year".to_string()),
                ]
            ),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bad_assignment_is_rejected() {
        assert!(CliConfig::try_parse_from(["churn-batch", "predict", "--set", "tenure"]).is_err());
        assert!(CliConfig::try_parse_from(["churn-batch", "predict", "--set", "=5"]).is_err());
    }

    #[test]
    fn test_template_ignores_service_settings() {
        let config = CliConfig::try_parse_from([
            "churn-batch",
            "template",
            "customers.csv",
            "--base-url",
            "not-a-url",
        ])
        .unwrap();

        assert!(matches!(config.command, Command::Template { ref path } if path == "customers.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url_fails_validation() {
        let config =
            CliConfig::try_parse_from(["churn-batch", "kpis", "--base-url", "localhost"]).unwrap();
        assert!(config.validate().is_err());
    }
}
