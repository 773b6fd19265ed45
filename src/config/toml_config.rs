use crate::config::DEFAULT_OUTPUT_PATH;
use crate::core::client::DEFAULT_BASE_URL;
use crate::domain::ports::{ConfigProvider, ExportOptions};
use crate::utils::error::{BatchError, Result};
use crate::utils::validation::{validate_file_name, validate_path, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub export: ExportConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub strict_validation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    pub csv_filename: Option<String>,
    pub summary_filename: Option<String>,
    pub failures_filename: Option<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_output_path() -> String {
    DEFAULT_OUTPUT_PATH.to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            csv_filename: None,
            summary_filename: None,
            failures_filename: None,
            compression: None,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BatchError::ConfigValidation {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CHURN_API_URL})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| BatchError::Config {
            message: format!("invalid env pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    /// 命令列參數優先於檔案設定
    #[cfg(feature = "cli")]
    pub fn apply_overrides(&mut self, cli: &crate::config::CliConfig) {
        if let Some(base_url) = &cli.base_url {
            self.service.base_url = base_url.clone();
        }
        if let Some(output_path) = &cli.output_path {
            self.export.output_path = output_path.clone();
        }
        if cli.strict {
            self.batch.strict_validation = true;
        }
        if cli.no_zip {
            let compression = self.export.compression.get_or_insert(CompressionConfig {
                enabled: false,
                filename: None,
            });
            compression.enabled = false;
        }
        if cli.monitor {
            self.monitoring = Some(MonitoringConfig { enabled: true });
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_url("service.base_url", &self.service.base_url)?;
        validate_path("export.output_path", &self.export.output_path)?;

        let options = self.export_options();
        validate_file_name("export.csv_filename", &options.csv_filename, &["csv"])?;
        validate_file_name("export.summary_filename", &options.summary_filename, &["json"])?;
        validate_file_name("export.failures_filename", &options.failures_filename, &["json"])?;
        if let Some(zip_name) = &options.zip_filename {
            validate_file_name("export.compression.filename", zip_name, &["zip"])?;
        }

        let names = [
            &options.csv_filename,
            &options.summary_filename,
            &options.failures_filename,
        ];
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(BatchError::InvalidConfigValue {
                    field: "export".to_string(),
                    value: name.to_string(),
                    reason: "Export file names must be distinct".to_string(),
                });
            }
        }

        Ok(())
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn base_url(&self) -> &str {
        &self.service.base_url
    }

    fn output_path(&self) -> &str {
        &self.export.output_path
    }

    fn strict_validation(&self) -> bool {
        self.batch.strict_validation
    }

    fn export_options(&self) -> ExportOptions {
        let mut options = ExportOptions::default();
        if let Some(name) = &self.export.csv_filename {
            options.csv_filename = name.clone();
        }
        if let Some(name) = &self.export.summary_filename {
            options.summary_filename = name.clone();
        }
        if let Some(name) = &self.export.failures_filename {
            options.failures_filename = name.clone();
        }
        if let Some(compression) = &self.export.compression {
            options.zip_filename = if compression.enabled {
                compression
                    .filename
                    .clone()
                    .or(options.zip_filename)
            } else {
                None
            };
        }
        options
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[service]
base_url = "https://models.example.com"

[batch]
strict_validation = true

[export]
output_path = "./reports"
csv_filename = "scored.csv"

[export.compression]
enabled = true
filename = "scored.zip"

[monitoring]
enabled = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.base_url(), "https://models.example.com");
        assert_eq!(config.output_path(), "./reports");
        assert!(config.strict_validation());
        assert!(config.monitoring_enabled());

        let options = config.export_options();
        assert_eq!(options.csv_filename, "scored.csv");
        assert_eq!(options.summary_filename, "summary.json");
        assert_eq!(options.zip_filename.as_deref(), Some("scored.zip"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();

        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.output_path(), "./output");
        assert!(!config.strict_validation());
        assert!(!config.monitoring_enabled());
        assert_eq!(config.export_options(), ExportOptions::default());
    }

    #[test]
    fn test_compression_disabled_writes_loose_files() {
        let toml_content = r#"
[export.compression]
enabled = false
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.export_options().zip_filename.is_none());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CHURN_TEST_BASE_URL", "https://env.example.com");

        let toml_content = r#"
[service]
base_url = "${CHURN_TEST_BASE_URL}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.service.base_url, "https://env.example.com");

        std::env::remove_var("CHURN_TEST_BASE_URL");
    }

    #[test]
    fn test_unset_env_var_is_left_in_place() {
        let toml_content = r#"
[service]
base_url = "${CHURN_TEST_NEVER_SET}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.service.base_url, "${CHURN_TEST_NEVER_SET}");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let bad_url = TomlConfig::from_toml_str("[service]\nbase_url = \"invalid-url\"\n").unwrap();
        assert!(bad_url.validate().is_err());

        let bad_ext =
            TomlConfig::from_toml_str("[export]\ncsv_filename = \"scored.txt\"\n").unwrap();
        assert!(bad_ext.validate().is_err());

        let clash = TomlConfig::from_toml_str(
            "[export]\nsummary_filename = \"out.json\"\nfailures_filename = \"out.json\"\n",
        )
        .unwrap();
        assert!(clash.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = TomlConfig::from_toml_str("[service\nbase_url = 1").unwrap_err();
        assert!(matches!(err, BatchError::ConfigValidation { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[export]\noutput_path = \"./from-file\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.output_path(), "./from-file");
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_overrides_file_values() {
        use clap::Parser;

        let mut config = TomlConfig::from_toml_str(
            "[service]\nbase_url = \"https://file.example.com\"\n[export]\noutput_path = \"./file\"\n",
        )
        .unwrap();
        let cli = crate::config::CliConfig::try_parse_from([
            "churn-batch",
            "batch",
            "in.csv",
            "--output-path",
            "./cli",
            "--no-zip",
            "--monitor",
        ])
        .unwrap();

        config.apply_overrides(&cli);

        assert_eq!(config.base_url(), "https://file.example.com");
        assert_eq!(config.output_path(), "./cli");
        assert!(config.export_options().zip_filename.is_none());
        assert!(config.monitoring_enabled());
    }
}
