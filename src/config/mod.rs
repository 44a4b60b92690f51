use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::errors::{ConfigError, ConfigResult};
use crate::rules::RuleSet;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Shape of the input file. Read-only once the pipeline starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParserConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_expected_columns")]
    pub expected_columns: usize,
    #[serde(default = "default_has_header")]
    pub has_header: bool,
    #[serde(default)]
    pub columns: ColumnLayout,
}

/// Zero-based column positions read by the bundled rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnLayout {
    pub loan_amount: usize,
    pub funding_amount: usize,
    pub funding_inv_amt: usize,
    pub term: usize,
    pub interest_rate: usize,
    pub grade: usize,
    pub subgrade: usize,
    pub emp_title: usize,
    pub emp_length: usize,
    pub home_ownership: usize,
    pub annual_inc: usize,
    pub verification_status: usize,
    pub dti: usize,
    pub earliest_cr_line: usize,
    pub fico_range_low: usize,
    pub fico_range_high: usize,
    pub open_acc: usize,
    pub pub_rec: usize,
    pub total_acc: usize,
    pub application_type: usize,
    pub annual_inc_joint: usize,
    pub acc_now_delinq: usize,
    pub tot_coll_amt: usize,
    pub avg_cur_bal: usize,
    pub pub_rec_bankruptcies: usize,
    pub tax_liens: usize,
}

/// Concurrency and queue sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum rows validated at once
    #[serde(default = "default_validator_pool_size")]
    pub validator_pool_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub write_back_queue_capacity: usize,
    #[serde(default = "default_worker_count")]
    pub write_back_workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub error_queue_capacity: usize,
    #[serde(default = "default_worker_count")]
    pub error_workers: usize,
    /// Idle record containers kept for reuse
    #[serde(default = "default_record_pool_max_idle")]
    pub record_pool_max_idle: usize,
    /// Rows between progress log lines
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    /// Delete an existing record before writing its fields
    #[serde(default)]
    pub replace_existing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Active rules, in evaluation order
    #[serde(default = "default_enabled_rules")]
    pub enabled: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            expected_columns: default_expected_columns(),
            has_header: default_has_header(),
            columns: ColumnLayout::default(),
        }
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            loan_amount: 2,
            funding_amount: 3,
            funding_inv_amt: 4,
            term: 5,
            interest_rate: 6,
            grade: 8,
            subgrade: 9,
            emp_title: 10,
            emp_length: 11,
            home_ownership: 12,
            annual_inc: 13,
            verification_status: 14,
            dti: 36,
            earliest_cr_line: 38,
            fico_range_low: 39,
            fico_range_high: 40,
            open_acc: 44,
            pub_rec: 45,
            total_acc: 48,
            application_type: 69,
            annual_inc_joint: 70,
            acc_now_delinq: 73,
            tot_coll_amt: 74,
            avg_cur_bal: 92,
            pub_rec_bankruptcies: 121,
            tax_liens: 122,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validator_pool_size: default_validator_pool_size(),
            write_back_queue_capacity: default_queue_capacity(),
            write_back_workers: default_worker_count(),
            error_queue_capacity: default_queue_capacity(),
            error_workers: default_worker_count(),
            record_pool_max_idle: default_record_pool_max_idle(),
            progress_interval: default_progress_interval(),
            replace_existing: false,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_rules(),
        }
    }
}

impl ParserConfig {
    /// Parser settings with the given shape and the default column layout
    pub fn new<D: Into<String>>(delimiter: D, expected_columns: usize, has_header: bool) -> Self {
        Self {
            delimiter: delimiter.into(),
            expected_columns,
            has_header,
            columns: ColumnLayout::default(),
        }
    }

    pub fn with_columns(mut self, columns: ColumnLayout) -> Self {
        self.columns = columns;
        self
    }
}

impl Config {
    /// Load from `$CONFIG_FILE`, falling back to `config.toml`
    pub fn load() -> ConfigResult<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        let config = Self::load_from_file(&config_file)?;
        info!("Configuration loaded from: {}", config_file);
        Ok(config)
    }

    /// Load from TOML (or JSON when the extension is `.json`), writing the
    /// defaults to `config_file` when it does not exist yet.
    pub fn load_from_file(config_file: &str) -> ConfigResult<Self> {
        let path = Path::new(config_file);
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: config_file.to_string(),
                source,
            })?;
            if is_json {
                serde_json::from_str(&contents)?
            } else {
                toml::from_str(&contents)?
            }
        } else {
            let default_config = Self::default();
            let contents = if is_json {
                serde_json::to_string_pretty(&default_config)?
            } else {
                toml::to_string_pretty(&default_config)?
            };
            std::fs::write(path, contents).map_err(|source| ConfigError::Read {
                path: config_file.to_string(),
                source,
            })?;
            info!("Created default config file: {}", config_file);
            default_config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.parser.delimiter.is_empty() {
            return Err(ConfigError::invalid("parser.delimiter", "must not be empty"));
        }
        if self.parser.expected_columns == 0 {
            return Err(ConfigError::invalid(
                "parser.expected_columns",
                "must be greater than zero",
            ));
        }

        let sizes = [
            ("pipeline.validator_pool_size", self.pipeline.validator_pool_size),
            (
                "pipeline.write_back_queue_capacity",
                self.pipeline.write_back_queue_capacity,
            ),
            ("pipeline.write_back_workers", self.pipeline.write_back_workers),
            ("pipeline.error_queue_capacity", self.pipeline.error_queue_capacity),
            ("pipeline.error_workers", self.pipeline.error_workers),
        ];
        for (field, value) in sizes {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if self.pipeline.progress_interval == 0 {
            return Err(ConfigError::invalid(
                "pipeline.progress_interval",
                "must be greater than zero",
            ));
        }

        RuleSet::from_names(&self.rules.enabled)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parser.delimiter, ",");
        assert_eq!(config.parser.columns.interest_rate, 6);
        assert_eq!(config.rules.enabled, vec!["low_dti_and_home_ownership"]);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [parser]
            delimiter = "|"
            expected_columns = 5

            [parser.columns]
            interest_rate = 4

            [pipeline]
            validator_pool_size = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.parser.delimiter, "|");
        assert!(config.parser.has_header);
        assert_eq!(config.parser.columns.interest_rate, 4);
        assert_eq!(config.parser.columns.loan_amount, 2);
        assert_eq!(config.pipeline.validator_pool_size, 8);
        assert_eq!(config.pipeline.write_back_workers, 100);
    }

    #[test]
    fn test_json_config_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"parser": {"delimiter": ";", "expected_columns": 3, "has_header": false}}"#,
        )
        .unwrap();

        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.parser.delimiter, ";");
        assert_eq!(config.parser.expected_columns, 3);
        assert!(!config.parser.has_header);
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        assert_eq!(
            config.pipeline.validator_pool_size,
            PipelineConfig::default().validator_pool_size
        );

        let reloaded = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(reloaded.parser, config.parser);
    }

    #[test]
    fn test_load_reads_config_file_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("from_env.toml");
        std::fs::write(&path, "[parser]\ndelimiter = \"\\t\"\n").unwrap();

        // only test that touches CONFIG_FILE
        std::env::set_var("CONFIG_FILE", &path);
        let loaded = Config::load();
        std::env::remove_var("CONFIG_FILE");

        assert_eq!(loaded.unwrap().parser.delimiter, "\t");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.parser.delimiter.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "parser.delimiter"
        ));

        let mut config = Config::default();
        config.pipeline.write_back_workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rules.enabled.push("no_such_rule".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }
}
