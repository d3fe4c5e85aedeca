use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::query_planner::rewriter::RewriteCtx;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// How translated queries are printed by the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// HQL query text
    Hql,
    /// The rewritten query model and HQL tree as JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hql" => Ok(OutputFormat::Hql),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::Parse {
                field: "output_format".to_string(),
                value: other.to_string(),
                source: "expected 'hql' or 'json'".into(),
            }),
        }
    }
}

/// Translator configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Deepest subquery nesting the rewriter and the generator will process
    #[validate(range(
        min = 1,
        max = 1024,
        message = "Max subquery depth must be between 1 and 1024"
    ))]
    pub max_subquery_depth: u32,

    pub output_format: OutputFormat,

    /// `env_logger` filter used when `RUST_LOG` is not set
    #[validate(length(min = 1, message = "Log filter cannot be empty"))]
    pub log_filter: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_subquery_depth: 64,
            output_format: OutputFormat::Hql,
            log_filter: "info".to_string(),
        }
    }
}

impl TranslatorConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_subquery_depth: parse_env_var("QUERYWEAVE_MAX_SUBQUERY_DEPTH", "64")?,
            output_format: parse_env_var("QUERYWEAVE_OUTPUT_FORMAT", "hql")?,
            log_filter: env::var("QUERYWEAVE_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides, then re-validate.
    pub fn with_overrides(
        mut self,
        max_subquery_depth: Option<u32>,
        output_format: Option<OutputFormat>,
    ) -> Result<Self, ConfigError> {
        if let Some(depth) = max_subquery_depth {
            self.max_subquery_depth = depth;
        }
        if let Some(format) = output_format {
            self.output_format = format;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn to_rewrite_ctx(&self) -> RewriteCtx {
        RewriteCtx {
            max_subquery_depth: self.max_subquery_depth,
        }
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
