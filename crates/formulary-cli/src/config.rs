//! `formulary.toml` loading with environment overrides

use anyhow::{Context, Result};
use formulary_core::{EvaluationContext, MapResolver, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "FORMULARY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "formulary.toml";

/// How command results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("unknown output format '{other}' (expected text or json)"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Decimal places for numbers in text output
    pub precision: Option<usize>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub deadline_ms: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FormularyConfig {
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    pub evaluation: EvaluationConfig,
    /// Fallback variables, layered under the ones given on the command line
    pub defaults: HashMap<String, Value>,
    /// File the configuration was read from; `None` when defaults were used
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl FormularyConfig {
    /// Load from `path`, else `FORMULARY_CONFIG_PATH`, else `./formulary.toml`.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        match fs::read_to_string(&config_path) {
            Ok(contents) => {
                let mut config = Self::from_toml_str(&contents).with_context(|| {
                    format!("failed to parse configuration file '{}'", config_path.display())
                })?;
                config.source = Some(config_path);
                Ok(config)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound && path.is_none() => {
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| {
                format!("failed to read configuration file '{}'", config_path.display())
            }),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `FORMULARY_LOG_FILTER` and `FORMULARY_OUTPUT_FORMAT`
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(filter) = lookup("FORMULARY_LOG_FILTER") {
            self.logging.filter = filter;
        }
        if let Some(format) = lookup("FORMULARY_OUTPUT_FORMAT") {
            self.output.format =
                format.parse().context("invalid FORMULARY_OUTPUT_FORMAT override")?;
        }
        Ok(self)
    }

    /// Context for one command, carrying the configured deadline if any
    pub fn evaluation_context(&self) -> EvaluationContext {
        match self.evaluation.deadline_ms {
            Some(ms) => EvaluationContext::background().with_timeout(Duration::from_millis(ms)),
            None => EvaluationContext::background(),
        }
    }

    pub fn default_variables(&self) -> MapResolver {
        MapResolver::from(self.defaults.clone())
    }
}
