//! Command-line definition

use crate::config::OutputFormat;
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use formulary_core::{MapResolver, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Evaluate formulas, conditions and rule sets
#[derive(Parser, Debug)]
#[command(name = "formulary")]
#[command(about = "Formula, condition and rule evaluation from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to $FORMULARY_CONFIG_PATH or ./formulary.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format; overrides the configuration file
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a formula to a number
    Calc {
        formula: String,

        #[command(flatten)]
        variables: VariableArgs,
    },

    /// Evaluate a condition to true or false
    Check {
        condition: String,

        #[command(flatten)]
        variables: VariableArgs,
    },

    /// Evaluate a rule file (.json array or .toml [[rules]]) and report the first match
    Rules {
        rules_file: PathBuf,

        #[command(flatten)]
        variables: VariableArgs,
    },

    /// Check that a formula or condition parses
    Validate {
        text: String,

        /// Treat the text as a condition
        #[arg(long)]
        condition: bool,
    },

    /// Show the canonical form, result type and variables of a formula
    Explain { formula: String },
}

/// Variables supplied on the command line
#[derive(Args, Debug, Default, Clone)]
pub struct VariableArgs {
    /// Variable as NAME=VALUE; numbers and true/false are typed, anything else is a string
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub vars: Vec<(String, Value)>,

    /// JSON object of variables
    #[arg(long = "vars", value_name = "FILE")]
    pub vars_file: Option<PathBuf>,
}

impl VariableArgs {
    /// Collect variables; `--var` entries override the file
    pub fn resolver(&self) -> Result<MapResolver> {
        let mut resolver = match &self.vars_file {
            Some(path) => load_variables_file(path)?,
            None => MapResolver::new(),
        };
        for (name, value) in &self.vars {
            resolver.insert(name.clone(), value.clone());
        }
        Ok(resolver)
    }
}

/// Parse `NAME=VALUE`
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got '{raw}'");
    };

    let name = name.trim();
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("invalid variable name '{name}'");
    }

    Ok((name.to_string(), Value::parse_loose(value)))
}

fn load_variables_file(path: &Path) -> Result<MapResolver> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read variables file '{}'", path.display()))?;
    let raw: HashMap<String, serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("variables file '{}' is not a JSON object", path.display()))?;

    raw.iter()
        .map(|(name, value)| -> Result<(String, Value)> {
            let value = Value::try_from(value)
                .with_context(|| format!("unsupported value for variable '{name}'"))?;
            Ok((name.clone(), value))
        })
        .collect()
}
