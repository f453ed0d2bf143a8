//! Command execution
//!
//! Each command writes its result to the supplied writer and returns an error
//! when the engine rejects the input, so `main` can map failures to a
//! non-zero exit code.

use crate::cli::{Cli, Command, VariableArgs};
use crate::config::{FormularyConfig, OutputFormat};
use anyhow::{Context, Result, bail};
use formulary_core::{
    CalculationResult, CheckedResolver, EvaluationContext, FormulaEngine, FormulaError,
    LayeredResolver, MapResolver, Rule, VariableResolver,
};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// `[[rules]]` tables in a TOML rule file
#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<Rule>,
}

/// Settings resolved from the configuration file and global flags
#[derive(Debug, Clone)]
pub struct Runner {
    engine: FormulaEngine,
    format: OutputFormat,
    precision: Option<usize>,
    context: EvaluationContext,
    defaults: MapResolver,
}

impl Runner {
    pub fn new(config: &FormularyConfig, format_override: Option<OutputFormat>) -> Self {
        Self {
            engine: FormulaEngine::new(),
            format: format_override.unwrap_or(config.output.format),
            precision: config.output.precision,
            context: config.evaluation_context(),
            defaults: config.default_variables(),
        }
    }

    /// Execute the parsed command line
    pub fn run(&self, cli: &Cli, out: &mut impl Write) -> Result<()> {
        match &cli.command {
            Command::Calc { formula, variables } => self.calc(formula, variables, out),
            Command::Check { condition, variables } => self.check(condition, variables, out),
            Command::Rules { rules_file, variables } => self.rules(rules_file, variables, out),
            Command::Validate { text, condition } => self.validate(text, *condition, out),
            Command::Explain { formula } => self.explain(formula, out),
        }
    }

    fn calc(&self, formula: &str, variables: &VariableArgs, out: &mut impl Write) -> Result<()> {
        let request = variables.resolver()?;
        let resolver = self.resolver(&request);

        match self.engine.calculate(&self.context, formula, &resolver) {
            Ok(value) => {
                info!(value, "calculation succeeded");
                match self.format {
                    OutputFormat::Text => writeln!(out, "{}", self.format_number(value))?,
                    OutputFormat::Json => {
                        let result =
                            CalculationResult::new(value, formula, resolver.get_all_variables());
                        writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
                    }
                }
                Ok(())
            }
            Err(err) => self.report_failure(formula, &resolver, err, out),
        }
    }

    fn check(&self, condition: &str, variables: &VariableArgs, out: &mut impl Write) -> Result<()> {
        let request = variables.resolver()?;
        let resolver = self.resolver(&request);

        let matched = self
            .engine
            .evaluate_condition(&self.context, condition, &resolver)
            .with_context(|| format!("condition '{condition}' failed"))?;

        match self.format {
            OutputFormat::Text => writeln!(out, "{matched}")?,
            OutputFormat::Json => {
                let report = json!({ "condition": condition, "result": matched });
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            }
        }
        Ok(())
    }

    fn rules(&self, path: &Path, variables: &VariableArgs, out: &mut impl Write) -> Result<()> {
        let rules = load_rules(path)?;
        if rules.is_empty() {
            warn!(path = %path.display(), "rule file contains no rules");
        }

        let request = variables.resolver()?;
        let resolver = self.resolver(&request);

        match self.engine.evaluate_rules(&self.context, &rules, &resolver) {
            Ok(result) => {
                let index = result
                    .rule_applied
                    .as_ref()
                    .and_then(|applied| rules.iter().position(|rule| rule == applied));
                info!(value = result.value, rule_index = ?index, "rule matched");

                match self.format {
                    OutputFormat::Text => {
                        writeln!(out, "{}", self.format_number(result.value))?;
                        if let (Some(index), Some(rule)) = (index, &result.rule_applied) {
                            writeln!(out, "rule {index}: {} => {}", rule.condition, rule.calculation)?;
                        }
                    }
                    OutputFormat::Json => {
                        writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?
                    }
                }
                Ok(())
            }
            Err(err) => self.report_failure("", &resolver, err, out),
        }
    }

    fn validate(&self, text: &str, condition: bool, out: &mut impl Write) -> Result<()> {
        let kind = if condition { "condition" } else { "formula" };
        let outcome = if condition {
            self.engine.validate_condition(text)
        } else {
            self.engine.validate_formula(text)
        };

        match (self.format, outcome) {
            (OutputFormat::Text, Ok(())) => {
                writeln!(out, "valid {kind}")?;
                Ok(())
            }
            (OutputFormat::Json, Ok(())) => {
                writeln!(out, "{}", json!({ "kind": kind, "valid": true }))?;
                Ok(())
            }
            (OutputFormat::Text, Err(err)) => Err(err).context(format!("invalid {kind}")),
            (OutputFormat::Json, Err(err)) => {
                let report = json!({
                    "kind": kind,
                    "valid": false,
                    "error": err.to_string(),
                    "position": err.as_parse_error().map(|parse| parse.position),
                });
                writeln!(out, "{report}")?;
                Err(err).context(format!("invalid {kind}"))
            }
        }
    }

    fn explain(&self, formula: &str, out: &mut impl Write) -> Result<()> {
        let expr = self.engine.parse_formula(formula).context("cannot explain formula")?;
        let variables = expr.variables();
        debug!(variable_count = variables.len(), "formula parsed");

        match self.format {
            OutputFormat::Text => {
                writeln!(out, "canonical: {expr}")?;
                writeln!(out, "type:      {}", expr.expected_type())?;
                if variables.is_empty() {
                    writeln!(out, "variables: (none)")?;
                } else {
                    writeln!(out, "variables: {}", variables.join(", "))?;
                }
            }
            OutputFormat::Json => {
                let report = json!({
                    "canonical": expr.to_string(),
                    "expected_type": expr.expected_type(),
                    "variables": variables,
                    "tree": expr,
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            }
        }
        Ok(())
    }

    /// Request variables over configured defaults, checked against the deadline
    fn resolver<'a>(
        &'a self,
        request: &'a MapResolver,
    ) -> CheckedResolver<LayeredResolver<&'a MapResolver, &'a MapResolver>> {
        CheckedResolver::new(LayeredResolver::new(request, &self.defaults))
    }

    fn report_failure<R>(
        &self,
        formula: &str,
        resolver: &R,
        err: FormulaError,
        out: &mut impl Write,
    ) -> Result<()>
    where
        R: VariableResolver,
    {
        warn!(category = err.category(), error = %err, "evaluation failed");

        if self.format == OutputFormat::Json {
            let result = CalculationResult::failed(formula, resolver.get_all_variables(), &err);
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        }
        Err(err.into())
    }

    fn format_number(&self, value: f64) -> String {
        match self.precision {
            Some(places) => format!("{value:.places$}"),
            None => value.to_string(),
        }
    }
}

/// Read rules from a `.json` array or a `.toml` file of `[[rules]]` tables
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file '{}'", path.display()))?;

    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("invalid JSON rule file '{}'", path.display())),
        Some("toml") => toml::from_str::<RuleFile>(&contents)
            .map(|file| file.rules)
            .with_context(|| format!("invalid TOML rule file '{}'", path.display())),
        _ => bail!("unsupported rule file '{}' (expected .json or .toml)", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(args: &[&str], config: &FormularyConfig) -> (Result<()>, String) {
        let cli = Cli::try_parse_from(args).unwrap();
        let runner = Runner::new(config, cli.format);
        let mut out = Vec::new();
        let result = runner.run(&cli, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn calc_prints_the_value() {
        let args =
            ["formulary", "calc", "price * quantity", "--var", "price=10.5", "--var", "quantity=3"];
        let (result, out) = run(&args, &FormularyConfig::default());
        result.unwrap();
        assert_eq!(out, "31.5\n");
    }

    #[test]
    fn precision_applies_to_text_output() {
        let mut config = FormularyConfig::default();
        config.output.precision = Some(2);
        let (result, out) = run(&["formulary", "calc", "10 / 3"], &config);
        result.unwrap();
        assert_eq!(out, "3.33\n");
    }

    #[test]
    fn defaults_fill_in_missing_variables() {
        let config = FormularyConfig::from_toml_str("[defaults]\ntaxRate = 0.5\n").unwrap();
        let args = ["formulary", "calc", "price * (1 + taxRate)", "--var", "price=10"];
        let (result, out) = run(&args, &config);
        result.unwrap();
        assert_eq!(out, "15\n");
    }

    #[test]
    fn calc_failure_in_json_still_reports() {
        let args = ["formulary", "--format", "json", "calc", "price / 0", "--var", "price=1"];
        let (result, out) = run(&args, &FormularyConfig::default());
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "evaluation error: division by zero");

        let report: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(report["error"], "evaluation error: division by zero");
        assert!(report["value"].is_null());
    }

    #[test]
    fn expired_deadline_stops_evaluation() {
        let config = FormularyConfig::from_toml_str("[evaluation]\ndeadline_ms = 0\n").unwrap();
        let args = ["formulary", "calc", "price * 2", "--var", "price=3"];
        let (result, out) = run(&args, &config);
        assert_eq!(result.unwrap_err().to_string(), "evaluation error: evaluation deadline exceeded");
        assert!(out.is_empty());

        let args = ["formulary", "check", "price > 1", "--var", "price=3"];
        let (result, _) = run(&args, &config);
        assert!(format!("{:#}", result.unwrap_err()).contains("deadline exceeded"));

        // Formulas without variables never consult the resolver
        let (result, out) = run(&["formulary", "calc", "1 + 1"], &config);
        result.unwrap();
        assert_eq!(out, "2\n");
    }

    #[test]
    fn check_prints_booleans() {
        let args = ["formulary", "check", "quantity >= 10", "--var", "quantity=12"];
        let (result, out) = run(&args, &FormularyConfig::default());
        result.unwrap();
        assert_eq!(out, "true\n");

        let (result, out) = run(&["formulary", "check", "never"], &FormularyConfig::default());
        result.unwrap();
        assert_eq!(out, "false\n");
    }

    #[test]
    fn validate_reports_parse_positions() {
        let mut config = FormularyConfig::default();
        config.output.format = OutputFormat::Json;
        let (result, out) = run(&["formulary", "validate", "2 + (3 * 4"], &config);
        assert!(result.is_err());

        let report: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(report["valid"], false);
        assert_eq!(report["position"], 10);

        let args = ["formulary", "validate", "--condition", "always"];
        let (result, out) = run(&args, &FormularyConfig::default());
        result.unwrap();
        assert_eq!(out, "valid condition\n");
    }

    #[test]
    fn explain_lists_type_and_variables() {
        let args = ["formulary", "explain", "quantity > 10 ? price * 0.9 : price"];
        let (result, out) = run(&args, &FormularyConfig::default());
        result.unwrap();
        assert_eq!(
            out,
            "canonical: ((quantity > 10) ? (price * 0.9) : price)\ntype:      unknown\nvariables: price, quantity\n"
        );
    }

    #[test]
    fn rule_files_need_a_known_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        fs::write(&path, "rules: []").unwrap();
        let err = load_rules(&path).unwrap_err();
        assert!(err.to_string().contains("expected .json or .toml"));
    }
}
