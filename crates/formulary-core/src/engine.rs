//! Engine facade
//!
//! [`FormulaEngine`] is the entry point most callers need. It holds no state,
//! so one value can be copied freely or shared between threads.

use crate::condition;
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::formula::{Expression, parser};
use crate::resolver::VariableResolver;
use crate::rules::{self, CalculationResult, Rule};
use tracing::{debug, instrument};

/// Stateless formula, condition and rule engine
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaEngine;

impl FormulaEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parse and evaluate a formula, coercing the result to a number.
    ///
    /// A formula whose result is a boolean or string is a type error.
    #[instrument(level = "debug", skip_all, fields(formula_len = formula.len()))]
    pub fn calculate<R>(
        &self,
        ctx: &EvaluationContext,
        formula: &str,
        resolver: &R,
    ) -> FormulaResult<f64>
    where
        R: VariableResolver + ?Sized,
    {
        let expr = parser::parse_formula(formula)?;
        let result = expr.evaluate_number(ctx, resolver).map_err(FormulaError::from);

        match &result {
            Ok(value) => debug!(value, "formula evaluated"),
            Err(err) => debug!(category = err.category(), error = %err, "formula failed"),
        }
        result
    }

    /// Evaluate a condition, answering trivial literals without parsing
    #[instrument(level = "debug", skip_all, fields(condition_len = condition.len()))]
    pub fn evaluate_condition<R>(
        &self,
        ctx: &EvaluationContext,
        condition: &str,
        resolver: &R,
    ) -> FormulaResult<bool>
    where
        R: VariableResolver + ?Sized,
    {
        let result = condition::evaluate_condition(ctx, condition, resolver);

        match &result {
            Ok(matched) => debug!(matched, "condition evaluated"),
            Err(err) => debug!(category = err.category(), error = %err, "condition failed"),
        }
        result
    }

    /// Evaluate rules in order; the first whose condition holds wins
    #[instrument(level = "debug", skip_all, fields(rule_count = rules.len()))]
    pub fn evaluate_rules<R>(
        &self,
        ctx: &EvaluationContext,
        rules: &[Rule],
        resolver: &R,
    ) -> FormulaResult<CalculationResult>
    where
        R: VariableResolver + ?Sized,
    {
        let result = rules::evaluate_rules(ctx, rules, resolver);

        match &result {
            Ok(calculation) => debug!(value = calculation.value, "rule matched"),
            Err(err) => debug!(category = err.category(), error = %err, "rule evaluation failed"),
        }
        result
    }

    /// Check that a formula parses. Accepts exactly the formulas `calculate`
    /// would not reject for a syntax reason.
    pub fn validate_formula(&self, formula: &str) -> FormulaResult<()> {
        parser::parse_formula(formula)?;
        Ok(())
    }

    /// Check that a condition parses; trivial literals always pass
    pub fn validate_condition(&self, condition: &str) -> FormulaResult<()> {
        condition::validate_condition(condition)
    }

    /// Parse a formula for callers that cache trees
    pub fn parse_formula(&self, formula: &str) -> FormulaResult<Expression> {
        Ok(parser::parse_formula(formula)?)
    }

    /// Parse a condition for callers that cache trees
    pub fn parse_condition(&self, condition: &str) -> FormulaResult<Expression> {
        Ok(parser::parse_condition(condition)?)
    }
}
