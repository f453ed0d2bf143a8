//! Ordered rule evaluation
//!
//! A rule set is a list of `(condition, calculation)` pairs. Rules are tried
//! in order and the first whose condition holds supplies the result. A failing
//! condition or calculation aborts the whole evaluation; later rules are never
//! consulted as a fallback.

use crate::condition::evaluate_condition;
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult, RuleStage};
use crate::formula::parser::parse_formula;
use crate::resolver::VariableResolver;
use formulary_types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// A conditional calculation, kept as source text and parsed when evaluated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub condition: String,
    pub calculation: String,
}

impl Rule {
    pub fn new(condition: impl Into<String>, calculation: impl Into<String>) -> Self {
        Self { condition: condition.into(), calculation: calculation.into() }
    }

    /// A rule whose condition always holds
    pub fn catch_all(calculation: impl Into<String>) -> Self {
        Self::new("true", calculation)
    }
}

/// Outcome of a calculation, recording the rule that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub value: f64,
    /// Source of the calculation that produced `value`
    pub formula: String,
    /// Resolver snapshot taken when the result was produced
    pub variables: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_applied: Option<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CalculationResult {
    pub fn new(value: f64, formula: impl Into<String>, variables: HashMap<String, Value>) -> Self {
        Self { value, formula: formula.into(), variables, rule_applied: None, error: None }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rule_applied = Some(rule);
        self
    }

    /// A result describing a failed calculation, for reporting only.
    ///
    /// `value` is NaN so it cannot be mistaken for a computed amount.
    pub fn failed(
        formula: impl Into<String>,
        variables: HashMap<String, Value>,
        error: &FormulaError,
    ) -> Self {
        Self {
            value: f64::NAN,
            formula: formula.into(),
            variables,
            rule_applied: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Evaluate `rules` in order and return the result of the first match
pub fn evaluate_rules<R>(
    ctx: &EvaluationContext,
    rules: &[Rule],
    resolver: &R,
) -> FormulaResult<CalculationResult>
where
    R: VariableResolver + ?Sized,
{
    for (index, rule) in rules.iter().enumerate() {
        let matched = evaluate_condition(ctx, &rule.condition, resolver)
            .map_err(|err| err.in_rule(index, RuleStage::Condition))?;

        trace!(rule_index = index, matched, "rule condition evaluated");
        if !matched {
            continue;
        }

        let value = parse_formula(&rule.calculation)
            .map_err(FormulaError::from)
            .and_then(|expr| expr.evaluate_number(ctx, resolver).map_err(FormulaError::from))
            .map_err(|err| err.in_rule(index, RuleStage::Calculation))?;

        return Ok(CalculationResult::new(value, &rule.calculation, resolver.get_all_variables())
            .with_rule(rule.clone()));
    }

    Err(FormulaError::NoMatchingRule { rules_checked: rules.len() })
}
