//! Error taxonomy for the formula engine
//!
//! Parse failures, evaluation failures and rule failures are kept as separate
//! types so callers can decide which ones are fatal to a request. Nothing in
//! the engine recovers locally or substitutes a default value.

use std::fmt;
use thiserror::Error;

/// A formula or condition could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {position} in '{formula}'")]
pub struct ParseError {
    /// What went wrong
    pub message: String,
    /// The full source text that was being parsed
    pub formula: String,
    /// Character offset (not byte offset) of the offending token
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, formula: &str, position: usize) -> Self {
        Self { message: message.into(), formula: formula.to_string(), position }
    }
}

/// A parsed expression failed while being evaluated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The resolver has no value for this name
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    /// Any other resolver failure, reported verbatim
    #[error("{0}")]
    Resolver(String),

    /// An operand or argument has the wrong type for the operation
    #[error("type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch { operation: String, expected: &'static str, found: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    #[error("sqrt of negative number {0}")]
    NegativeSqrt(f64),

    /// Arithmetic produced infinity or NaN
    #[error("{0} produced a non-finite result")]
    NonFiniteResult(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function}() expects {expected} argument(s), got {found}")]
    ArityMismatch { function: String, expected: String, found: usize },

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// Raised by resolvers that honour the context's cancellation token
    #[error("evaluation cancelled")]
    Cancelled,

    /// Raised by resolvers that honour the context's deadline
    #[error("evaluation deadline exceeded")]
    DeadlineExceeded,
}

impl EvalError {
    pub(crate) fn type_mismatch(
        operation: impl Into<String>,
        expected: &'static str,
        found: impl fmt::Display,
    ) -> Self {
        Self::TypeMismatch { operation: operation.into(), expected, found: found.to_string() }
    }
}

/// Which half of a rule failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStage {
    Condition,
    Calculation,
}

impl fmt::Display for RuleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStage::Condition => write!(f, "condition"),
            RuleStage::Calculation => write!(f, "calculation"),
        }
    }
}

/// Error type returned by the engine facade
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    /// A rule's condition or calculation failed; evaluation stopped there
    #[error("rule {index} {stage} failed: {source}")]
    Rule {
        index: usize,
        stage: RuleStage,
        #[source]
        source: Box<FormulaError>,
    },

    /// Every condition evaluated to false
    #[error("no matching rule ({rules_checked} rule(s) checked)")]
    NoMatchingRule { rules_checked: usize },
}

impl FormulaError {
    /// Short, stable category name for logging
    pub fn category(&self) -> &'static str {
        match self {
            FormulaError::Parse(_) => "parse",
            FormulaError::Evaluation(_) => "evaluation",
            FormulaError::Rule { .. } => "rule",
            FormulaError::NoMatchingRule { .. } => "no_match",
        }
    }

    /// Wrap an error with the index and stage of the rule that produced it
    pub fn in_rule(self, index: usize, stage: RuleStage) -> Self {
        FormulaError::Rule { index, stage, source: Box::new(self) }
    }

    /// The parse error at the root of this error, if any
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            FormulaError::Parse(err) => Some(err),
            FormulaError::Rule { source, .. } => source.as_parse_error(),
            _ => None,
        }
    }

    /// The evaluation error at the root of this error, if any
    pub fn as_eval_error(&self) -> Option<&EvalError> {
        match self {
            FormulaError::Evaluation(err) => Some(err),
            FormulaError::Rule { source, .. } => source.as_eval_error(),
            _ => None,
        }
    }
}

/// Result type alias for facade operations
pub type FormulaResult<T> = Result<T, FormulaError>;
