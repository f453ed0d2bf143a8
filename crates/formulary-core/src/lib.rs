#![deny(warnings)]
#![allow(missing_docs)]
//! Core functionality for the Formulary formula engine.
//!
//! This crate parses and evaluates small arithmetic and logical formulas over
//! named variables, evaluates boolean conditions and picks the first matching
//! rule from an ordered rule set. Variables come from a caller-supplied
//! [`VariableResolver`]; the engine itself is stateless and performs no I/O.
//!
//! ```
//! use formulary_core::{EvaluationContext, FormulaEngine, MapResolver};
//!
//! let engine = FormulaEngine::new();
//! let vars = MapResolver::new().with("price", 10.5).with("quantity", 3);
//! let total = engine
//!     .calculate(&EvaluationContext::background(), "price * quantity", &vars)
//!     .unwrap();
//! assert_eq!(total, 31.5);
//! ```

/// Trivial-literal shortcut and boolean condition evaluation
pub mod condition;
/// Cancellation and deadline information passed to resolvers
pub mod context;
/// Stateless engine facade
pub mod engine;
/// Error taxonomy shared by every layer
pub mod error;
/// Tokenizer, parser, expression tree, evaluator and builtin functions
pub mod formula;
/// Variable resolver contract and in-memory implementations
pub mod resolver;
/// Ordered first-match rule evaluation
pub mod rules;

pub use context::{CancellationToken, EvaluationContext};
pub use engine::FormulaEngine;
pub use error::{EvalError, FormulaError, FormulaResult, ParseError, RuleStage};
pub use formula::{BinaryOperator, Expression, parse_condition, parse_formula};
pub use resolver::{CheckedResolver, LayeredResolver, MapResolver, VariableResolver};
pub use rules::{CalculationResult, Rule};

pub use formulary_types::{ExpressionType, Value};
