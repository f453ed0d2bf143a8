//! Formula language: tokenizer, parser, tree and evaluator
//!
//! Formulas are parsed into an [`Expression`] once and may then be evaluated
//! any number of times, from any number of threads.
//!
//! ```
//! use formulary_core::formula::parse_formula;
//! use formulary_core::{EvaluationContext, MapResolver};
//!
//! let expr = parse_formula("(basePrice + markup) * quantity").unwrap();
//! let vars = MapResolver::new().with("basePrice", 100).with("markup", 20).with("quantity", 2);
//! let total = expr.evaluate_number(&EvaluationContext::background(), &vars).unwrap();
//! assert_eq!(total, 240.0);
//! ```

pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOperator, Expression};
pub use evaluator::{coerce_boolean, coerce_number, evaluate_binary_op, values_equal};
pub use functions::{FunctionRegistry, FunctionSpec, builtins};
pub use parser::{
    Lexer, MAX_NESTING_DEPTH, MAX_TREE_DEPTH, Parser, Token, parse_condition, parse_formula,
};
