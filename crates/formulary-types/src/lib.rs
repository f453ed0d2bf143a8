//! Formulary Types
//!
//! This crate defines the value model used throughout the Formulary workspace
//! (currently `formulary-core` and `formulary-cli`). Keeping `Value` and
//! `ExpressionType` here lets resolver implementations depend on the data
//! types without pulling in the parser and evaluator.

#![deny(warnings)]
#![deny(missing_docs)]

mod types;
pub use types::{ExpressionType, Value};
