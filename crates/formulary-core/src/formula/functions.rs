//! Built-in functions callable from formulas
//!
//! The registry maps a lower-cased name to a [`FunctionSpec`]. Arity is
//! checked once, centrally, in [`FunctionRegistry::call`]; implementations can
//! index their arguments without re-checking the count.

use crate::error::EvalError;
use crate::formula::evaluator::{coerce_boolean, finite, finite_number};
use formulary_types::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Signature shared by every builtin
pub type FunctionImpl = fn(&[Value]) -> Result<Value, EvalError>;

/// One registered function
#[derive(Debug, Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub min_arity: usize,
    /// `None` means variadic
    pub max_arity: Option<usize>,
    pub description: &'static str,
    pub implementation: FunctionImpl,
}

impl FunctionSpec {
    /// Human readable arity, as used in error messages
    pub fn arity_text(&self) -> String {
        match self.max_arity {
            None => format!("at least {}", self.min_arity),
            Some(max) if max == self.min_arity => max.to_string(),
            Some(max) => format!("{} to {}", self.min_arity, max),
        }
    }

    fn accepts(&self, count: usize) -> bool {
        count >= self.min_arity && self.max_arity.is_none_or(|max| count <= max)
    }
}

/// Registry for formula functions
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionSpec>,
}

static BUILTINS: LazyLock<FunctionRegistry> = LazyLock::new(FunctionRegistry::with_builtins);

/// The immutable registry the evaluator dispatches through
pub fn builtins() -> &'static FunctionRegistry {
    &BUILTINS
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every builtin
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        // Mathematical functions
        registry.register("min", 2, None, "Smallest of the arguments", min);
        registry.register("max", 2, None, "Largest of the arguments", max);
        registry.register("abs", 1, Some(1), "Absolute value", abs);
        registry.register(
            "round",
            1,
            Some(2),
            "Round half away from zero to an optional number of decimals",
            round,
        );
        registry.register("floor", 1, Some(1), "Round down", floor);
        registry.register("ceil", 1, Some(1), "Round up", ceil);
        registry.register("pow", 2, Some(2), "Base raised to an exponent", pow);
        registry.register("sqrt", 1, Some(1), "Square root of a non-negative number", sqrt);

        // Logical functions
        registry.register("if", 3, Some(3), "if(condition, then, else); every argument is evaluated", if_fn);
        registry.register("not", 1, Some(1), "Boolean negation", not);

        registry
    }

    /// Register a function under a lower-case name, replacing any previous one
    pub fn register(
        &mut self,
        name: &'static str,
        min_arity: usize,
        max_arity: Option<usize>,
        description: &'static str,
        implementation: FunctionImpl,
    ) {
        debug_assert!(max_arity.is_none_or(|max| min_arity <= max), "bad arity for {name}");
        debug_assert_eq!(name, name.to_ascii_lowercase(), "function names are lower-case");

        self.functions
            .insert(name, FunctionSpec { name, min_arity, max_arity, description, implementation });
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name.to_ascii_lowercase().as_str())
    }

    /// Check arity and dispatch
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let spec = self.get(name).ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;

        if !spec.accepts(args.len()) {
            return Err(EvalError::ArityMismatch {
                function: spec.name.to_string(),
                expected: spec.arity_text(),
                found: args.len(),
            });
        }

        (spec.implementation)(args)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn numbers(args: &[Value], function: &str) -> Result<Vec<f64>, EvalError> {
    let operation = format!("{function}()");
    args.iter().map(|arg| finite_number(arg, &operation)).collect()
}

fn min(args: &[Value]) -> Result<Value, EvalError> {
    let values = numbers(args, "min")?;
    finite(values.into_iter().fold(f64::INFINITY, f64::min), "min()")
}

fn max(args: &[Value]) -> Result<Value, EvalError> {
    let values = numbers(args, "max")?;
    finite(values.into_iter().fold(f64::NEG_INFINITY, f64::max), "max()")
}

fn abs(args: &[Value]) -> Result<Value, EvalError> {
    finite(finite_number(&args[0], "abs()")?.abs(), "abs()")
}

fn round(args: &[Value]) -> Result<Value, EvalError> {
    let value = finite_number(&args[0], "round()")?;
    let decimals = match args.get(1) {
        Some(arg) => finite_number(arg, "round()")?,
        None => 0.0,
    };

    if decimals == 0.0 {
        // f64::round already rounds half away from zero
        return Ok(Value::Number(value.round()));
    }

    let factor = 10f64.powf(decimals.trunc());
    if factor == 0.0 {
        // Rounding to a place above any finite magnitude
        return Ok(Value::Number(0.0));
    }
    let scaled = value * factor;
    if !scaled.is_finite() {
        // Precision beyond what f64 can represent leaves the value unchanged
        return finite(value, "round()");
    }
    finite(scaled.round() / factor, "round()")
}

fn floor(args: &[Value]) -> Result<Value, EvalError> {
    finite(finite_number(&args[0], "floor()")?.floor(), "floor()")
}

fn ceil(args: &[Value]) -> Result<Value, EvalError> {
    finite(finite_number(&args[0], "ceil()")?.ceil(), "ceil()")
}

fn pow(args: &[Value]) -> Result<Value, EvalError> {
    let base = finite_number(&args[0], "pow()")?;
    let exponent = finite_number(&args[1], "pow()")?;
    finite(base.powf(exponent), "pow()")
}

fn sqrt(args: &[Value]) -> Result<Value, EvalError> {
    let value = finite_number(&args[0], "sqrt()")?;
    if value < 0.0 {
        return Err(EvalError::NegativeSqrt(value));
    }
    finite(value.sqrt(), "sqrt()")
}

fn if_fn(args: &[Value]) -> Result<Value, EvalError> {
    if coerce_boolean(&args[0], "if()")? { Ok(args[1].clone()) } else { Ok(args[2].clone()) }
}

fn not(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Boolean(!coerce_boolean(&args[0], "!")?))
}
