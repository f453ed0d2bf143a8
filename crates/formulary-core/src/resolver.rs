//! Variable resolver contract and the in-memory implementations
//!
//! The engine only consumes this trait. Real deployments back it with request
//! data or storage; [`MapResolver`] and [`LayeredResolver`] cover tests and
//! simple callers, and [`CheckedResolver`] adds context checks to any of them.

use crate::context::EvaluationContext;
use crate::error::EvalError;
use formulary_types::Value;
use std::collections::HashMap;

/// Source of variable values for one evaluation call.
///
/// Repeated lookups of the same name within one evaluation must return the
/// same value. The engine never retries a failed lookup.
pub trait VariableResolver {
    /// Look up a variable. Missing names should yield
    /// [`EvalError::VariableNotFound`].
    fn get_variable(&self, ctx: &EvaluationContext, name: &str) -> Result<Value, EvalError>;

    fn has_variable(&self, name: &str) -> bool;

    /// Snapshot of every variable this resolver can supply
    fn get_all_variables(&self) -> HashMap<String, Value>;
}

impl<R: VariableResolver + ?Sized> VariableResolver for &R {
    fn get_variable(&self, ctx: &EvaluationContext, name: &str) -> Result<Value, EvalError> {
        (**self).get_variable(ctx, name)
    }

    fn has_variable(&self, name: &str) -> bool {
        (**self).has_variable(name)
    }

    fn get_all_variables(&self) -> HashMap<String, Value> {
        (**self).get_all_variables()
    }
}

impl VariableResolver for HashMap<String, Value> {
    fn get_variable(&self, _ctx: &EvaluationContext, name: &str) -> Result<Value, EvalError> {
        self.get(name).cloned().ok_or_else(|| EvalError::VariableNotFound(name.to_string()))
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn get_all_variables(&self) -> HashMap<String, Value> {
        self.clone()
    }
}

/// In-memory resolver backed by a hash map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapResolver {
    variables: HashMap<String, Value>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a variable, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.variables.insert(name.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl From<HashMap<String, Value>> for MapResolver {
    fn from(variables: HashMap<String, Value>) -> Self {
        Self { variables }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MapResolver {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { variables: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl VariableResolver for MapResolver {
    fn get_variable(&self, ctx: &EvaluationContext, name: &str) -> Result<Value, EvalError> {
        self.variables.get_variable(ctx, name)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    fn get_all_variables(&self) -> HashMap<String, Value> {
        self.variables.clone()
    }
}

/// Looks names up in `primary` first and falls back to `fallback`.
///
/// Typical use: request-scoped values layered over configured defaults.
#[derive(Debug, Clone)]
pub struct LayeredResolver<P, F> {
    primary: P,
    fallback: F,
}

impl<P: VariableResolver, F: VariableResolver> LayeredResolver<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: VariableResolver, F: VariableResolver> VariableResolver for LayeredResolver<P, F> {
    fn get_variable(&self, ctx: &EvaluationContext, name: &str) -> Result<Value, EvalError> {
        // Only a miss falls through; any other primary failure is final.
        match self.primary.get_variable(ctx, name) {
            Err(EvalError::VariableNotFound(_)) => self.fallback.get_variable(ctx, name),
            other => other,
        }
    }

    fn has_variable(&self, name: &str) -> bool {
        self.primary.has_variable(name) || self.fallback.has_variable(name)
    }

    fn get_all_variables(&self) -> HashMap<String, Value> {
        let mut merged = self.fallback.get_all_variables();
        merged.extend(self.primary.get_all_variables());
        merged
    }
}

/// Runs [`EvaluationContext::check`] before every lookup, so a cancelled or
/// expired context stops evaluation at the next variable.
#[derive(Debug, Clone)]
pub struct CheckedResolver<R> {
    inner: R,
}

impl<R: VariableResolver> CheckedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: VariableResolver> VariableResolver for CheckedResolver<R> {
    fn get_variable(&self, ctx: &EvaluationContext, name: &str) -> Result<Value, EvalError> {
        ctx.check()?;
        self.inner.get_variable(ctx, name)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.inner.has_variable(name)
    }

    fn get_all_variables(&self) -> HashMap<String, Value> {
        self.inner.get_all_variables()
    }
}
