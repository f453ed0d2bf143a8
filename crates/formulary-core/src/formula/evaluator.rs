//! Expression evaluator
//!
//! Walks a parsed tree against a [`VariableResolver`]. Coercion lives here as
//! three small functions shared with the builtin functions: numbers only ever
//! come from `Value::Number`, booleans from booleans, non-zero numbers or the
//! strings `true`/`false`, and equality falls back to string forms.

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::formula::ast::{BinaryOperator, Expression};
use crate::formula::functions;
use crate::resolver::VariableResolver;
use formulary_types::Value;

impl Expression {
    /// Evaluate this tree.
    ///
    /// Both operands of every binary operator are evaluated before the
    /// operator is applied, `&&` and `||` included, so an error on the right
    /// of `false && x` still surfaces. Ternaries evaluate only the chosen
    /// branch.
    pub fn evaluate<R>(&self, ctx: &EvaluationContext, resolver: &R) -> Result<Value, EvalError>
    where
        R: VariableResolver + ?Sized,
    {
        match self {
            Expression::Literal(value) => finite_input(value.clone(), || "literal".to_string()),

            Expression::Variable(name) => {
                finite_input(resolver.get_variable(ctx, name)?, || format!("variable {name}"))
            }

            Expression::Binary { left, operator, right } => {
                let left_val = left.evaluate(ctx, resolver)?;
                let right_val = right.evaluate(ctx, resolver)?;
                evaluate_binary_op(&left_val, *operator, &right_val)
            }

            Expression::Ternary { condition, then_expr, else_expr } => {
                let condition_val = condition.evaluate(ctx, resolver)?;

                if coerce_boolean(&condition_val, "?:")? {
                    then_expr.evaluate(ctx, resolver)
                } else {
                    else_expr.evaluate(ctx, resolver)
                }
            }

            Expression::FunctionCall { name, args } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(arg.evaluate(ctx, resolver)?);
                }

                functions::builtins().call(name, &arg_values)
            }
        }
    }

    /// Evaluate and coerce the result to a number
    pub fn evaluate_number<R>(&self, ctx: &EvaluationContext, resolver: &R) -> Result<f64, EvalError>
    where
        R: VariableResolver + ?Sized,
    {
        let number = coerce_number(&self.evaluate(ctx, resolver)?, "formula result")?;
        if number.is_finite() {
            Ok(number)
        } else {
            Err(EvalError::NonFiniteResult("formula result".to_string()))
        }
    }

    /// Evaluate and coerce the result to a boolean
    pub fn evaluate_bool<R>(&self, ctx: &EvaluationContext, resolver: &R) -> Result<bool, EvalError>
    where
        R: VariableResolver + ?Sized,
    {
        coerce_boolean(&self.evaluate(ctx, resolver)?, "condition result")
    }
}

/// Numeric coercion: only numbers qualify
pub fn coerce_number(value: &Value, operation: &str) -> Result<f64, EvalError> {
    value
        .as_number()
        .ok_or_else(|| EvalError::type_mismatch(operation, "number", value.type_name()))
}

/// Boolean coercion: booleans, numbers (non-zero is true) and the strings
/// `true`/`false` in any case
pub fn coerce_boolean(value: &Value, operation: &str) -> Result<bool, EvalError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Ok(true)
            } else if s.eq_ignore_ascii_case("false") {
                Ok(false)
            } else {
                Err(EvalError::type_mismatch(operation, "boolean", format!("string \"{}\"", s)))
            }
        }
    }
}

/// Equality: numeric when both sides are numbers, string forms otherwise.
///
/// Numbers compare with a tolerance of one `f64::EPSILON` relative to the
/// larger magnitude, so `0.1 + 0.2 == 0.3` holds while `1e-16 == 0` does not.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()),
        _ => left.to_string() == right.to_string(),
    }
}

/// Numeric coercion for builtin arguments; infinity and NaN are rejected
pub(crate) fn finite_number(value: &Value, operation: &str) -> Result<f64, EvalError> {
    let number = coerce_number(value, operation)?;
    if number.is_finite() {
        Ok(number)
    } else {
        Err(EvalError::NonFiniteResult(operation.to_string()))
    }
}

fn finite_input(value: Value, source: impl FnOnce() -> String) -> Result<Value, EvalError> {
    match value {
        Value::Number(n) if !n.is_finite() => Err(EvalError::NonFiniteResult(source())),
        value => Ok(value),
    }
}

/// Reject infinity and NaN so they never leak into results
pub(crate) fn finite(result: f64, operation: &str) -> Result<Value, EvalError> {
    if result.is_finite() {
        Ok(Value::Number(result))
    } else {
        Err(EvalError::NonFiniteResult(operation.to_string()))
    }
}

/// Evaluate a binary operation on already-evaluated operands
pub fn evaluate_binary_op(
    left: &Value,
    operator: BinaryOperator,
    right: &Value,
) -> Result<Value, EvalError> {
    use BinaryOperator::*;

    let symbol = operator.symbol();
    match operator {
        Add | Subtract | Multiply | Divide | Modulo => {
            let a = coerce_number(left, symbol)?;
            let b = coerce_number(right, symbol)?;
            let result = match operator {
                Add => a + b,
                Subtract => a - b,
                Multiply => a * b,
                Divide if b == 0.0 => return Err(EvalError::DivisionByZero),
                Divide => a / b,
                Modulo if b == 0.0 => return Err(EvalError::ModuloByZero),
                _ => a % b,
            };
            finite(result, symbol)
        }

        Equal => Ok(Value::Boolean(values_equal(left, right))),
        NotEqual => Ok(Value::Boolean(!values_equal(left, right))),

        LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            let a = coerce_number(left, symbol)?;
            let b = coerce_number(right, symbol)?;
            Ok(Value::Boolean(match operator {
                LessThan => a < b,
                LessThanOrEqual => a <= b,
                GreaterThan => a > b,
                _ => a >= b,
            }))
        }

        And => Ok(Value::Boolean(coerce_boolean(left, symbol)? & coerce_boolean(right, symbol)?)),
        Or => Ok(Value::Boolean(coerce_boolean(left, symbol)? | coerce_boolean(right, symbol)?)),
    }
}
