//! Abstract Syntax Tree for formulas and conditions

use formulary_types::{ExpressionType, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::EvalError;

/// AST node representing a formula or condition.
///
/// Trees are immutable once built and hold no interior state, so one tree can
/// be evaluated many times and from many threads at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value (number, string, boolean)
    Literal(Value),

    /// Variable reference, resolved at evaluation time
    Variable(String),

    /// Binary operation (a + b, a > b, a && b)
    Binary { left: Box<Expression>, operator: BinaryOperator, right: Box<Expression> },

    /// Ternary operation (condition ? then : else)
    Ternary {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
    },

    /// Function call (max(a, b), round(x, 2))
    FunctionCall { name: String, args: Vec<Expression> },
}

/// Binary operators supported by the formula language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "%")]
    Modulo,

    // Equality
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,

    // Relational
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,

    // Logical
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinaryOperator {
    /// Source symbol of this operator
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }

    /// Get the precedence of this operator (higher = tighter binding).
    /// The ternary operator sits below all of these at 0.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Equal | BinaryOperator::NotEqual => 3,
            BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => 4,
            BinaryOperator::Add | BinaryOperator::Subtract => 5,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 6,
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        self.precedence() >= 5
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self.precedence(), 3 | 4)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    /// Result type this operator always produces
    pub fn result_type(&self) -> ExpressionType {
        if self.is_arithmetic() { ExpressionType::Number } else { ExpressionType::Boolean }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for BinaryOperator {
    type Err = EvalError;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        Ok(match symbol {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Subtract,
            "*" => BinaryOperator::Multiply,
            "/" => BinaryOperator::Divide,
            "%" => BinaryOperator::Modulo,
            "==" => BinaryOperator::Equal,
            "!=" => BinaryOperator::NotEqual,
            "<" => BinaryOperator::LessThan,
            "<=" => BinaryOperator::LessThanOrEqual,
            ">" => BinaryOperator::GreaterThan,
            ">=" => BinaryOperator::GreaterThanOrEqual,
            "&&" => BinaryOperator::And,
            "||" => BinaryOperator::Or,
            other => return Err(EvalError::UnknownOperator(other.to_string())),
        })
    }
}

impl Expression {
    /// Create a literal number expression
    pub fn number(value: f64) -> Self {
        Self::Literal(Value::Number(value))
    }

    /// Create a literal string expression
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Value::String(value.into()))
    }

    /// Create a literal boolean expression
    pub fn bool(value: bool) -> Self {
        Self::Literal(Value::Boolean(value))
    }

    /// Create a variable reference
    pub fn var(name: &str) -> Self {
        Self::Variable(name.to_string())
    }

    /// Create a binary operation
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Self::Binary { left: Box::new(left), operator: op, right: Box::new(right) }
    }

    /// Create a ternary expression
    pub fn ternary(condition: Expression, then_expr: Expression, else_expr: Expression) -> Self {
        Self::Ternary {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    /// Create a function call
    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Self::FunctionCall { name: name.to_string(), args }
    }

    /// Result type this expression is expected to produce.
    ///
    /// Informational only; evaluation may still fail or, for variables,
    /// produce any type.
    pub fn expected_type(&self) -> ExpressionType {
        match self {
            Expression::Literal(value) => value.value_type(),
            Expression::Variable(_) => ExpressionType::Unknown,
            Expression::Binary { operator, .. } => operator.result_type(),
            Expression::Ternary { then_expr, else_expr, .. } => {
                branch_type(then_expr.expected_type(), else_expr.expected_type())
            }
            Expression::FunctionCall { name, args } => match name.to_ascii_lowercase().as_str() {
                "if" if args.len() == 3 => {
                    branch_type(args[1].expected_type(), args[2].expected_type())
                }
                "if" => ExpressionType::Unknown,
                "not" => ExpressionType::Boolean,
                _ => ExpressionType::Number,
            },
        }
    }

    /// Distinct variable names referenced anywhere in the tree, sorted
    pub fn variables(&self) -> Vec<String> {
        let mut variables = BTreeSet::new();
        self.collect_variables(&mut variables);
        variables.into_iter().collect()
    }

    fn collect_variables(&self, variables: &mut BTreeSet<String>) {
        match self {
            Expression::Variable(name) => {
                variables.insert(name.clone());
            }
            Expression::Binary { left, right, .. } => {
                left.collect_variables(variables);
                right.collect_variables(variables);
            }
            Expression::Ternary { condition, then_expr, else_expr } => {
                condition.collect_variables(variables);
                then_expr.collect_variables(variables);
                else_expr.collect_variables(variables);
            }
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_variables(variables);
                }
            }
            Expression::Literal(_) => {}
        }
    }
}

fn branch_type(then_type: ExpressionType, else_type: ExpressionType) -> ExpressionType {
    if then_type == else_type { then_type } else { ExpressionType::Unknown }
}

/// Renders canonical source text: binary and ternary nodes are fully
/// parenthesized and strings are double-quoted, so the output parses back to
/// an equal tree.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(s)) => {
                f.write_str("\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("\"")
            }
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Variable(name) => f.write_str(name),
            Expression::Binary { left, operator, right } => {
                write!(f, "({left} {operator} {right})")
            }
            Expression::Ternary { condition, then_expr, else_expr } => {
                write!(f, "({condition} ? {then_expr} : {else_expr})")
            }
            Expression::FunctionCall { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
