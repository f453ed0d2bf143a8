//! Condition evaluation
//!
//! A condition is a formula whose result is read as a boolean. The literals
//! `true`, `always`, `false`, `never` and the empty string are answered
//! without touching the parser.

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::formula::parser::parse_condition;
use crate::resolver::VariableResolver;

/// Recognise the trivial condition literals (trimmed, case-insensitive)
pub fn trivial_condition(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("always") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text.eq_ignore_ascii_case("never") {
        Some(false)
    } else {
        None
    }
}

/// Parse, evaluate and coerce a condition to a boolean
pub fn evaluate_condition<R>(
    ctx: &EvaluationContext,
    condition: &str,
    resolver: &R,
) -> FormulaResult<bool>
where
    R: VariableResolver + ?Sized,
{
    if let Some(value) = trivial_condition(condition) {
        return Ok(value);
    }

    let expr = parse_condition(condition)?;
    Ok(expr.evaluate_bool(ctx, resolver)?)
}

/// Check that a condition would parse
pub fn validate_condition(condition: &str) -> FormulaResult<()> {
    if trivial_condition(condition).is_some() {
        return Ok(());
    }

    parse_condition(condition)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EvalError, FormulaError};
    use crate::resolver::MapResolver;

    #[test]
    fn trivial_literals_skip_the_parser() {
        let ctx = EvaluationContext::background();
        let empty = MapResolver::new();

        for text in ["", "   ", "true", "TRUE", " always "] {
            assert!(evaluate_condition(&ctx, text, &empty).unwrap(), "{text:?}");
        }
        for text in ["false", "Never", "  FALSE\t"] {
            assert!(!evaluate_condition(&ctx, text, &empty).unwrap(), "{text:?}");
        }
        assert_eq!(trivial_condition("maybe"), None);
    }

    #[test]
    fn conditions_compare_variables() {
        let ctx = EvaluationContext::background();
        let vars = MapResolver::new().with("quantity", 10).with("minQuantity", 5);
        assert!(evaluate_condition(&ctx, "quantity >= minQuantity", &vars).unwrap());

        let vars = MapResolver::new().with("quantity", 5).with("price", 60).with("discount", 25);
        assert!(
            evaluate_condition(&ctx, "(quantity >= 10 && price < 50) || discount > 20", &vars)
                .unwrap()
        );
    }

    #[test]
    fn condition_results_are_coerced_to_boolean() {
        let ctx = EvaluationContext::background();
        let vars = MapResolver::new().with("flag", "false").with("tier", "gold");
        assert!(!evaluate_condition(&ctx, "flag", &vars).unwrap());
        assert!(matches!(
            evaluate_condition(&ctx, "tier", &vars),
            Err(FormulaError::Evaluation(EvalError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn validation_accepts_literals_and_rejects_bad_syntax() {
        assert!(validate_condition("never").is_ok());
        assert!(validate_condition("quantity > 10").is_ok());
        assert!(matches!(validate_condition("quantity >"), Err(FormulaError::Parse(_))));
    }
}
