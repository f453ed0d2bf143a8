use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use formulary_core::{
    CancellationToken, EvalError, EvaluationContext, FormulaEngine, FormulaError, LayeredResolver,
    MapResolver, Rule, RuleStage, Value, VariableResolver, parse_formula,
};

fn calculate(formula: &str, vars: &MapResolver) -> Result<f64, FormulaError> {
    FormulaEngine::new().calculate(&EvaluationContext::background(), formula, vars)
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

/// Resolver that fails when the context says the caller has given up
struct ContextAwareResolver {
    inner: MapResolver,
    lookups: AtomicUsize,
}

impl ContextAwareResolver {
    fn new(inner: MapResolver) -> Self {
        Self { inner, lookups: AtomicUsize::new(0) }
    }
}

impl VariableResolver for ContextAwareResolver {
    fn get_variable(&self, ctx: &EvaluationContext, name: &str) -> Result<Value, EvalError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
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

/// Resolver whose backing store is unavailable
struct OfflineResolver;

impl VariableResolver for OfflineResolver {
    fn get_variable(&self, _ctx: &EvaluationContext, _name: &str) -> Result<Value, EvalError> {
        Err(EvalError::Resolver("pricing table offline".to_string()))
    }

    fn has_variable(&self, _name: &str) -> bool {
        false
    }

    fn get_all_variables(&self) -> HashMap<String, Value> {
        HashMap::new()
    }
}

#[test]
fn pricing_formulas_with_variables() {
    let vars = MapResolver::new().with("price", 10.5).with("quantity", 3);
    assert_close(calculate("price * quantity", &vars).unwrap(), 31.5);

    let vars = MapResolver::new()
        .with("basePrice", 100)
        .with("markup", 20)
        .with("quantity", 2)
        .with("discount", 10);
    assert_close(
        calculate("(basePrice + markup) * quantity * (1 - discount / 100)", &vars).unwrap(),
        216.0,
    );
}

#[test]
fn builtin_functions_compose() {
    let vars = MapResolver::new().with("price", 60);
    assert_eq!(calculate("min(100, price * 2)", &vars).unwrap(), 100.0);
    assert_eq!(calculate("max(10, 20, 15)", &vars).unwrap(), 20.0);
    assert_close(calculate("round(10.567, 2)", &vars).unwrap(), 10.57);
    assert_eq!(calculate("max(10, min(20, 15))", &vars).unwrap(), 15.0);
    assert_eq!(calculate("ROUND(price / 7)", &vars).unwrap(), 9.0);
}

#[test]
fn arithmetic_errors_are_never_numbers() {
    let vars = MapResolver::new();
    assert!(matches!(
        calculate("10 / 0", &vars),
        Err(FormulaError::Evaluation(EvalError::DivisionByZero))
    ));
    assert!(matches!(
        calculate("10 % 0", &vars),
        Err(FormulaError::Evaluation(EvalError::ModuloByZero))
    ));
    assert!(matches!(
        calculate("pow(10, 400)", &vars),
        Err(FormulaError::Evaluation(EvalError::NonFiniteResult(_)))
    ));
}

#[test]
fn non_finite_values_never_reach_the_caller() {
    let huge = format!("1{}", "0".repeat(400));
    assert!(matches!(calculate(&huge, &MapResolver::new()), Err(FormulaError::Parse(_))));
    assert!(FormulaEngine::new().validate_formula(&huge).is_err());

    let vars = MapResolver::new().with("price", f64::NAN).with("inf", f64::INFINITY);
    for formula in ["price", "max(price, 1)", "abs(inf)", "floor(inf)", "inf > 1 ? 1 : 0"] {
        assert!(
            matches!(
                calculate(formula, &vars),
                Err(FormulaError::Evaluation(EvalError::NonFiniteResult(_)))
            ),
            "{formula} should fail"
        );
    }

    let ctx = EvaluationContext::background();
    let matched = FormulaEngine::new().evaluate_condition(&ctx, "price == price", &vars);
    assert!(matches!(matched, Err(FormulaError::Evaluation(EvalError::NonFiniteResult(_)))));
}

#[test]
fn missing_variables_are_reported_by_name() {
    let vars = MapResolver::new().with("price", 10);
    let err = calculate("price * quantity", &vars).unwrap_err();
    assert_eq!(err, FormulaError::Evaluation(EvalError::VariableNotFound("quantity".to_string())));
    assert_eq!(err.to_string(), "evaluation error: variable not found: quantity");
}

#[test]
fn ternaries_select_one_branch() {
    let vars = MapResolver::new().with("quantity", 15);
    assert_eq!(calculate("quantity > 10 ? 100 : 50", &vars).unwrap(), 100.0);

    let vars = MapResolver::new().with("quantity", 60).with("price", 100);
    assert_close(
        calculate("quantity>100?price*0.7:quantity>50?price*0.8:price*0.9", &vars).unwrap(),
        80.0,
    );

    assert_eq!(calculate("true ? 1 : missing", &MapResolver::new()).unwrap(), 1.0);
}

#[test]
fn logical_operators_and_if_are_eager() {
    let engine = FormulaEngine::new();
    let ctx = EvaluationContext::background();
    let vars = MapResolver::new();

    let err = engine.evaluate_condition(&ctx, "false && missing", &vars).unwrap_err();
    assert_eq!(err.as_eval_error(), Some(&EvalError::VariableNotFound("missing".to_string())));

    let err = engine.evaluate_condition(&ctx, "true || missing", &vars).unwrap_err();
    assert_eq!(err.as_eval_error(), Some(&EvalError::VariableNotFound("missing".to_string())));

    let err = calculate("if(true, 1, missing)", &vars).unwrap_err();
    assert_eq!(err.as_eval_error(), Some(&EvalError::VariableNotFound("missing".to_string())));
}

#[test]
fn trivial_conditions_do_not_consult_the_resolver() {
    let engine = FormulaEngine::new();
    let ctx = EvaluationContext::background();
    let resolver = ContextAwareResolver::new(MapResolver::new());

    for condition in ["true", "always", ""] {
        assert!(engine.evaluate_condition(&ctx, condition, &resolver).unwrap());
    }
    for condition in ["false", "never"] {
        assert!(!engine.evaluate_condition(&ctx, condition, &resolver).unwrap());
    }
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
}

#[test]
fn tiered_pricing_rules() {
    let engine = FormulaEngine::new();
    let ctx = EvaluationContext::background();
    let rules = vec![
        Rule::new("quantity >= 100", "basePrice * quantity * 0.8"),
        Rule::new("quantity >= 50", "basePrice * quantity * 0.9"),
        Rule::new("true", "basePrice * quantity"),
    ];

    let vars = MapResolver::new().with("basePrice", 10).with("quantity", 100);
    let result = engine.evaluate_rules(&ctx, &rules, &vars).unwrap();
    assert_close(result.value, 800.0);
    assert_eq!(result.rule_applied.as_ref(), Some(&rules[0]));

    let vars = MapResolver::new().with("basePrice", 10).with("quantity", 5);
    let result = engine.evaluate_rules(&ctx, &rules, &vars).unwrap();
    assert_eq!(result.value, 50.0);
    assert_eq!(result.rule_applied.as_ref(), Some(&rules[2]));
    assert_eq!(result.variables.get("quantity"), Some(&Value::Number(5.0)));
}

#[test]
fn rule_failures_stop_evaluation() {
    let engine = FormulaEngine::new();
    let ctx = EvaluationContext::background();
    let vars = MapResolver::new().with("quantity", 5);
    let rules = vec![Rule::new("quantity > price", "1"), Rule::new("true", "2")];

    let err = engine.evaluate_rules(&ctx, &rules, &vars).unwrap_err();
    assert!(matches!(err, FormulaError::Rule { index: 0, stage: RuleStage::Condition, .. }));
    assert_eq!(err.to_string(), "rule 0 condition failed: evaluation error: variable not found: price");
}

#[test]
fn repeated_evaluation_is_idempotent() {
    let engine = FormulaEngine::new();
    let ctx = EvaluationContext::background();
    let vars = MapResolver::new().with("price", 19.99).with("quantity", 7);
    let formula = "round(price * quantity * 1.2, 2)";

    let first = engine.calculate(&ctx, formula, &vars).unwrap();
    for _ in 0..100 {
        assert_eq!(engine.calculate(&ctx, formula, &vars).unwrap(), first);
    }
}

#[test]
fn validation_matches_calculation_parse_failures() {
    let engine = FormulaEngine::new();
    assert!(engine.validate_formula("2 + (3 * 4").is_err());
    assert!(engine.validate_formula("").is_err());
    assert!(engine.validate_formula("price * quantity").is_ok());

    let err = calculate("2 + (3 * 4", &MapResolver::new()).unwrap_err();
    let parse = err.as_parse_error().unwrap();
    assert_eq!(parse.formula, "2 + (3 * 4");
    assert_eq!(parse.position, 10);
}

#[test]
fn resolver_errors_surface_verbatim() {
    let engine = FormulaEngine::new();
    let ctx = EvaluationContext::background();

    let err = engine.calculate(&ctx, "price + 1", &OfflineResolver).unwrap_err();
    assert_eq!(err, FormulaError::Evaluation(EvalError::Resolver("pricing table offline".to_string())));
}

#[test]
fn cancellation_reaches_the_resolver() {
    let engine = FormulaEngine::new();
    let token = CancellationToken::new();
    let ctx = EvaluationContext::background().with_cancellation(token.clone());
    let resolver = ContextAwareResolver::new(MapResolver::new().with("price", 10));

    assert_eq!(engine.calculate(&ctx, "price * 2", &resolver).unwrap(), 20.0);

    token.cancel();
    let err = engine.calculate(&ctx, "price * 2", &resolver).unwrap_err();
    assert_eq!(err, FormulaError::Evaluation(EvalError::Cancelled));

    // Literal-only formulas never reach the resolver
    assert_eq!(engine.calculate(&ctx, "2 * 2", &resolver).unwrap(), 4.0);
}

#[test]
fn layered_defaults_fill_missing_variables() {
    let engine = FormulaEngine::new();
    let ctx = EvaluationContext::background();
    let defaults = MapResolver::new().with("taxRate", 0.2);
    let request = MapResolver::new().with("price", 50);
    let resolver = LayeredResolver::new(&request, &defaults);

    assert_close(engine.calculate(&ctx, "price * (1 + taxRate)", &resolver).unwrap(), 60.0);
}

#[test]
fn parsed_trees_are_shared_across_threads() {
    let expr = Arc::new(parse_formula("basePrice * quantity - discount").unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let expr = Arc::clone(&expr);
            thread::spawn(move || {
                let vars = MapResolver::new()
                    .with("basePrice", 10)
                    .with("quantity", i)
                    .with("discount", 1);
                expr.evaluate_number(&EvaluationContext::background(), &vars).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), 10.0 * i as f64 - 1.0);
    }
}
