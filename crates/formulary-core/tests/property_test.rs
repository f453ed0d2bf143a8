use formulary_core::{
    BinaryOperator, EvaluationContext, Expression, FormulaEngine, MapResolver, parse_formula,
};
use proptest::prelude::*;

const OPERATORS: [BinaryOperator; 13] = [
    BinaryOperator::Add,
    BinaryOperator::Subtract,
    BinaryOperator::Multiply,
    BinaryOperator::Divide,
    BinaryOperator::Modulo,
    BinaryOperator::Equal,
    BinaryOperator::NotEqual,
    BinaryOperator::LessThan,
    BinaryOperator::LessThanOrEqual,
    BinaryOperator::GreaterThan,
    BinaryOperator::GreaterThanOrEqual,
    BinaryOperator::And,
    BinaryOperator::Or,
];

fn leaf() -> impl Strategy<Value = Expression> {
    prop_oneof![
        (-1000.0f64..1000.0).prop_map(Expression::number),
        (0u32..50).prop_map(|n| Expression::number(f64::from(n))),
        any::<bool>().prop_map(Expression::bool),
        "[a-z \"\\\\']{0,6}".prop_map(Expression::string),
        prop::sample::select(vec!["a", "b", "flag", "tier"]).prop_map(Expression::var),
    ]
}

fn expression() -> impl Strategy<Value = Expression> {
    leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(OPERATORS.to_vec()), inner.clone())
                .prop_map(|(l, op, r)| Expression::binary(l, op, r)),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(c, t, e)| Expression::ternary(c, t, e)),
            (prop::sample::select(vec!["min", "max", "pow"]), inner.clone(), inner.clone())
                .prop_map(|(name, a, b)| Expression::call(name, vec![a, b])),
            (prop::sample::select(vec!["abs", "not", "round"]), inner)
                .prop_map(|(name, a)| Expression::call(name, vec![a])),
        ]
    })
}

fn resolver() -> MapResolver {
    MapResolver::new().with("a", 12.5).with("b", -3).with("flag", true).with("tier", "gold")
}

proptest! {
    #[test]
    fn prop_rendered_expressions_reparse_to_the_same_tree(expr in expression()) {
        let rendered = expr.to_string();
        let reparsed = parse_formula(&rendered).unwrap();
        prop_assert_eq!(&reparsed, &expr, "rendered as {}", rendered);
    }

    #[test]
    fn prop_rendered_expressions_evaluate_identically(expr in expression()) {
        let ctx = EvaluationContext::background();
        let vars = resolver();
        let reparsed = parse_formula(&expr.to_string()).unwrap();
        prop_assert_eq!(expr.evaluate(&ctx, &vars), reparsed.evaluate(&ctx, &vars));
    }

    #[test]
    fn prop_arithmetic_matches_f64(
        a in -1.0e6f64..1.0e6,
        b in -1.0e6f64..1.0e6,
        op in prop::sample::select(vec!["+", "-", "*", "/"]),
    ) {
        let engine = FormulaEngine::new();
        let ctx = EvaluationContext::background();
        let vars = MapResolver::new().with("a", a).with("b", b);
        let result = engine.calculate(&ctx, &format!("a {op} b"), &vars);

        let expected = match op {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            _ if b == 0.0 => {
                prop_assert!(result.is_err());
                return Ok(());
            }
            _ => a / b,
        };
        prop_assert_eq!(result.unwrap(), expected);
    }

    #[test]
    fn prop_variables_are_sorted_and_distinct(expr in expression()) {
        let names = expr.variables();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(names, sorted);
    }
}
