//! Unit tests for method registry resolution and overrides

use queryweave::{
    hql_generator::{
        default_registry,
        method_generators::{enumerable_any, enumerable_count, equals_signature, string_method},
        HqlGeneratorVisitor, HqlNode, MethodHandler, MethodRegistry, ToHql,
    },
    query_planner::logical_expr::{Expr, ExprType, Literal, MethodSignature},
};
use test_case::test_case;

fn customer_name() -> Expr {
    Expr::member(
        Expr::source("c", ExprType::entity("Customer")),
        "Name",
        ExprType::String,
    )
}

fn lower(registry: &MethodRegistry, expr: &Expr) -> HqlNode {
    HqlGeneratorVisitor::new(registry, 8)
        .lower(expr)
        .expect("expression lowers")
}

#[test]
fn test_override_replaces_only_that_signature() {
    let mut registry = MethodRegistry::with_defaults();
    registry.register(
        equals_signature(ExprType::Object),
        MethodHandler::custom("AlwaysTrue", |_, b| Ok(b.constant(Literal::Boolean(true)))),
    );

    assert_eq!(
        registry
            .lookup(&equals_signature(ExprType::Object))
            .unwrap()
            .name(),
        "AlwaysTrue"
    );
    // Other Equals signatures keep the default handler
    assert_eq!(
        registry
            .lookup(&equals_signature(ExprType::String))
            .unwrap()
            .name(),
        "Equals"
    );
    assert_eq!(
        registry.lookup(&enumerable_any()).unwrap().name(),
        "CollectionAny"
    );
    // The shared defaults are untouched
    assert_eq!(
        default_registry()
            .lookup(&equals_signature(ExprType::Object))
            .unwrap()
            .name(),
        "Equals"
    );
}

#[test]
fn test_one_handler_many_signatures() {
    let registry = default_registry();
    let handler = registry.lookup(&equals_signature(ExprType::Decimal)).unwrap();
    for signature in handler.supported_methods() {
        assert_eq!(registry.lookup(signature).unwrap().name(), "Equals");
    }
}

#[test]
fn test_signature_key_is_structural() {
    let registry = default_registry();
    let rebuilt = MethodSignature::new("Int32", "Equals", vec![ExprType::Int]);
    assert!(registry.contains(&rebuilt));
    let other_overload = MethodSignature::new("Int32", "Equals", vec![ExprType::String]);
    assert!(!registry.contains(&other_overload));
}

#[test_case("ToUpper", "upper(c.Name)" ; "upper")]
#[test_case("ToLower", "lower(c.Name)" ; "lower")]
#[test_case("Trim", "trim(c.Name)" ; "trim")]
#[test_case("get_Length", "length(c.Name)" ; "length")]
fn test_string_functions(method: &str, expected: &str) {
    let call = Expr::method_call(
        MethodSignature::new("String", method, vec![]),
        Some(customer_name()),
        vec![],
        ExprType::String,
    );
    assert_eq!(lower(&default_registry(), &call).to_hql(), expected);
}

#[test_case("StartsWith", "c.Name like concat('Jo', '%') escape '\\'" ; "starts with")]
#[test_case("EndsWith", "c.Name like concat('%', 'Jo') escape '\\'" ; "ends with")]
#[test_case("Contains", "c.Name like concat('%', 'Jo', '%') escape '\\'" ; "contains")]
fn test_string_patterns(method: &str, expected: &str) {
    let call = Expr::method_call(
        string_method(method),
        Some(customer_name()),
        vec![Expr::constant(Literal::String("Jo".to_string()))],
        ExprType::Bool,
    );
    assert_eq!(lower(&default_registry(), &call).to_hql(), expected);
}

#[test]
fn test_collection_count_over_cast_conditional_is_not_expanded() {
    let orders = ExprType::collection_of(ExprType::entity("Order"));
    let customer = Expr::source("c", ExprType::entity("Customer"));
    // Cast hides the conditional from argument expansion
    let cond = Expr::convert(
        Expr::conditional(
            Expr::member(customer.clone(), "IsVip", ExprType::Bool),
            Expr::member(customer.clone(), "Orders", orders.clone()),
            Expr::member(customer, "ArchivedOrders", orders.clone()),
        ),
        orders,
    );
    let call = Expr::method_call(enumerable_count(), None, vec![cond], ExprType::Int);
    let node = lower(&default_registry(), &call);
    assert!(matches!(node, HqlNode::Function { ref name, .. } if name == "size"));
    assert!(!matches!(node, HqlNode::Case { .. }));
}

#[test]
fn test_lookup_after_registering_in_child_of_custom_parent() {
    let mut parent = MethodRegistry::new();
    parent.merge(
        MethodHandler::custom("Discount", |call, b| {
            let operands = call.expect_operands(1)?;
            Ok(b.function("discount", vec![operands[0].clone()]))
        })
        .supporting(MethodSignature::new("Pricing", "Discount", vec![ExprType::Decimal])),
    );
    let child = MethodRegistry::child_of(std::sync::Arc::new(parent));
    let signature = MethodSignature::new("Pricing", "Discount", vec![ExprType::Decimal]);
    assert_eq!(child.lookup(&signature).unwrap().name(), "Discount");
    assert!(child.lookup(&enumerable_any()).is_none());
}
