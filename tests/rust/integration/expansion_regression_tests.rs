//! End-to-end count queries over four invoices.
//!
//! Every invoice has Amount 10. SpecialAmount is 100/100/110/110 and Paid is
//! false/true/false/true. Scalar conditionals and coalesces in filters must
//! reach the database as `case`/`coalesce` expressions, never as expanded
//! subqueries.

use queryweave::{
    config::TranslatorConfig,
    hql_generator::{generate_hql, ToHql},
    query_engine::{execute, Value},
    query_planner::{
        logical_expr::{visitors::SubQueryCounter, BinaryOperator, Expr},
        QueryModel,
    },
    translation::translate,
};

use super::invoice_fixtures::*;

fn count(model: &QueryModel) -> (QueryModel, String, Value) {
    let registry = registry_with_object_equality();
    let translated = translate(model, &registry, &TranslatorConfig::default())
        .expect("query translates");
    let result = execute(&translated.hql, &invoices()).expect("query executes");
    let text = translated.hql_text();
    (translated.model, text, result)
}

#[test]
fn test_equals_on_arithmetic_sum() {
    let model = count_where(object_equals(
        Expr::binary(BinaryOperator::Add, amount(), special_amount()),
        110,
    ));

    let (rewritten, hql, result) = count(&model);

    assert_eq!(rewritten, model, "no expansion expected");
    assert_eq!(
        hql,
        "select count(e) from Invoice e where ((e.Amount + e.SpecialAmount) = 110)"
    );
    assert_eq!(result, Value::Int(2));
}

#[test]
fn test_equals_on_scalar_conditional() {
    let model = count_where(object_equals(
        Expr::conditional(paid(), amount(), special_amount()),
        10,
    ));

    let (rewritten, hql, result) = count(&model);

    assert_eq!(rewritten, model, "no expansion expected");
    assert_eq!(
        hql,
        "select count(e) from Invoice e where \
         (case when e.Paid then e.Amount else e.SpecialAmount end = 10)"
    );
    assert_eq!(result, Value::Int(2));
}

#[test]
fn test_equals_on_scalar_coalesce() {
    let model = count_where(object_equals(
        Expr::coalesce(special_amount(), amount()),
        100,
    ));

    let (rewritten, hql, result) = count(&model);

    assert_eq!(rewritten, model, "no expansion expected");
    assert_eq!(
        hql,
        "select count(e) from Invoice e where (coalesce(e.SpecialAmount, e.Amount) = 100)"
    );
    assert_eq!(result, Value::Int(2));
}

#[test]
fn test_default_equals_handler_gives_same_counts() {
    let registry = queryweave::hql_generator::MethodRegistry::with_defaults();
    let model = count_where(object_equals(
        Expr::conditional(paid(), amount(), special_amount()),
        10,
    ));
    let translated = translate(&model, &registry, &TranslatorConfig::default()).unwrap();
    assert_eq!(
        execute(&translated.hql, &invoices()).unwrap(),
        Value::Int(2)
    );
}

#[test]
fn test_expanded_conditional_source_keeps_result() {
    let source = Expr::conditional(paid(), lines("Lines"), lines("DraftLines"));
    let model = count_where(Expr::subquery(any_large_line(source)));

    let (rewritten, hql, result) = count(&model);

    let predicate = &rewritten.where_clause.as_ref().unwrap().predicate;
    assert!(matches!(predicate, Expr::Conditional(_)));
    assert_eq!(SubQueryCounter::count(predicate), 2);
    assert!(hql.contains("case when e.Paid then exists (select l from e.Lines l where"));
    assert_eq!(result, Value::Int(2));

    // Lowering the unexpanded model evaluates to the same count
    let registry = registry_with_object_equality();
    let direct = generate_hql(&model, &registry, 64).unwrap();
    assert_eq!(execute(&direct, &invoices()).unwrap(), Value::Int(2));
    assert_ne!(direct.to_hql(), hql);
}

#[test]
fn test_expanded_coalesce_source_keeps_result() {
    // Mapped collections are empty rather than null, so the left branch wins
    let source = Expr::coalesce(lines("PreferredLines"), lines("Lines"));
    let model = count_where(Expr::subquery(any_large_line(source)));

    let (rewritten, hql, result) = count(&model);

    let predicate = &rewritten.where_clause.as_ref().unwrap().predicate;
    assert!(matches!(predicate, Expr::Conditional(_)));
    assert_eq!(SubQueryCounter::count(predicate), 2);
    assert!(hql.contains(
        "case when e.PreferredLines is not null then exists (select l from e.PreferredLines l"
    ));
    assert_eq!(result, Value::Int(1));

    let registry = registry_with_object_equality();
    let direct = generate_hql(&model, &registry, 64).unwrap();
    assert_eq!(execute(&direct, &invoices()).unwrap(), Value::Int(1));
}
