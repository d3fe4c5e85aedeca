//! Subquery expansion through the public translation entry points.

use queryweave::{
    config::TranslatorConfig,
    hql_generator::{generate_hql, MethodRegistry},
    query_engine::{QueryEngine, Value},
    query_planner::{
        logical_expr::{BinaryOperator, ConditionalExpr, Expr, ExprType, MethodSignature},
        query_model::ResultOperator,
        rewriter::{
            errors::RewriterError, rewrite_query_model, RewriteCtx, SubQueryConditionalExpander,
        },
        QueryModel,
    },
    translation::{translate, TranslationErrorKind},
};

use super::invoice_fixtures::*;

fn expanded_branches(model: &QueryModel) -> (QueryModel, QueryModel) {
    let predicate = &model.where_clause.as_ref().unwrap().predicate;
    let Expr::Conditional(cond) = predicate else {
        panic!("expected conditional, got {}", predicate);
    };
    match (cond.if_true().unwrap(), cond.if_false().unwrap()) {
        (Expr::SubQuery(a), Expr::SubQuery(b)) => ((*a.model).clone(), (*b.model).clone()),
        other => panic!("expected two subqueries, got {:?}", other),
    }
}

fn conditional_source_model() -> QueryModel {
    let source = Expr::conditional(paid(), lines("Lines"), lines("DraftLines"));
    count_where(Expr::subquery(any_large_line(source)))
}

#[test]
fn test_branches_differ_only_in_source() {
    let model = conditional_source_model();
    let rewritten = rewrite_query_model(&model, &RewriteCtx::default()).unwrap();
    let (when_paid, otherwise) = expanded_branches(&rewritten);

    let original = any_large_line(lines("Lines"));
    assert_eq!(when_paid, original);
    assert_eq!(otherwise.where_clause, original.where_clause);
    assert_eq!(otherwise.result_operators, original.result_operators);
    assert_eq!(otherwise.select, original.select);
    assert_eq!(
        otherwise.main_from.from_expression,
        Some(lines("DraftLines"))
    );
}

#[test]
fn test_rewrite_twice_equals_rewrite_once() {
    let ctx = RewriteCtx::default();
    let once = rewrite_query_model(&conditional_source_model(), &ctx).unwrap();
    let twice = rewrite_query_model(&once, &ctx).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_mutating_one_clone_leaves_the_other_alone() {
    let model = conditional_source_model();
    let rewritten = rewrite_query_model(&model, &RewriteCtx::default()).unwrap();
    let (mut when_paid, otherwise) = expanded_branches(&rewritten);
    let snapshot = otherwise.clone();

    when_paid.where_clause = None;
    when_paid.result_operators.push(ResultOperator::Count);

    assert_eq!(otherwise, snapshot);
    assert_eq!(expanded_branches(&rewritten).1, snapshot);
    assert_eq!(model, conditional_source_model());
}

#[test]
fn test_in_place_rewrite_is_atomic() {
    // First subquery is fine, second has a conditional source missing a branch
    let valid = Expr::subquery(any_large_line(Expr::conditional(
        paid(),
        lines("Lines"),
        lines("DraftLines"),
    )));
    let malformed = Expr::subquery(any_large_line(Expr::Conditional(ConditionalExpr {
        test: Box::new(paid()),
        if_true: Some(Box::new(lines("Lines"))),
        if_false: None,
    })));
    let mut model = count_where(Expr::binary(BinaryOperator::And, valid, malformed));
    let before = model.clone();

    let err = SubQueryConditionalExpander::new()
        .rewrite_query_model(&mut model, &RewriteCtx::default())
        .unwrap_err();

    assert!(matches!(err, RewriterError::MalformedExpression { .. }));
    assert_eq!(model, before);
}

#[test]
fn test_malformed_expression_kind() {
    let mut model = conditional_source_model();
    model.main_from.from_expression = None;
    let err = translate(
        &model,
        &MethodRegistry::with_defaults(),
        &TranslatorConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), TranslationErrorKind::MalformedExpression);
}

#[test]
fn test_unsupported_signature_kind_names_the_method() {
    let signature = MethodSignature::new("Invoice", "IsOverdue", vec![]);
    let model = count_where(Expr::method_call(
        signature.clone(),
        Some(invoice()),
        vec![],
        ExprType::Bool,
    ));
    let err = translate(
        &model,
        &MethodRegistry::with_defaults(),
        &TranslatorConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), TranslationErrorKind::UnsupportedMethodSignature);
    assert!(err.to_string().contains("Invoice.IsOverdue()"));
}

#[test]
fn test_subquery_depth_limit_from_config() {
    // from e in Invoice where (from l in e.Lines where {from d in e.DraftLines => Any} => Any)
    let inner = any_large_line(lines("DraftLines"));
    let middle = QueryModel::from_source("l", line_type(), lines("Lines"))
        .with_where(Expr::subquery(inner))
        .with_result_operator(ResultOperator::Any);
    let model = count_where(Expr::subquery(middle));

    let config = TranslatorConfig {
        max_subquery_depth: 1,
        ..Default::default()
    };
    let err = translate(&model, &MethodRegistry::with_defaults(), &config).unwrap_err();
    assert_eq!(err.kind(), TranslationErrorKind::Other);

    let config = TranslatorConfig {
        max_subquery_depth: 2,
        ..Default::default()
    };
    assert!(translate(&model, &MethodRegistry::with_defaults(), &config).is_ok());
}

/// `from e in Invoice select (from l in <source> select l.Quantity).Sum()`
fn quantity_sum_per_invoice(source: Expr) -> QueryModel {
    let quantities = QueryModel::from_source("l", line_type(), source)
        .with_select(Expr::member(
            Expr::source("l", line_type()),
            "Quantity",
            ExprType::Int,
        ))
        .with_result_operator(ResultOperator::Sum);
    QueryModel::from_source("e", invoice_type(), Expr::queryable("Invoice"))
        .with_select(Expr::subquery(quantities))
}

/// Run `model` translated and lowered as it is; the two results must agree.
fn expanded_and_direct(model: &QueryModel, engine: &QueryEngine) -> (Value, Value) {
    let registry = MethodRegistry::with_defaults();
    let translated = translate(model, &registry, &TranslatorConfig::default()).unwrap();
    let direct = generate_hql(model, &registry, 64).unwrap();
    (
        engine.execute(&translated.hql).unwrap(),
        engine.execute(&direct).unwrap(),
    )
}

#[test]
fn test_sum_over_conditional_with_parameter_branch() {
    let empty = Expr::parameter("noLines", lines_type());
    let model = quantity_sum_per_invoice(Expr::conditional(paid(), lines("Lines"), empty));

    let rewritten = rewrite_query_model(&model, &RewriteCtx::default()).unwrap();
    let selector = &rewritten.select.as_ref().unwrap().selector;
    let Expr::Conditional(cond) = selector else {
        panic!("expected conditional, got {}", selector);
    };
    assert!(matches!(cond.if_true().unwrap(), Expr::SubQuery(_)));
    assert!(matches!(cond.if_false().unwrap(), Expr::SubQuery(_)));
    assert_eq!(selector.ty(), cond.if_true().unwrap().ty());

    let data = invoices();
    let engine = QueryEngine::new(&data).with_parameter("noLines", Value::List(vec![]));
    let (expanded, direct) = expanded_and_direct(&model, &engine);
    assert_eq!(
        expanded,
        Value::List(vec![Value::Null, Value::Int(1), Value::Null, Value::Int(4)])
    );
    assert_eq!(expanded, direct);
}

#[test]
fn test_sum_over_coalesce_keeps_the_left_collection() {
    let source = Expr::coalesce(lines("PreferredLines"), lines("Lines"));
    let model = quantity_sum_per_invoice(source);

    let data = invoices();
    let engine = QueryEngine::new(&data);
    let (expanded, direct) = expanded_and_direct(&model, &engine);
    assert_eq!(
        expanded,
        Value::List(vec![Value::Null, Value::Int(9), Value::Null, Value::Null])
    );
    assert_eq!(expanded, direct);
}

#[test]
fn test_source_branches_of_different_types_are_malformed() {
    // (from l in (e.Paid ? e.Lines : 5) select l.Quantity).Sum() > 0
    let source = Expr::conditional(paid(), lines("Lines"), Expr::int(5));
    let quantities = QueryModel::from_source("l", line_type(), source)
        .with_select(Expr::member(
            Expr::source("l", line_type()),
            "Quantity",
            ExprType::Int,
        ))
        .with_result_operator(ResultOperator::Sum);
    let model = count_where(Expr::binary(
        BinaryOperator::GreaterThan,
        Expr::subquery(quantities),
        Expr::int(0),
    ));

    let err = translate(
        &model,
        &MethodRegistry::with_defaults(),
        &TranslatorConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), TranslationErrorKind::MalformedExpression);
    assert!(err.to_string().contains("incompatible branch types"));
}
