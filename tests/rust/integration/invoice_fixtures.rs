//! Shared invoice model and data set for the integration tests.

use queryweave::{
    hql_generator::{method_generators::equals_signature, MethodHandler, MethodRegistry},
    query_engine::DataSet,
    query_planner::{
        logical_expr::{Expr, ExprType},
        query_model::ResultOperator,
        QueryModel,
    },
};
use serde_json::json;

pub fn invoice_type() -> ExprType {
    ExprType::entity("Invoice")
}

pub fn line_type() -> ExprType {
    ExprType::entity("Line")
}

pub fn lines_type() -> ExprType {
    ExprType::collection_of(line_type())
}

pub fn invoice() -> Expr {
    Expr::source("e", invoice_type())
}

pub fn amount() -> Expr {
    Expr::member(invoice(), "Amount", ExprType::Int)
}

pub fn special_amount() -> Expr {
    Expr::member(
        invoice(),
        "SpecialAmount",
        ExprType::nullable(ExprType::Int),
    )
}

pub fn paid() -> Expr {
    Expr::member(invoice(), "Paid", ExprType::Bool)
}

pub fn lines(member: &str) -> Expr {
    Expr::member(invoice(), member, lines_type())
}

/// `((object)operand).Equals((object)value)`
pub fn object_equals(operand: Expr, value: i64) -> Expr {
    Expr::method_call(
        equals_signature(ExprType::Object),
        Some(Expr::convert(operand, ExprType::Object)),
        vec![Expr::convert(Expr::int(value), ExprType::Object)],
        ExprType::Bool,
    )
}

/// `session.Query<Invoice>().Where(predicate).Count()`
pub fn count_where(predicate: Expr) -> QueryModel {
    QueryModel::from_source("e", invoice_type(), Expr::queryable("Invoice"))
        .with_where(predicate)
        .with_result_operator(ResultOperator::Count)
}

/// `from l in <source> where l.Quantity > 1 select l => Any()`
pub fn any_large_line(source: Expr) -> QueryModel {
    use queryweave::query_planner::logical_expr::BinaryOperator;

    QueryModel::from_source("l", line_type(), source)
        .with_where(Expr::binary(
            BinaryOperator::GreaterThan,
            Expr::member(Expr::source("l", line_type()), "Quantity", ExprType::Int),
            Expr::int(1),
        ))
        .with_result_operator(ResultOperator::Any)
}

/// The defaults plus a user-registered handler for `Object.Equals(Object)`.
pub fn registry_with_object_equality() -> MethodRegistry {
    let mut registry = MethodRegistry::with_defaults();
    registry.merge(
        MethodHandler::custom("ObjectEquality", |call, b| {
            let operands = call.expect_operands(2)?;
            Ok(b.equality(operands[0].clone(), operands[1].clone()))
        })
        .supporting(equals_signature(ExprType::Object)),
    );
    registry
}

pub fn invoices() -> DataSet {
    DataSet::from_json_str(
        &json!({
            "Invoice": [
                {
                    "Amount": 10, "SpecialAmount": 100, "Paid": false,
                    "Lines": [{"Quantity": 5}], "DraftLines": [], "PreferredLines": []
                },
                {
                    "Amount": 10, "SpecialAmount": 100, "Paid": true,
                    "Lines": [{"Quantity": 1}], "DraftLines": [{"Quantity": 3}],
                    "PreferredLines": [{"Quantity": 9}]
                },
                {
                    "Amount": 10, "SpecialAmount": 110, "Paid": false,
                    "Lines": [], "DraftLines": [{"Quantity": 2}], "PreferredLines": []
                },
                {
                    "Amount": 10, "SpecialAmount": 110, "Paid": true,
                    "Lines": [{"Quantity": 4}], "DraftLines": [], "PreferredLines": []
                }
            ]
        })
        .to_string(),
    )
    .expect("fixture data set is valid JSON")
}
