//! Built-in method generators
//!
//! Emission logic for the tagged [`MethodGenerator`] values and the default
//! registry contents:
//!
//! - `Equals` over String/Int32/Decimal/Boolean/Object (instance and static)
//! - String `StartsWith`/`EndsWith`/`Contains`/`ToUpper`/`ToLower`/`Trim`,
//!   and the `Length` getter (`get_Length`)
//! - `Math.Abs` and the static `Decimal.Add`/`Subtract`/`Multiply`/`Divide`
//! - `Enumerable.Contains`/`Any`/`Count`
//!
//! Generic methods are registered under their definition, with `Object`
//! standing in for every type parameter (`Enumerable.Any(IEnumerable<Object>)`).

use crate::query_planner::logical_expr::{ExprType, Literal, MethodSignature};

use super::hql_ast::{HqlBinaryOperator, HqlNode};
use super::method_registry::{
    ArgumentExpansion, HqlGeneratorResult, MethodCallContext, MethodGenerator, MethodHandler,
    MethodRegistry,
};
use super::tree_builder::HqlTreeBuilder;

/// `T.Equals(T)`
pub fn equals_signature(ty: ExprType) -> MethodSignature {
    MethodSignature::new(ty.to_string(), "Equals", vec![ty])
}

/// `String.<name>(String)`
pub fn string_method(name: &str) -> MethodSignature {
    MethodSignature::new("String", name, vec![ExprType::String])
}

fn any_collection() -> ExprType {
    ExprType::collection_of(ExprType::Object)
}

pub fn enumerable_contains() -> MethodSignature {
    MethodSignature::new(
        "Enumerable",
        "Contains",
        vec![any_collection(), ExprType::Object],
    )
}

pub fn enumerable_any() -> MethodSignature {
    MethodSignature::new("Enumerable", "Any", vec![any_collection()])
}

pub fn enumerable_count() -> MethodSignature {
    MethodSignature::new("Enumerable", "Count", vec![any_collection()])
}

/// Escape character of the `like` patterns built for string matching.
pub const LIKE_ESCAPE: char = '\\';

const LIKE_SPECIALS: [char; 3] = [LIKE_ESCAPE, '%', '_'];

/// Match `operand` literally inside a `like` pattern.
///
/// String constants are escaped here; anything else is wrapped in `replace`
/// calls that escape it when the query runs.
fn like_literal(operand: &HqlNode, b: &HqlTreeBuilder) -> HqlNode {
    match operand {
        HqlNode::Constant(Literal::String(value)) => {
            let mut escaped = String::with_capacity(value.len());
            for c in value.chars() {
                if LIKE_SPECIALS.contains(&c) {
                    escaped.push(LIKE_ESCAPE);
                }
                escaped.push(c);
            }
            b.string(escaped)
        }
        other => LIKE_SPECIALS.iter().fold(other.clone(), |escaped, special| {
            b.function(
                "replace",
                vec![
                    escaped,
                    b.string(special.to_string()),
                    b.string(format!("{}{}", LIKE_ESCAPE, special)),
                ],
            )
        }),
    }
}

pub(super) fn build_default_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();

    // ===== EQUALITY =====

    let mut equals = MethodHandler::new("Equals", MethodGenerator::Equality)
        .with_argument_expansion(ArgumentExpansion::BareBranching);
    for ty in [
        ExprType::String,
        ExprType::Int,
        ExprType::Decimal,
        ExprType::Bool,
        ExprType::Object,
    ] {
        equals = equals.supporting(equals_signature(ty));
    }
    // object.Equals(a, b)
    equals = equals.supporting(MethodSignature::new(
        "Object",
        "Equals",
        vec![ExprType::Object, ExprType::Object],
    ));
    registry.merge(equals);

    // ===== STRING FUNCTIONS =====

    registry.merge(
        MethodHandler::new("StartsWith", MethodGenerator::StartsWith)
            .supporting(string_method("StartsWith")),
    );
    registry.merge(
        MethodHandler::new("EndsWith", MethodGenerator::EndsWith)
            .supporting(string_method("EndsWith")),
    );
    registry.merge(
        MethodHandler::new("Contains", MethodGenerator::StringContains)
            .supporting(string_method("Contains")),
    );

    for (name, hql_name) in [
        ("ToUpper", "upper"),
        ("ToLower", "lower"),
        ("Trim", "trim"),
        ("get_Length", "length"),
    ] {
        registry.merge(
            MethodHandler::new(name, MethodGenerator::Function { hql_name })
                .supporting(MethodSignature::new("String", name, vec![])),
        );
    }

    // ===== MATH FUNCTIONS =====

    registry.merge(
        MethodHandler::new("Abs", MethodGenerator::Function { hql_name: "abs" })
            .supporting(MethodSignature::new("Math", "Abs", vec![ExprType::Int]))
            .supporting(MethodSignature::new("Math", "Abs", vec![ExprType::Decimal])),
    );

    for (name, op) in [
        ("Add", HqlBinaryOperator::Add),
        ("Subtract", HqlBinaryOperator::Subtract),
        ("Multiply", HqlBinaryOperator::Multiply),
        ("Divide", HqlBinaryOperator::Divide),
    ] {
        registry.merge(
            MethodHandler::new(name, MethodGenerator::BinaryOperator(op)).supporting(
                MethodSignature::new("Decimal", name, vec![ExprType::Decimal, ExprType::Decimal]),
            ),
        );
    }

    // ===== COLLECTION FUNCTIONS =====

    registry.merge(
        MethodHandler::new("CollectionContains", MethodGenerator::CollectionContains)
            .supporting(enumerable_contains())
            .with_argument_expansion(ArgumentExpansion::BareBranching),
    );
    registry.merge(
        MethodHandler::new("CollectionAny", MethodGenerator::CollectionAny)
            .supporting(enumerable_any())
            .with_argument_expansion(ArgumentExpansion::BareBranching),
    );
    registry.merge(
        MethodHandler::new("CollectionCount", MethodGenerator::CollectionCount)
            .supporting(enumerable_count())
            .with_argument_expansion(ArgumentExpansion::BareBranching),
    );

    log::debug!(
        "MethodRegistry: built default registry with {} signatures",
        registry.signatures().len()
    );
    registry
}

pub(super) fn generate(
    generator: &MethodGenerator,
    call: &MethodCallContext<'_>,
    b: &HqlTreeBuilder,
) -> HqlGeneratorResult<HqlNode> {
    match generator {
        MethodGenerator::Equality => {
            let ops = call.expect_operands(2)?;
            Ok(b.equality(ops[0].clone(), ops[1].clone()))
        }

        MethodGenerator::Function { hql_name } => {
            let args = call.operands().into_iter().cloned().collect();
            Ok(b.function(*hql_name, args))
        }

        MethodGenerator::StartsWith => {
            let ops = call.expect_operands(2)?;
            let pattern = b.concat(vec![like_literal(ops[1], b), b.string("%")]);
            Ok(b.like_escaped(ops[0].clone(), pattern, LIKE_ESCAPE))
        }

        MethodGenerator::EndsWith => {
            let ops = call.expect_operands(2)?;
            let pattern = b.concat(vec![b.string("%"), like_literal(ops[1], b)]);
            Ok(b.like_escaped(ops[0].clone(), pattern, LIKE_ESCAPE))
        }

        MethodGenerator::StringContains => {
            let ops = call.expect_operands(2)?;
            let pattern = b.concat(vec![b.string("%"), like_literal(ops[1], b), b.string("%")]);
            Ok(b.like_escaped(ops[0].clone(), pattern, LIKE_ESCAPE))
        }

        MethodGenerator::CollectionContains => {
            let ops = call.expect_operands(2)?;
            Ok(b.in_collection(ops[1].clone(), ops[0].clone()))
        }

        MethodGenerator::CollectionAny => {
            let ops = call.expect_operands(1)?;
            Ok(b.function("exists", vec![ops[0].clone()]))
        }

        MethodGenerator::CollectionCount => {
            let ops = call.expect_operands(1)?;
            Ok(b.function("size", vec![ops[0].clone()]))
        }

        MethodGenerator::BinaryOperator(op) => {
            let ops = call.expect_operands(2)?;
            Ok(b.binary(*op, ops[0].clone(), ops[1].clone()))
        }

        MethodGenerator::Custom(generator) => generator(call, b),
    }
}
