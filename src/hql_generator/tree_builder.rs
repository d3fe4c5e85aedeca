//! Constructor surface for HQL nodes.
//!
//! Method handlers receive a [`HqlTreeBuilder`] and use it to emit their
//! fragment; the lowering visitor uses the same builder for everything else.

use crate::query_planner::logical_expr::{ExprType, Literal};

use super::hql_ast::{HqlBinaryOperator, HqlNode, HqlQuery};

#[derive(Debug, Default, Clone, Copy)]
pub struct HqlTreeBuilder;

impl HqlTreeBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn constant(&self, value: Literal) -> HqlNode {
        HqlNode::Constant(value)
    }

    pub fn string(&self, value: impl Into<String>) -> HqlNode {
        HqlNode::Constant(Literal::String(value.into()))
    }

    pub fn parameter(&self, name: impl Into<String>) -> HqlNode {
        HqlNode::Parameter(name.into())
    }

    pub fn entity(&self, name: impl Into<String>) -> HqlNode {
        HqlNode::Entity(name.into())
    }

    pub fn ident(&self, alias: impl Into<String>) -> HqlNode {
        HqlNode::Ident(alias.into())
    }

    pub fn dot(&self, target: HqlNode, property: impl Into<String>) -> HqlNode {
        HqlNode::Dot(Box::new(target), property.into())
    }

    pub fn binary(&self, operator: HqlBinaryOperator, left: HqlNode, right: HqlNode) -> HqlNode {
        HqlNode::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left = right`, or an `is null` test when either side is the null
    /// literal.
    pub fn equality(&self, left: HqlNode, right: HqlNode) -> HqlNode {
        match (left, right) {
            (HqlNode::Constant(Literal::Null), other) | (other, HqlNode::Constant(Literal::Null)) => {
                self.is_null(other)
            }
            (left, right) => self.binary(HqlBinaryOperator::Equal, left, right),
        }
    }

    pub fn inequality(&self, left: HqlNode, right: HqlNode) -> HqlNode {
        match (left, right) {
            (HqlNode::Constant(Literal::Null), other) | (other, HqlNode::Constant(Literal::Null)) => {
                self.is_not_null(other)
            }
            (left, right) => self.binary(HqlBinaryOperator::NotEqual, left, right),
        }
    }

    pub fn and(&self, left: HqlNode, right: HqlNode) -> HqlNode {
        self.binary(HqlBinaryOperator::And, left, right)
    }

    pub fn not(&self, operand: HqlNode) -> HqlNode {
        HqlNode::Not(Box::new(operand))
    }

    pub fn negate(&self, operand: HqlNode) -> HqlNode {
        HqlNode::Negate(Box::new(operand))
    }

    /// Casts to `Object` or to a nullable type are value-preserving and are
    /// not emitted.
    pub fn cast(&self, expr: HqlNode, ty: ExprType) -> HqlNode {
        match ty {
            ExprType::Object | ExprType::Nullable(_) => expr,
            ty => HqlNode::Cast {
                expr: Box::new(expr),
                ty,
            },
        }
    }

    pub fn case(&self, whens: Vec<(HqlNode, HqlNode)>, else_expr: Option<HqlNode>) -> HqlNode {
        HqlNode::Case {
            whens,
            else_expr: else_expr.map(Box::new),
        }
    }

    pub fn coalesce(&self, left: HqlNode, right: HqlNode) -> HqlNode {
        HqlNode::Coalesce(Box::new(left), Box::new(right))
    }

    pub fn is_null(&self, operand: HqlNode) -> HqlNode {
        HqlNode::IsNull(Box::new(operand))
    }

    pub fn is_not_null(&self, operand: HqlNode) -> HqlNode {
        HqlNode::IsNotNull(Box::new(operand))
    }

    pub fn function(&self, name: impl Into<String>, args: Vec<HqlNode>) -> HqlNode {
        HqlNode::Function {
            name: name.into(),
            args,
        }
    }

    pub fn concat(&self, args: Vec<HqlNode>) -> HqlNode {
        self.function("concat", args)
    }

    pub fn like(&self, expr: HqlNode, pattern: HqlNode) -> HqlNode {
        HqlNode::Like {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
            escape: None,
        }
    }

    /// `expr like pattern escape 'escape'`
    pub fn like_escaped(&self, expr: HqlNode, pattern: HqlNode, escape: char) -> HqlNode {
        HqlNode::Like {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
            escape: Some(escape),
        }
    }

    pub fn in_collection(&self, item: HqlNode, collection: HqlNode) -> HqlNode {
        HqlNode::In {
            item: Box::new(item),
            collection: Box::new(collection),
        }
    }

    pub fn exists(&self, query: HqlQuery) -> HqlNode {
        HqlNode::Exists(Box::new(query))
    }

    pub fn subquery(&self, query: HqlQuery) -> HqlNode {
        HqlNode::SubQuery(Box::new(query))
    }
}
