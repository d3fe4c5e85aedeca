//! HQL abstract syntax tree
//!
//! The target representation of lowering. Nodes are plain values built
//! through [`HqlTreeBuilder`](super::tree_builder::HqlTreeBuilder).

use serde::Serialize;

use crate::query_planner::{
    logical_expr::{ExprType, Literal},
    query_model::OrderingDirection,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum HqlBinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl HqlBinaryOperator {
    pub fn keyword(&self) -> &'static str {
        match self {
            HqlBinaryOperator::Add => "+",
            HqlBinaryOperator::Subtract => "-",
            HqlBinaryOperator::Multiply => "*",
            HqlBinaryOperator::Divide => "/",
            HqlBinaryOperator::Equal => "=",
            HqlBinaryOperator::NotEqual => "<>",
            HqlBinaryOperator::LessThan => "<",
            HqlBinaryOperator::LessThanOrEqual => "<=",
            HqlBinaryOperator::GreaterThan => ">",
            HqlBinaryOperator::GreaterThanOrEqual => ">=",
            HqlBinaryOperator::And => "and",
            HqlBinaryOperator::Or => "or",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum HqlNode {
    Constant(Literal),

    /// Named query parameter, `:name`
    Parameter(String),

    /// All rows of a mapped entity, used as a FROM source
    Entity(String),

    /// Alias of a FROM or JOIN item
    Ident(String),

    /// Property path step, `target.property`
    Dot(Box<HqlNode>, String),

    Binary {
        operator: HqlBinaryOperator,
        left: Box<HqlNode>,
        right: Box<HqlNode>,
    },

    Not(Box<HqlNode>),

    Negate(Box<HqlNode>),

    Cast {
        expr: Box<HqlNode>,
        ty: ExprType,
    },

    Case {
        whens: Vec<(HqlNode, HqlNode)>,
        else_expr: Option<Box<HqlNode>>,
    },

    Coalesce(Box<HqlNode>, Box<HqlNode>),

    IsNull(Box<HqlNode>),

    IsNotNull(Box<HqlNode>),

    /// Function call, e.g. `upper(x)` or `size(o.Lines)`
    Function {
        name: String,
        args: Vec<HqlNode>,
    },

    /// `expr like pattern [escape 'c']`
    Like {
        expr: Box<HqlNode>,
        pattern: Box<HqlNode>,
        escape: Option<char>,
    },

    In {
        item: Box<HqlNode>,
        collection: Box<HqlNode>,
    },

    Exists(Box<HqlQuery>),

    SubQuery(Box<HqlQuery>),
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct HqlFrom {
    pub source: HqlNode,
    pub alias: String,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct HqlJoin {
    pub source: HqlNode,
    pub alias: String,
    pub on: HqlNode,
}

/// Final reduction of a query's rows into one value.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum HqlAggregate {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    /// `Any()`: whether at least one row exists
    Exists,
    /// `All(pred)`: whether the predicate holds for every row
    All(HqlNode),
    /// `Contains(item)`: whether the item is among the selected values
    Contains(HqlNode),
    First,
    Single,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct HqlOrderBy {
    pub expr: HqlNode,
    pub direction: OrderingDirection,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct HqlQuery {
    pub from: HqlFrom,
    pub joins: Vec<HqlJoin>,
    pub where_clause: Option<HqlNode>,
    pub having: Option<HqlNode>,
    pub order_by: Vec<HqlOrderBy>,
    /// `None` selects the FROM item itself
    pub select: Option<HqlNode>,
    pub distinct: bool,
    pub skip: Option<HqlNode>,
    pub take: Option<HqlNode>,
    pub aggregate: Option<HqlAggregate>,
}

impl HqlQuery {
    pub fn new(from: HqlFrom) -> Self {
        Self {
            from,
            joins: vec![],
            where_clause: None,
            having: None,
            order_by: vec![],
            select: None,
            distinct: false,
            skip: None,
            take: None,
            aggregate: None,
        }
    }
}
