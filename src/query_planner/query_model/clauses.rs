use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query_planner::logical_expr::{Expr, ExprType};

/// The FROM clause every query model starts with.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MainFromClause {
    /// Name other clauses use to reference an element of this source
    pub item_name: String,
    pub item_type: ExprType,
    /// `None` only in malformed models
    pub from_expression: Option<Expr>,
}

impl MainFromClause {
    pub fn new(item_name: impl Into<String>, item_type: ExprType, from_expression: Expr) -> Self {
        Self {
            item_name: item_name.into(),
            item_type,
            from_expression: Some(from_expression),
        }
    }
}

/// Inner join of an additional source on key equality.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct JoinClause {
    pub item_name: String,
    pub item_type: ExprType,
    pub inner_sequence: Expr,
    pub outer_key: Expr,
    pub inner_key: Expr,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WhereClause {
    pub predicate: Expr,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HavingClause {
    pub predicate: Expr,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum OrderingDirection {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Ordering {
    pub expression: Expr,
    pub direction: OrderingDirection,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SelectClause {
    pub selector: Expr,
}

/// Operators applied to the result sequence, in order.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum ResultOperator {
    Count,
    LongCount,
    Any,
    All(Expr),
    First,
    Single,
    Take(Expr),
    Skip(Expr),
    Distinct,
    Contains(Expr),
    Sum,
    Min,
    Max,
    Average,
}

impl ResultOperator {
    /// Expression operand, if the operator carries one.
    pub fn expression(&self) -> Option<&Expr> {
        match self {
            ResultOperator::All(e)
            | ResultOperator::Take(e)
            | ResultOperator::Skip(e)
            | ResultOperator::Contains(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn with_expression(&self, expr: Expr) -> ResultOperator {
        match self {
            ResultOperator::All(_) => ResultOperator::All(expr),
            ResultOperator::Take(_) => ResultOperator::Take(expr),
            ResultOperator::Skip(_) => ResultOperator::Skip(expr),
            ResultOperator::Contains(_) => ResultOperator::Contains(expr),
            other => other.clone(),
        }
    }

    /// Whether the operator collapses the sequence into a single value.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            ResultOperator::Take(_) | ResultOperator::Skip(_) | ResultOperator::Distinct
        )
    }
}

impl fmt::Display for ResultOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultOperator::Count => write!(f, "Count()"),
            ResultOperator::LongCount => write!(f, "LongCount()"),
            ResultOperator::Any => write!(f, "Any()"),
            ResultOperator::All(e) => write!(f, "All({})", e),
            ResultOperator::First => write!(f, "First()"),
            ResultOperator::Single => write!(f, "Single()"),
            ResultOperator::Take(e) => write!(f, "Take({})", e),
            ResultOperator::Skip(e) => write!(f, "Skip({})", e),
            ResultOperator::Distinct => write!(f, "Distinct()"),
            ResultOperator::Contains(e) => write!(f, "Contains({})", e),
            ResultOperator::Sum => write!(f, "Sum()"),
            ResultOperator::Min => write!(f, "Min()"),
            ResultOperator::Max => write!(f, "Max()"),
            ResultOperator::Average => write!(f, "Average()"),
        }
    }
}
