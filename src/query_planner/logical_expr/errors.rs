//! Error types for malformed expression trees.
//!
//! These are the structural errors a visitor can hit while walking an
//! expression tree. They are fatal for the query being translated.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchSide {
    IfTrue,
    IfFalse,
    CoalesceLeft,
    CoalesceRight,
}

impl fmt::Display for BranchSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchSide::IfTrue => write!(f, "if-true branch of a conditional"),
            BranchSide::IfFalse => write!(f, "if-false branch of a conditional"),
            BranchSide::CoalesceLeft => write!(f, "left operand of a coalesce"),
            BranchSide::CoalesceRight => write!(f, "fallback operand of a coalesce"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LogicalExprError {
    #[error("Malformed expression: missing {0}")]
    MissingBranch(BranchSide),

    #[error("Malformed expression: subquery over '{0}' has no main source expression")]
    MissingMainSource(String),

    #[error("Malformed expression: incompatible branch types {left} and {right}")]
    IncompatibleBranchTypes { left: String, right: String },

    #[error("Subquery nesting exceeds the limit of {0}")]
    NestingTooDeep(u32),
}
