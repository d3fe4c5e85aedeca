use thiserror::Error;

use crate::query_planner::logical_expr::{errors::LogicalExprError, MethodSignature};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HqlGeneratorError {
    #[error("No HQL translation registered for method {0}")]
    UnsupportedMethodSignature(MethodSignature),

    #[error(transparent)]
    MalformedExpression(#[from] LogicalExprError),

    #[error("Method {method} expects {expected} operand(s), got {actual}")]
    InvalidArguments {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported result operator sequence: {0}")]
    UnsupportedResultOperator(String),

    #[error("Subquery nesting exceeds the configured limit of {0}")]
    SubqueryDepthExceeded(u32),
}
