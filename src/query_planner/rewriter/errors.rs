use std::fmt::Display;

use thiserror::Error;

use crate::query_planner::logical_expr::errors::LogicalExprError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Pass {
    SubQueryConditionalExpansion,
}

impl Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::SubQueryConditionalExpansion => write!(f, "SubQueryConditionalExpansion"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RewriterError {
    #[error("{pass}: {source}")]
    MalformedExpression {
        pass: Pass,
        #[source]
        source: LogicalExprError,
    },

    #[error("{pass}: subquery nesting exceeds the configured limit of {limit}")]
    SubqueryDepthExceeded { pass: Pass, limit: u32 },
}

impl RewriterError {
    pub fn from_expr_error(pass: Pass, err: LogicalExprError) -> Self {
        match err {
            LogicalExprError::NestingTooDeep(limit) => {
                RewriterError::SubqueryDepthExceeded { pass, limit }
            }
            source => RewriterError::MalformedExpression { pass, source },
        }
    }

    pub fn is_malformed_expression(&self) -> bool {
        matches!(self, RewriterError::MalformedExpression { .. })
    }
}
