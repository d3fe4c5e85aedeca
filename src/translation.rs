//! Translation entry point: rewrite passes, then lowering to HQL.
//!
//! [`translate`] has no side effects on its inputs. A call that failed with
//! `UnsupportedMethodSignature` can be retried after registering a handler.

use thiserror::Error;

use crate::config::TranslatorConfig;
use crate::hql_generator::{self, HqlGeneratorError, HqlQuery, MethodRegistry, ToHql};
use crate::query_planner::{
    query_model::QueryModel,
    rewriter::{self, errors::RewriterError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationErrorKind {
    MalformedExpression,
    UnsupportedMethodSignature,
    Other,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslationError {
    #[error("Rewrite failed: {0}")]
    Rewrite(#[from] RewriterError),

    #[error("HQL generation failed: {0}")]
    Generation(#[from] HqlGeneratorError),
}

impl TranslationError {
    pub fn kind(&self) -> TranslationErrorKind {
        match self {
            TranslationError::Rewrite(err) if err.is_malformed_expression() => {
                TranslationErrorKind::MalformedExpression
            }
            TranslationError::Generation(HqlGeneratorError::MalformedExpression(_)) => {
                TranslationErrorKind::MalformedExpression
            }
            TranslationError::Generation(HqlGeneratorError::UnsupportedMethodSignature(_)) => {
                TranslationErrorKind::UnsupportedMethodSignature
            }
            _ => TranslationErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    /// The model after every rewrite pass
    pub model: QueryModel,
    pub hql: HqlQuery,
}

impl TranslatedQuery {
    pub fn hql_text(&self) -> String {
        self.hql.to_hql()
    }
}

pub fn translate(
    model: &QueryModel,
    registry: &MethodRegistry,
    config: &TranslatorConfig,
) -> Result<TranslatedQuery, TranslationError> {
    let ctx = config.to_rewrite_ctx();
    let rewritten = rewriter::rewrite_query_model(model, &ctx)?;
    let hql = hql_generator::generate_hql(&rewritten, registry, ctx.max_subquery_depth)?;

    log::debug!("translate: {}", hql.to_hql());

    Ok(TranslatedQuery {
        model: rewritten,
        hql,
    })
}
