//! # Query Model Rewriter
//!
//! Normalizes a [`QueryModel`] before it is lowered to HQL. Each pass is a
//! pure function from model to model; the pipeline threads the output of one
//! pass into the next.
//!
//! ## Pass Pipeline
//!
//! ```text
//! 1. SubQueryConditionalExpansion - Hoist conditionals/coalesces out of
//!                                   subquery sources, one subquery per branch
//! ```

use crate::query_planner::{logical_expr::visitors::SubQueryCounter, query_model::QueryModel};

pub mod errors;
pub mod rewriter_pass;
pub mod subquery_conditional_expander;

pub use rewriter_pass::{RewriteCtx, RewriterPass, RewriterResult};
pub use subquery_conditional_expander::{NominationStack, SubQueryConditionalExpander};

/// Run every rewrite pass over `model`.
///
/// Returns a new model; the input is never modified, so on error the caller
/// still holds the untouched original.
pub fn rewrite_query_model(model: &QueryModel, ctx: &RewriteCtx) -> RewriterResult<QueryModel> {
    log::debug!("REWRITER: rewriting {}", model);

    let passes: Vec<Box<dyn RewriterPass>> = vec![Box::new(SubQueryConditionalExpander::new())];

    let mut current = model.clone();
    for pass in passes {
        let transformed = pass.rewrite(&current, ctx)?;
        if transformed.is_yes() {
            log::info!("REWRITER: {} changed the query model", pass.pass());
        } else {
            log::trace!("REWRITER: {} left the query model unchanged", pass.pass());
        }
        current = transformed.get_model();
    }

    if log::log_enabled!(log::Level::Trace) {
        let subqueries: usize = current
            .select
            .iter()
            .map(|s| SubQueryCounter::count(&s.selector))
            .chain(
                current
                    .where_clause
                    .iter()
                    .map(|w| SubQueryCounter::count(&w.predicate)),
            )
            .sum();
        log::trace!("REWRITER: {} top-level subqueries after rewriting", subqueries);
    }

    Ok(current)
}
