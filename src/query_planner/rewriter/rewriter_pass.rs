//! Rewriter pass trait and result types.
//!
//! Every pass is a pure function from a [`QueryModel`] to a new one, tagged
//! with whether anything changed. Passes never mutate their input, so a
//! failing pass leaves the caller's model exactly as it was.
//!
//! # Implementing a Pass
//!
//! ```ignore
//! impl RewriterPass for MyPass {
//!     fn pass(&self) -> Pass { Pass::MyPass }
//!     fn rewrite(&self, model: &QueryModel, ctx: &RewriteCtx)
//!         -> RewriterResult<Transformed<QueryModel>> {
//!         // Build and return the new model here
//!     }
//! }
//! ```

use crate::query_planner::{query_model::QueryModel, transformed::Transformed};

use super::errors::{Pass, RewriterError};

pub type RewriterResult<T> = Result<T, RewriterError>;

/// Settings shared by all passes of one rewrite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteCtx {
    /// Deepest subquery nesting a pass will descend into
    pub max_subquery_depth: u32,
}

impl Default for RewriteCtx {
    fn default() -> Self {
        Self {
            max_subquery_depth: 64,
        }
    }
}

pub trait RewriterPass {
    fn pass(&self) -> Pass;

    fn rewrite(
        &self,
        model: &QueryModel,
        ctx: &RewriteCtx,
    ) -> RewriterResult<Transformed<QueryModel>>;
}
