//! Subquery Conditional Expansion
//!
//! Expands conditionals and coalesces inside subquery FROM clauses by moving
//! the branch decision outside of the subquery and cloning the subquery once
//! per branch, each clone reading from that branch's collection.
//!
//! ## Example
//!
//! ```text
//! from o in Query<Order>
//! select (from l in (o.HasDiscount ? o.Lines : o.ArchivedLines)
//!         where l.Quantity > 0 select l.Price).Sum()
//!
//! // becomes
//!
//! from o in Query<Order>
//! select o.HasDiscount
//!     ? (from l in o.Lines where l.Quantity > 0 select l.Price).Sum()
//!     : (from l in o.ArchivedLines where l.Quantity > 0 select l.Price).Sum()
//! ```
//!
//! A coalesce source `l ?? r` becomes `l != null ? <l> : <r>`, never a
//! coalesce of the two subqueries: a subquery over a present but empty `l`
//! may itself yield null.
//!
//! ## Nomination
//!
//! A branch is expanded only when it references a query source of an
//! enclosing query. While walking the subquery source, every conditional or
//! coalesce branch gets its own entry on a [`NominationStack`]; a source
//! reference marks the innermost open entry. The test of a conditional is
//! walked with nomination suspended, so its references never cause expansion
//! and conditionals nested inside a test are left alone.
//!
//! Once one branch of a node is expanded, every collection-valued sibling
//! gets its own clone of the subquery as well, nominated or not, so both
//! branches keep the same type.
//!
//! ## Scope
//!
//! Only a conditional or coalesce forming the root of a subquery's main
//! source expression is considered. Conditionals anywhere else (filter
//! predicates, method arguments, arithmetic, casts) are never touched.

use crate::query_planner::{
    logical_expr::{
        errors::LogicalExprError,
        visitors::{rebuild_coalesce, rebuild_conditional, ExprResult, ExprRewriter},
        BinaryOperator, CoalesceExpr, ConditionalExpr, Expr, Literal, QuerySourceRef,
        SubQueryExpr,
    },
    query_model::QueryModel,
    transformed::Transformed,
};

use super::{
    errors::{Pass, RewriterError},
    rewriter_pass::{RewriteCtx, RewriterPass, RewriterResult},
};

/// One nomination flag per open conditional/coalesce branch.
///
/// The depth of the stack always equals the number of branches currently
/// being visited.
#[derive(Debug, Default)]
pub struct NominationStack {
    entries: Vec<bool>,
    suspended: usize,
}

impl NominationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Open a branch with a fresh, un-nominated entry.
    pub fn push(&mut self) {
        self.entries.push(false);
    }

    /// Close the innermost branch, returning whether it was nominated.
    pub fn pop(&mut self) -> bool {
        self.entries.pop().unwrap_or(false)
    }

    /// Mark the innermost open branch. No-op outside any branch or while
    /// suspended.
    pub fn nominate(&mut self) {
        if self.suspended > 0 {
            return;
        }
        if let Some(top) = self.entries.last_mut() {
            *top = true;
        }
    }

    pub fn suspend(&mut self) {
        self.suspended += 1;
    }

    pub fn resume(&mut self) {
        self.suspended = self.suspended.saturating_sub(1);
    }
}

pub struct SubQueryConditionalExpander;

impl SubQueryConditionalExpander {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite `model` in place.
    ///
    /// The rewritten model is built completely before it replaces `model`; on
    /// error `model` is left untouched. Returns whether anything changed.
    pub fn rewrite_query_model(
        &self,
        model: &mut QueryModel,
        ctx: &RewriteCtx,
    ) -> RewriterResult<bool> {
        match self.rewrite(model, ctx)? {
            Transformed::Yes(rewritten) => {
                *model = rewritten;
                Ok(true)
            }
            Transformed::No(_) => Ok(false),
        }
    }
}

impl Default for SubQueryConditionalExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriterPass for SubQueryConditionalExpander {
    fn pass(&self) -> Pass {
        Pass::SubQueryConditionalExpansion
    }

    fn rewrite(
        &self,
        model: &QueryModel,
        ctx: &RewriteCtx,
    ) -> RewriterResult<Transformed<QueryModel>> {
        let (rewritten, changed) = expand_clauses(model, 0, ctx.max_subquery_depth)
            .map_err(|e| RewriterError::from_expr_error(self.pass(), e))?;
        if changed {
            log::debug!("SubQueryConditionalExpander: rewrote model to {}", rewritten);
        }
        Ok(Transformed::from_flag(changed, rewritten))
    }
}

/// Expand every subquery embedded in the clause expressions of `model`.
fn expand_clauses(
    model: &QueryModel,
    depth: u32,
    max_depth: u32,
) -> ExprResult<(QueryModel, bool)> {
    let mut expander = ClauseExpressionExpander {
        depth,
        max_depth,
        rewritten: false,
    };
    let rewritten = model.map_clause_expressions(|expr| expander.rewrite(expr))?;
    Ok((rewritten, expander.rewritten))
}

/// Finds subquery nodes in clause expressions.
struct ClauseExpressionExpander {
    depth: u32,
    max_depth: u32,
    rewritten: bool,
}

impl ExprRewriter for ClauseExpressionExpander {
    fn rewrite_conditional(&mut self, cond: &ConditionalExpr) -> ExprResult<Expr> {
        cond.check_branch_types()?;
        rebuild_conditional(self, cond)
    }

    fn rewrite_coalesce(&mut self, coalesce: &CoalesceExpr) -> ExprResult<Expr> {
        coalesce.check_branch_types()?;
        rebuild_coalesce(self, coalesce)
    }

    fn rewrite_subquery(&mut self, subquery: &SubQueryExpr) -> ExprResult<Expr> {
        if self.depth >= self.max_depth {
            return Err(LogicalExprError::NestingTooDeep(self.max_depth));
        }

        let (nested, nested_rewritten) =
            expand_clauses(&subquery.model, self.depth + 1, self.max_depth)?;
        self.rewritten |= nested_rewritten;

        let from_expression = nested.main_source_expression()?;
        if !from_expression.is_branching() {
            return Ok(Expr::subquery(nested));
        }

        let mut from_expander = SubQueryFromClauseExpander::new(&nested);
        let (expanded, changed) = from_expander.expand_node(from_expression)?;
        if !changed {
            return Ok(Expr::subquery(nested));
        }

        log::debug!(
            "SubQueryConditionalExpander: expanded subquery source {} into {}",
            from_expression,
            expanded
        );
        self.rewritten = true;
        Ok(expanded)
    }
}

/// Walks the main source expression of one subquery.
///
/// Only conditionals and coalesces reached through branch positions from the
/// root are expanded; one nested under any other node is rebuilt as it is,
/// though its source references still nominate the enclosing branch.
struct SubQueryFromClauseExpander<'a> {
    original: &'a QueryModel,
    own_sources: Vec<&'a str>,
    nominations: NominationStack,
}

impl<'a> SubQueryFromClauseExpander<'a> {
    fn new(original: &'a QueryModel) -> Self {
        Self {
            original,
            own_sources: original.source_names(),
            nominations: NominationStack::new(),
        }
    }

    /// Returns the rebuilt node and whether any branch below it became a
    /// subquery.
    fn expand_node(&mut self, expr: &Expr) -> ExprResult<(Expr, bool)> {
        match expr {
            Expr::Conditional(cond) => self.expand_conditional(cond),
            Expr::Coalesce(coalesce) => self.expand_coalesce(coalesce),
            other => Ok((self.rewrite(other)?, false)),
        }
    }

    fn expand_conditional(&mut self, cond: &ConditionalExpr) -> ExprResult<(Expr, bool)> {
        cond.check_branch_types()?;

        self.nominations.suspend();
        let test = self.rewrite(&cond.test);
        self.nominations.resume();
        let test = test?;

        let if_true = self.expand_branch(cond.if_true()?)?;
        let if_false = self.expand_branch(cond.if_false()?)?;
        let (if_true, if_false, expanded) = self.complete_branches(if_true, if_false);

        let rebuilt = Expr::conditional(test, if_true, if_false);
        rebuilt.check_branch_types()?;
        Ok((rebuilt, expanded))
    }

    /// `subq(l ?? r)` becomes `l != null ? subq(l) : subq(r)`, so an empty
    /// or filtered-out left collection never falls through to `r`.
    fn expand_coalesce(&mut self, coalesce: &CoalesceExpr) -> ExprResult<(Expr, bool)> {
        coalesce.check_branch_types()?;

        let left = coalesce.left()?;
        let visited_left = self.expand_branch(left)?;
        let visited_right = self.expand_branch(coalesce.right()?)?;
        let (when_present, otherwise, expanded) =
            self.complete_branches(visited_left, visited_right);
        if !expanded {
            return Ok((Expr::coalesce(when_present, otherwise), false));
        }

        let test = Expr::binary(
            BinaryOperator::NotEqual,
            left.clone(),
            Expr::constant(Literal::Null),
        );
        let rebuilt = Expr::conditional(test, when_present, otherwise);
        rebuilt.check_branch_types()?;
        Ok((rebuilt, true))
    }

    fn expand_branch(&mut self, branch: &Expr) -> ExprResult<(Expr, bool)> {
        self.nominations.push();
        let visited = self.expand_node(branch);
        let nominated = self.nominations.pop();
        let (visited, expanded) = visited?;

        if !expanded && nominated && visited.ty().is_collection() {
            Ok((self.wrap(visited), true))
        } else {
            Ok((visited, expanded))
        }
    }

    /// Once either branch is a subquery, the other one must produce the same
    /// kind of value: a collection-valued sibling gets its own clone of the
    /// subquery. The flag tells whether either branch was expanded.
    fn complete_branches(
        &self,
        (first, first_expanded): (Expr, bool),
        (second, second_expanded): (Expr, bool),
    ) -> (Expr, Expr, bool) {
        if !first_expanded && !second_expanded {
            return (first, second, false);
        }
        let complete = |branch: Expr, expanded: bool| {
            if !expanded && branch.ty().is_collection() {
                self.wrap(branch)
            } else {
                branch
            }
        };
        (
            complete(first, first_expanded),
            complete(second, second_expanded),
            true,
        )
    }

    fn wrap(&self, source: Expr) -> Expr {
        Expr::subquery(self.original.with_main_source(source))
    }
}

impl ExprRewriter for SubQueryFromClauseExpander<'_> {
    fn rewrite_query_source_ref(&mut self, source: &QuerySourceRef) -> ExprResult<Expr> {
        if !self.own_sources.contains(&source.source.as_str()) {
            self.nominations.nominate();
        }
        Ok(Expr::QuerySourceRef(source.clone()))
    }

    fn rewrite_conditional(&mut self, cond: &ConditionalExpr) -> ExprResult<Expr> {
        cond.check_branch_types()?;
        rebuild_conditional(self, cond)
    }

    fn rewrite_coalesce(&mut self, coalesce: &CoalesceExpr) -> ExprResult<Expr> {
        coalesce.check_branch_types()?;
        rebuild_coalesce(self, coalesce)
    }
}
