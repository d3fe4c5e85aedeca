//! Expression Visitor Pattern
//!
//! This module provides two traversals over [`Expr`] trees:
//!
//! - [`ExpressionVisitor`] + [`walk_expression`]: a read-only walk used by
//!   collectors that gather facts about a tree.
//! - [`ExprRewriter`] + [`walk_rewrite`]: a rebuilding walk. The default
//!   behaviour of every hook recurses into the children and rebuilds an
//!   equivalent node; an override may replace the subtree entirely.
//!
//! Dispatch is an exhaustive `match` over the node kinds, so adding a variant
//! to [`Expr`] forces every traversal to handle it.
//!
//! Neither traversal descends into the nested [`QueryModel`] of a subquery
//! node: subqueries are leaves unless a visitor chooses to look inside.
//! Visitor instances own all of their state, so independent visitors can
//! walk overlapping trees at the same time.
//!
//! # Example
//!
//! ```ignore
//! use crate::query_planner::logical_expr::visitors::SubQueryCounter;
//!
//! let direct = SubQueryCounter::count(&expr);
//! // direct = 2 for `e.Paid ? subq(e.Lines) : subq(e.DraftLines)`
//! ```
//!
//! [`QueryModel`]: crate::query_planner::query_model::QueryModel

use super::{
    errors::LogicalExprError, BinaryExpr, CoalesceExpr, ConditionalExpr, Expr, MemberAccess,
    MethodCall, QuerySourceRef, SubQueryExpr, UnaryExpr,
};

pub type ExprResult<T> = Result<T, LogicalExprError>;

/// Trait for visiting Expr nodes without rebuilding them.
///
/// Implementors can override specific `visit_*` methods to handle nodes of interest.
/// The default implementations do nothing, allowing visitors to be selective.
pub trait ExpressionVisitor {
    type Output: Default;

    /// Called for each query-source reference (e.g. `e` in `e.Amount`)
    fn visit_query_source_ref(&mut self, _source: &QuerySourceRef) -> Self::Output {
        Self::Output::default()
    }

    fn visit_method_call(&mut self, _call: &MethodCall) -> Self::Output {
        Self::Output::default()
    }

    fn visit_conditional(&mut self, _cond: &ConditionalExpr) -> Self::Output {
        Self::Output::default()
    }

    fn visit_coalesce(&mut self, _coalesce: &CoalesceExpr) -> Self::Output {
        Self::Output::default()
    }

    fn visit_subquery(&mut self, _subquery: &SubQueryExpr) -> Self::Output {
        Self::Output::default()
    }

    /// Called for leaf expressions not handled by specific methods
    fn visit_leaf(&mut self, _expr: &Expr) -> Self::Output {
        Self::Output::default()
    }
}

/// Walk an expression tree, calling visitor methods for each node.
///
/// Missing branches are skipped here; rebuilding traversals report them.
pub fn walk_expression<V: ExpressionVisitor>(expr: &Expr, visitor: &mut V) -> V::Output {
    match expr {
        Expr::QuerySourceRef(source) => visitor.visit_query_source_ref(source),

        Expr::MethodCall(call) => {
            let result = visitor.visit_method_call(call);
            if let Some(target) = &call.target {
                walk_expression(target, visitor);
            }
            for arg in &call.args {
                walk_expression(arg, visitor);
            }
            result
        }

        Expr::Conditional(cond) => {
            let result = visitor.visit_conditional(cond);
            walk_expression(&cond.test, visitor);
            for branch in [&cond.if_true, &cond.if_false].into_iter().flatten() {
                walk_expression(branch, visitor);
            }
            result
        }

        Expr::Coalesce(coalesce) => {
            let result = visitor.visit_coalesce(coalesce);
            for operand in [&coalesce.left, &coalesce.right].into_iter().flatten() {
                walk_expression(operand, visitor);
            }
            result
        }

        Expr::Unary(unary) => walk_expression(&unary.operand, visitor),

        Expr::Binary(binary) => {
            walk_expression(&binary.left, visitor);
            walk_expression(&binary.right, visitor)
        }

        Expr::MemberAccess(member) => walk_expression(&member.target, visitor),

        Expr::SubQuery(subquery) => visitor.visit_subquery(subquery),

        Expr::Constant(_) | Expr::Parameter(_) => visitor.visit_leaf(expr),
    }
}

/// Trait for rebuilding Expr trees.
///
/// Every hook defaults to recursing and rebuilding; the matching `rebuild_*`
/// free functions are the "base" behaviour an override can fall back to.
pub trait ExprRewriter {
    fn rewrite(&mut self, expr: &Expr) -> ExprResult<Expr> {
        walk_rewrite(self, expr)
    }

    fn rewrite_query_source_ref(&mut self, source: &QuerySourceRef) -> ExprResult<Expr> {
        Ok(Expr::QuerySourceRef(source.clone()))
    }

    fn rewrite_method_call(&mut self, call: &MethodCall) -> ExprResult<Expr> {
        rebuild_method_call(self, call)
    }

    fn rewrite_conditional(&mut self, cond: &ConditionalExpr) -> ExprResult<Expr> {
        rebuild_conditional(self, cond)
    }

    fn rewrite_coalesce(&mut self, coalesce: &CoalesceExpr) -> ExprResult<Expr> {
        rebuild_coalesce(self, coalesce)
    }

    /// Subqueries are leaves by default.
    fn rewrite_subquery(&mut self, subquery: &SubQueryExpr) -> ExprResult<Expr> {
        Ok(Expr::SubQuery(subquery.clone()))
    }
}

/// Dispatch `expr` to the matching rewriter hook, rebuilding structural nodes.
pub fn walk_rewrite<R: ExprRewriter + ?Sized>(rewriter: &mut R, expr: &Expr) -> ExprResult<Expr> {
    match expr {
        Expr::Constant(_) | Expr::Parameter(_) => Ok(expr.clone()),

        Expr::Unary(unary) => Ok(Expr::Unary(UnaryExpr {
            operator: unary.operator,
            operand: Box::new(rewriter.rewrite(&unary.operand)?),
            ty: unary.ty.clone(),
        })),

        Expr::Binary(binary) => Ok(Expr::Binary(BinaryExpr {
            operator: binary.operator,
            left: Box::new(rewriter.rewrite(&binary.left)?),
            right: Box::new(rewriter.rewrite(&binary.right)?),
        })),

        Expr::MemberAccess(member) => Ok(Expr::MemberAccess(MemberAccess {
            target: Box::new(rewriter.rewrite(&member.target)?),
            member: member.member.clone(),
            ty: member.ty.clone(),
        })),

        Expr::MethodCall(call) => rewriter.rewrite_method_call(call),
        Expr::Conditional(cond) => rewriter.rewrite_conditional(cond),
        Expr::Coalesce(coalesce) => rewriter.rewrite_coalesce(coalesce),
        Expr::QuerySourceRef(source) => rewriter.rewrite_query_source_ref(source),
        Expr::SubQuery(subquery) => rewriter.rewrite_subquery(subquery),
    }
}

pub fn rebuild_method_call<R: ExprRewriter + ?Sized>(
    rewriter: &mut R,
    call: &MethodCall,
) -> ExprResult<Expr> {
    let target = match &call.target {
        Some(target) => Some(Box::new(rewriter.rewrite(target)?)),
        None => None,
    };
    let args = call
        .args
        .iter()
        .map(|arg| rewriter.rewrite(arg))
        .collect::<ExprResult<Vec<_>>>()?;
    Ok(Expr::MethodCall(MethodCall {
        method: call.method.clone(),
        target,
        args,
        ty: call.ty.clone(),
    }))
}

pub fn rebuild_conditional<R: ExprRewriter + ?Sized>(
    rewriter: &mut R,
    cond: &ConditionalExpr,
) -> ExprResult<Expr> {
    let test = rewriter.rewrite(&cond.test)?;
    let if_true = rewriter.rewrite(cond.if_true()?)?;
    let if_false = rewriter.rewrite(cond.if_false()?)?;
    Ok(Expr::conditional(test, if_true, if_false))
}

pub fn rebuild_coalesce<R: ExprRewriter + ?Sized>(
    rewriter: &mut R,
    coalesce: &CoalesceExpr,
) -> ExprResult<Expr> {
    let left = rewriter.rewrite(coalesce.left()?)?;
    let right = rewriter.rewrite(coalesce.right()?)?;
    Ok(Expr::coalesce(left, right))
}

// =============================================================================
// Common Visitor Implementations
// =============================================================================

/// Counts subquery nodes directly embedded in an expression (not nested ones).
pub struct SubQueryCounter {
    pub count: usize,
}

impl SubQueryCounter {
    pub fn count(expr: &Expr) -> usize {
        let mut counter = Self { count: 0 };
        walk_expression(expr, &mut counter);
        counter.count
    }
}

impl ExpressionVisitor for SubQueryCounter {
    type Output = ();

    fn visit_subquery(&mut self, _subquery: &SubQueryExpr) {
        self.count += 1;
    }
}
