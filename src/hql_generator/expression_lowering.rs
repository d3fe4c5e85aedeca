//! Lowering of query models and expressions into the HQL tree.
//!
//! Every `Expr` variant is matched exhaustively. Method calls go through the
//! [`MethodRegistry`]; everything else is emitted directly with the
//! [`HqlTreeBuilder`].
//!
//! Scalar conditionals become `case when .. then .. else .. end` and scalar
//! coalesces become `coalesce(..)`; the only place a branching expression is
//! distributed over its consumer is a method handler that opts into
//! [`ArgumentExpansion::BareBranching`], and then only for a bare
//! conditional/coalesce that denotes a row or a collection.

use crate::query_planner::{
    logical_expr::{BinaryOperator, Expr, Literal, MethodCall, UnaryOperator},
    query_model::{QueryModel, ResultOperator},
};

use super::{
    errors::HqlGeneratorError,
    hql_ast::{HqlAggregate, HqlBinaryOperator, HqlFrom, HqlJoin, HqlNode, HqlOrderBy, HqlQuery},
    method_registry::{ArgumentExpansion, HqlGeneratorResult, MethodCallContext, MethodRegistry},
    tree_builder::HqlTreeBuilder,
};

pub struct HqlGeneratorVisitor<'a> {
    registry: &'a MethodRegistry,
    builder: HqlTreeBuilder,
    max_subquery_depth: u32,
    depth: u32,
}

impl<'a> HqlGeneratorVisitor<'a> {
    pub fn new(registry: &'a MethodRegistry, max_subquery_depth: u32) -> Self {
        Self {
            registry,
            builder: HqlTreeBuilder::new(),
            max_subquery_depth,
            depth: 0,
        }
    }

    pub fn generate_query(&mut self, model: &QueryModel) -> HqlGeneratorResult<HqlQuery> {
        let b = self.builder;

        let source = self.lower(model.main_source_expression()?)?;
        let mut query = HqlQuery::new(HqlFrom {
            source,
            alias: model.main_from.item_name.clone(),
        });

        for join in &model.joins {
            let source = self.lower(&join.inner_sequence)?;
            let outer = self.lower(&join.outer_key)?;
            let inner = self.lower(&join.inner_key)?;
            query.joins.push(HqlJoin {
                source,
                alias: join.item_name.clone(),
                on: b.equality(outer, inner),
            });
        }

        if let Some(where_clause) = &model.where_clause {
            query.where_clause = Some(self.lower(&where_clause.predicate)?);
        }

        if let Some(having) = &model.having {
            query.having = Some(self.lower(&having.predicate)?);
        }

        for ordering in &model.orderings {
            query.order_by.push(HqlOrderBy {
                expr: self.lower(&ordering.expression)?,
                direction: ordering.direction,
            });
        }

        if let Some(select) = &model.select {
            query.select = Some(self.lower(&select.selector)?);
        }

        for operator in &model.result_operators {
            self.apply_result_operator(&mut query, operator)?;
        }

        log::trace!(
            "HqlGeneratorVisitor: lowered model at depth {}: {}",
            self.depth,
            model
        );
        Ok(query)
    }

    fn apply_result_operator(
        &mut self,
        query: &mut HqlQuery,
        operator: &ResultOperator,
    ) -> HqlGeneratorResult<()> {
        // Nothing can follow a reduction to a single value
        if query.aggregate.is_some() {
            return Err(HqlGeneratorError::UnsupportedResultOperator(format!(
                "{} after a scalar result operator",
                operator
            )));
        }

        let aggregate = match operator {
            ResultOperator::Take(count) => {
                let count = self.lower(count)?;
                query.take = Some(match query.take.take() {
                    // Take(a).Take(b) keeps the smaller bound
                    Some(previous) => self.builder.function("least", vec![previous, count]),
                    None => count,
                });
                return Ok(());
            }
            ResultOperator::Skip(count) => {
                if query.take.is_some() {
                    // HQL applies the offset before the limit
                    return Err(HqlGeneratorError::UnsupportedResultOperator(format!(
                        "{} after Take()",
                        operator
                    )));
                }
                let count = self.lower(count)?;
                query.skip = Some(match query.skip.take() {
                    Some(previous) => {
                        self.builder
                            .binary(HqlBinaryOperator::Add, previous, count)
                    }
                    None => count,
                });
                return Ok(());
            }
            ResultOperator::Distinct => {
                query.distinct = true;
                return Ok(());
            }
            ResultOperator::Count | ResultOperator::LongCount => HqlAggregate::Count,
            ResultOperator::Any => HqlAggregate::Exists,
            ResultOperator::All(predicate) => HqlAggregate::All(self.lower(predicate)?),
            ResultOperator::Contains(item) => HqlAggregate::Contains(self.lower(item)?),
            ResultOperator::First => HqlAggregate::First,
            ResultOperator::Single => HqlAggregate::Single,
            ResultOperator::Sum => HqlAggregate::Sum,
            ResultOperator::Min => HqlAggregate::Min,
            ResultOperator::Max => HqlAggregate::Max,
            ResultOperator::Average => HqlAggregate::Avg,
        };
        query.aggregate = Some(aggregate);
        Ok(())
    }

    pub fn lower(&mut self, expr: &Expr) -> HqlGeneratorResult<HqlNode> {
        let b = self.builder;
        match expr {
            Expr::Constant(Literal::Queryable(entity)) => Ok(b.entity(entity.clone())),

            Expr::Constant(literal) => Ok(b.constant(literal.clone())),

            Expr::Parameter(param) => Ok(b.parameter(param.name.clone())),

            Expr::Unary(unary) => {
                let operand = self.lower(&unary.operand)?;
                Ok(match unary.operator {
                    UnaryOperator::Not => b.not(operand),
                    UnaryOperator::Negate => b.negate(operand),
                    UnaryOperator::Convert => b.cast(operand, unary.ty.clone()),
                })
            }

            Expr::Binary(binary) => {
                let left = self.lower(&binary.left)?;
                let right = self.lower(&binary.right)?;
                Ok(match binary.operator {
                    BinaryOperator::Equal => b.equality(left, right),
                    BinaryOperator::NotEqual => b.inequality(left, right),
                    op => b.binary(hql_operator(op), left, right),
                })
            }

            Expr::MemberAccess(member) => {
                let target = self.lower(&member.target)?;
                Ok(b.dot(target, member.member.clone()))
            }

            Expr::MethodCall(call) => self.lower_method_call(call),

            Expr::Conditional(cond) => {
                cond.check_branch_types()?;
                let test = self.lower(&cond.test)?;
                let if_true = self.lower(cond.if_true()?)?;
                let if_false = self.lower(cond.if_false()?)?;
                Ok(b.case(vec![(test, if_true)], Some(if_false)))
            }

            Expr::Coalesce(coalesce) => {
                coalesce.check_branch_types()?;
                let left = self.lower(coalesce.left()?)?;
                let right = self.lower(coalesce.right()?)?;
                Ok(b.coalesce(left, right))
            }

            Expr::QuerySourceRef(source) => Ok(b.ident(source.source.clone())),

            Expr::SubQuery(subquery) => {
                if self.depth >= self.max_subquery_depth {
                    return Err(HqlGeneratorError::SubqueryDepthExceeded(
                        self.max_subquery_depth,
                    ));
                }
                self.depth += 1;
                let nested = self.generate_query(&subquery.model);
                self.depth -= 1;
                let mut nested = nested?;

                // `Any()` without paging is a plain existence test
                if nested.aggregate == Some(HqlAggregate::Exists)
                    && nested.skip.is_none()
                    && nested.take.is_none()
                {
                    nested.aggregate = None;
                    nested.select = None;
                    nested.distinct = false;
                    return Ok(b.exists(nested));
                }
                Ok(b.subquery(nested))
            }
        }
    }

    fn lower_method_call(&mut self, call: &MethodCall) -> HqlGeneratorResult<HqlNode> {
        let registry = self.registry;
        let handler = registry
            .lookup(&call.method)
            .ok_or_else(|| HqlGeneratorError::UnsupportedMethodSignature(call.method.clone()))?;

        if handler.argument_expansion() == ArgumentExpansion::BareBranching {
            if let Some(expanded) = self.expand_branching_operand(call)? {
                return Ok(expanded);
            }
        }

        let visited_target = match &call.target {
            Some(target) => Some(self.lower(target)?),
            None => None,
        };
        let visited_arguments = call
            .args
            .iter()
            .map(|arg| self.lower(arg))
            .collect::<HqlGeneratorResult<Vec<_>>>()?;

        log::trace!(
            "HqlGeneratorVisitor: {} handled by '{}'",
            call.method,
            handler.name()
        );

        let context = MethodCallContext {
            method: &call.method,
            target: call.target.as_deref(),
            arguments: &call.args,
            visited_target,
            visited_arguments,
        };
        handler.build_hql(&context, &self.builder)
    }

    /// Distribute the call over the branches of its first bare row- or
    /// collection-valued conditional/coalesce operand.
    ///
    /// `m(c ? a : b)` becomes `case when c then m(a) else m(b) end`;
    /// `m(l ?? r)` becomes `case when l is not null then m(l) else m(r) end`.
    fn expand_branching_operand(&mut self, call: &MethodCall) -> HqlGeneratorResult<Option<HqlNode>> {
        let operands: Vec<&Expr> = call.target.as_deref().into_iter().chain(&call.args).collect();
        let Some(position) = operands.iter().position(|e| e.is_expandable_branching()) else {
            return Ok(None);
        };

        let (test, first, second) = match operands[position] {
            Expr::Conditional(cond) => {
                cond.check_branch_types()?;
                let test = self.lower(&cond.test)?;
                (test, cond.if_true()?, cond.if_false()?)
            }
            Expr::Coalesce(coalesce) => {
                coalesce.check_branch_types()?;
                let left = coalesce.left()?;
                let lowered = self.lower(left)?;
                (self.builder.is_not_null(lowered), left, coalesce.right()?)
            }
            _ => return Ok(None),
        };

        log::debug!(
            "HqlGeneratorVisitor: expanding branching operand {} of {}",
            position,
            call.method
        );

        let when = self.lower_with_operand(call, position, first)?;
        let otherwise = self.lower_with_operand(call, position, second)?;
        Ok(Some(self.builder.case(vec![(test, when)], Some(otherwise))))
    }

    fn lower_with_operand(
        &mut self,
        call: &MethodCall,
        position: usize,
        replacement: &Expr,
    ) -> HqlGeneratorResult<HqlNode> {
        let mut call = call.clone();
        match call.target.as_mut() {
            Some(target) if position == 0 => **target = replacement.clone(),
            Some(_) => call.args[position - 1] = replacement.clone(),
            None => call.args[position] = replacement.clone(),
        }
        self.lower_method_call(&call)
    }
}

fn hql_operator(op: BinaryOperator) -> HqlBinaryOperator {
    match op {
        BinaryOperator::Add => HqlBinaryOperator::Add,
        BinaryOperator::Subtract => HqlBinaryOperator::Subtract,
        BinaryOperator::Multiply => HqlBinaryOperator::Multiply,
        BinaryOperator::Divide => HqlBinaryOperator::Divide,
        BinaryOperator::Equal => HqlBinaryOperator::Equal,
        BinaryOperator::NotEqual => HqlBinaryOperator::NotEqual,
        BinaryOperator::LessThan => HqlBinaryOperator::LessThan,
        BinaryOperator::LessThanOrEqual => HqlBinaryOperator::LessThanOrEqual,
        BinaryOperator::GreaterThan => HqlBinaryOperator::GreaterThan,
        BinaryOperator::GreaterThanOrEqual => HqlBinaryOperator::GreaterThanOrEqual,
        BinaryOperator::And => HqlBinaryOperator::And,
        BinaryOperator::Or => HqlBinaryOperator::Or,
    }
}

/// Lower a whole model with a fresh visitor.
pub fn generate_hql(
    model: &QueryModel,
    registry: &MethodRegistry,
    max_subquery_depth: u32,
) -> HqlGeneratorResult<HqlQuery> {
    HqlGeneratorVisitor::new(registry, max_subquery_depth).generate_query(model)
}
