//! Query Model
//!
//! A [`QueryModel`] is the ordered composition of clauses that represents one
//! query or subquery: a main source, join sources, an optional filter and
//! having clause, orderings, an optional projection and result operators.
//! Subqueries are [`Expr::SubQuery`] nodes embedding a nested model.
//!
//! `Clone` is a deep structural copy. Clause collections are owned vectors and
//! nested models are boxed values, so a clone never aliases the original.
//!
//! Models are usually assembled with the builder-style `with_*` methods:
//!
//! ```ignore
//! let model = QueryModel::from_source("e", ExprType::entity("Invoice"), Expr::queryable("Invoice"))
//!     .with_where(predicate)
//!     .with_result_operator(ResultOperator::Count);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query_planner::logical_expr::{errors::LogicalExprError, Expr, ExprType};

pub mod clauses;

pub use clauses::{
    HavingClause, JoinClause, MainFromClause, Ordering, OrderingDirection, ResultOperator,
    SelectClause, WhereClause,
};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct QueryModel {
    pub main_from: MainFromClause,
    #[serde(default)]
    pub joins: Vec<JoinClause>,
    #[serde(default)]
    pub where_clause: Option<WhereClause>,
    #[serde(default)]
    pub having: Option<HavingClause>,
    #[serde(default)]
    pub orderings: Vec<Ordering>,
    #[serde(default)]
    pub select: Option<SelectClause>,
    #[serde(default)]
    pub result_operators: Vec<ResultOperator>,
}

impl QueryModel {
    pub fn new(main_from: MainFromClause) -> Self {
        Self {
            main_from,
            joins: vec![],
            where_clause: None,
            having: None,
            orderings: vec![],
            select: None,
            result_operators: vec![],
        }
    }

    pub fn from_source(
        item_name: impl Into<String>,
        item_type: ExprType,
        from_expression: Expr,
    ) -> Self {
        Self::new(MainFromClause::new(item_name, item_type, from_expression))
    }

    pub fn with_join(mut self, join: JoinClause) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_where(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(WhereClause { predicate });
        self
    }

    pub fn with_having(mut self, predicate: Expr) -> Self {
        self.having = Some(HavingClause { predicate });
        self
    }

    pub fn with_ordering(mut self, expression: Expr, direction: OrderingDirection) -> Self {
        self.orderings.push(Ordering {
            expression,
            direction,
        });
        self
    }

    pub fn with_select(mut self, selector: Expr) -> Self {
        self.select = Some(SelectClause { selector });
        self
    }

    pub fn with_result_operator(mut self, operator: ResultOperator) -> Self {
        self.result_operators.push(operator);
        self
    }

    /// Names of the sources this model declares itself.
    pub fn source_names(&self) -> Vec<&str> {
        std::iter::once(self.main_from.item_name.as_str())
            .chain(self.joins.iter().map(|j| j.item_name.as_str()))
            .collect()
    }

    pub fn main_source_expression(&self) -> Result<&Expr, LogicalExprError> {
        self.main_from
            .from_expression
            .as_ref()
            .ok_or_else(|| LogicalExprError::MissingMainSource(self.main_from.item_name.clone()))
    }

    /// A clone of this model reading from `from_expression` instead.
    pub fn with_main_source(&self, from_expression: Expr) -> QueryModel {
        let mut model = self.clone();
        model.main_from.from_expression = Some(from_expression);
        model
    }

    /// Type of each projected element.
    pub fn selector_type(&self) -> ExprType {
        match &self.select {
            Some(select) => select.selector.ty(),
            None => self.main_from.item_type.clone(),
        }
    }

    /// Type of the value the whole query produces.
    pub fn result_type(&self) -> ExprType {
        let element = self.selector_type();
        match self.result_operators.iter().rev().find(|op| op.is_scalar()) {
            Some(ResultOperator::Count) | Some(ResultOperator::LongCount) => ExprType::Int,
            Some(ResultOperator::Any)
            | Some(ResultOperator::All(_))
            | Some(ResultOperator::Contains(_)) => ExprType::Bool,
            Some(ResultOperator::Average) => ExprType::Decimal,
            Some(_) => element,
            None => ExprType::collection_of(element),
        }
    }

    /// Apply `f` to the expressions of the select clause, orderings, result
    /// operators, filter and having clause, producing a new model.
    ///
    /// The main source and join clauses are left as they are. Nothing is
    /// produced unless every clause succeeds.
    pub fn map_clause_expressions<F, E>(&self, mut f: F) -> Result<QueryModel, E>
    where
        F: FnMut(&Expr) -> Result<Expr, E>,
    {
        let mut model = self.clone();

        if let Some(select) = &mut model.select {
            select.selector = f(&select.selector)?;
        }

        for ordering in &mut model.orderings {
            ordering.expression = f(&ordering.expression)?;
        }

        for operator in &mut model.result_operators {
            if let Some(expr) = operator.expression() {
                let rewritten = f(expr)?;
                *operator = operator.with_expression(rewritten);
            }
        }

        if let Some(where_clause) = &mut model.where_clause {
            where_clause.predicate = f(&where_clause.predicate)?;
        }

        if let Some(having) = &mut model.having {
            having.predicate = f(&having.predicate)?;
        }

        Ok(model)
    }
}

impl fmt::Display for QueryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.main_from.from_expression {
            Some(expr) => expr.to_string(),
            None => "<missing>".to_string(),
        };
        write!(f, "from {} in {}", self.main_from.item_name, source)?;
        for join in &self.joins {
            write!(
                f,
                " join {} in {} on {} equals {}",
                join.item_name, join.inner_sequence, join.outer_key, join.inner_key
            )?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " where {}", where_clause.predicate)?;
        }
        if let Some(having) = &self.having {
            write!(f, " having {}", having.predicate)?;
        }
        for ordering in &self.orderings {
            let dir = match ordering.direction {
                OrderingDirection::Asc => "asc",
                OrderingDirection::Desc => "desc",
            };
            write!(f, " orderby {} {}", ordering.expression, dir)?;
        }
        match &self.select {
            Some(select) => write!(f, " select {}", select.selector)?,
            None => write!(f, " select [{}]", self.main_from.item_name)?,
        }
        for operator in &self.result_operators {
            write!(f, " => {}", operator)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_planner::logical_expr::BinaryOperator;

    fn line_model() -> QueryModel {
        let line = ExprType::entity("Line");
        let order = Expr::source("o", ExprType::entity("Order"));
        QueryModel::from_source(
            "l",
            line.clone(),
            Expr::member(order, "Lines", ExprType::collection_of(line.clone())),
        )
        .with_where(Expr::binary(
            BinaryOperator::GreaterThan,
            Expr::member(Expr::source("l", line.clone()), "Quantity", ExprType::Int),
            Expr::int(0),
        ))
        .with_select(Expr::member(Expr::source("l", line), "Price", ExprType::Decimal))
    }

    #[test]
    fn test_clone_is_independent() {
        let original = line_model();
        let mut clone = original.clone();
        clone.where_clause = None;
        clone.result_operators.push(ResultOperator::Count);

        assert!(original.where_clause.is_some());
        assert!(original.result_operators.is_empty());
    }

    #[test]
    fn test_result_type() {
        let model = line_model();
        assert_eq!(
            model.result_type(),
            ExprType::collection_of(ExprType::Decimal)
        );
        let counted = model.clone().with_result_operator(ResultOperator::Count);
        assert_eq!(counted.result_type(), ExprType::Int);
        let taken = model.with_result_operator(ResultOperator::Take(Expr::int(2)));
        assert!(taken.result_type().is_collection());
    }

    #[test]
    fn test_with_main_source_only_changes_source() {
        let model = line_model();
        let replaced = model.with_main_source(Expr::queryable("Line"));
        assert_eq!(replaced.where_clause, model.where_clause);
        assert_eq!(replaced.select, model.select);
        assert_eq!(
            replaced.main_from.from_expression,
            Some(Expr::queryable("Line"))
        );
    }

    #[test]
    fn test_missing_main_source() {
        let mut model = line_model();
        model.main_from.from_expression = None;
        assert_eq!(
            model.main_source_expression(),
            Err(LogicalExprError::MissingMainSource("l".to_string()))
        );
    }

    #[test]
    fn test_map_clause_expressions_is_all_or_nothing() {
        let model = line_model().with_result_operator(ResultOperator::Take(Expr::int(3)));
        let mut seen = 0;
        let result: Result<QueryModel, &str> = model.map_clause_expressions(|e| {
            seen += 1;
            if seen == 2 {
                Err("boom")
            } else {
                Ok(e.clone())
            }
        });
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_display() {
        let model = line_model().with_result_operator(ResultOperator::Count);
        assert_eq!(
            model.to_string(),
            "from l in [o].Lines where ([l].Quantity > 0) select [l].Price => Count()"
        );
    }
}
