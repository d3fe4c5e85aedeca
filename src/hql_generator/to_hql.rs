use crate::query_planner::{logical_expr::Literal, query_model::OrderingDirection};

use super::hql_ast::{HqlAggregate, HqlNode, HqlQuery};

/// Render an HQL tree as query text.
pub trait ToHql {
    fn to_hql(&self) -> String;
}

fn join_hql(nodes: &[HqlNode]) -> String {
    nodes
        .iter()
        .map(ToHql::to_hql)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ToHql for Literal {
    fn to_hql(&self) -> String {
        match self {
            Literal::Null => "null".to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
            Literal::Queryable(entity) => entity.clone(),
        }
    }
}

impl ToHql for HqlNode {
    fn to_hql(&self) -> String {
        match self {
            HqlNode::Constant(literal) => literal.to_hql(),
            HqlNode::Parameter(name) => format!(":{}", name),
            HqlNode::Entity(name) | HqlNode::Ident(name) => name.clone(),
            HqlNode::Dot(target, property) => format!("{}.{}", target.to_hql(), property),
            HqlNode::Binary {
                operator,
                left,
                right,
            } => format!("({} {} {})", left.to_hql(), operator.keyword(), right.to_hql()),
            HqlNode::Not(operand) => format!("not ({})", operand.to_hql()),
            HqlNode::Negate(operand) => format!("-({})", operand.to_hql()),
            HqlNode::Cast { expr, ty } => format!("cast({} as {})", expr.to_hql(), ty),
            HqlNode::Case { whens, else_expr } => {
                let mut hql = "case".to_string();
                for (when, then) in whens {
                    hql.push_str(&format!(" when {} then {}", when.to_hql(), then.to_hql()));
                }
                if let Some(else_expr) = else_expr {
                    hql.push_str(&format!(" else {}", else_expr.to_hql()));
                }
                hql.push_str(" end");
                hql
            }
            HqlNode::Coalesce(left, right) => {
                format!("coalesce({}, {})", left.to_hql(), right.to_hql())
            }
            HqlNode::IsNull(operand) => format!("{} is null", operand.to_hql()),
            HqlNode::IsNotNull(operand) => format!("{} is not null", operand.to_hql()),
            HqlNode::Function { name, args } => format!("{}({})", name, join_hql(args)),
            HqlNode::Like {
                expr,
                pattern,
                escape,
            } => match escape {
                Some(escape) => format!(
                    "{} like {} escape {}",
                    expr.to_hql(),
                    pattern.to_hql(),
                    Literal::String(escape.to_string()).to_hql()
                ),
                None => format!("{} like {}", expr.to_hql(), pattern.to_hql()),
            },
            HqlNode::In { item, collection } => {
                format!("{} in elements({})", item.to_hql(), collection.to_hql())
            }
            HqlNode::Exists(query) => format!("exists ({})", query.to_hql()),
            HqlNode::SubQuery(query) => format!("({})", query.to_hql()),
        }
    }
}

impl ToHql for HqlQuery {
    fn to_hql(&self) -> String {
        let projected = match &self.select {
            Some(select) => select.to_hql(),
            None => self.from.alias.clone(),
        };
        let projected = if self.distinct {
            format!("distinct {}", projected)
        } else {
            projected
        };

        // Aggregates HQL has no function for use the engine's names
        let selection = match &self.aggregate {
            None => projected,
            Some(HqlAggregate::Count) => format!("count({})", projected),
            Some(HqlAggregate::Sum) => format!("sum({})", projected),
            Some(HqlAggregate::Min) => format!("min({})", projected),
            Some(HqlAggregate::Max) => format!("max({})", projected),
            Some(HqlAggregate::Avg) => format!("avg({})", projected),
            Some(HqlAggregate::Exists) => format!("any({})", projected),
            Some(HqlAggregate::All(predicate)) => format!("every({})", predicate.to_hql()),
            Some(HqlAggregate::Contains(item)) => {
                format!("contains({}, {})", projected, item.to_hql())
            }
            Some(HqlAggregate::First) => format!("first({})", projected),
            Some(HqlAggregate::Single) => format!("single({})", projected),
        };

        let mut hql = format!(
            "select {} from {} {}",
            selection,
            self.from.source.to_hql(),
            self.from.alias
        );

        for join in &self.joins {
            hql.push_str(&format!(
                " join {} {} on {}",
                join.source.to_hql(),
                join.alias,
                join.on.to_hql()
            ));
        }

        if let Some(where_clause) = &self.where_clause {
            hql.push_str(&format!(" where {}", where_clause.to_hql()));
        }

        if let Some(having) = &self.having {
            hql.push_str(&format!(" having {}", having.to_hql()));
        }

        if !self.order_by.is_empty() {
            let items: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    let dir = match o.direction {
                        OrderingDirection::Asc => "asc",
                        OrderingDirection::Desc => "desc",
                    };
                    format!("{} {}", o.expr.to_hql(), dir)
                })
                .collect();
            hql.push_str(&format!(" order by {}", items.join(", ")));
        }

        if let Some(skip) = &self.skip {
            hql.push_str(&format!(" skip {}", skip.to_hql()));
        }
        if let Some(take) = &self.take {
            hql.push_str(&format!(" take {}", take.to_hql()));
        }

        hql
    }
}
