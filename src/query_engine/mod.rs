//! In-memory evaluation of lowered HQL queries.
//!
//! A [`DataSet`] maps entity names to JSON records. [`execute`] walks an
//! [`HqlQuery`] over it with SQL three-valued logic: comparisons involving
//! null are unknown, and a filter keeps a row only when its predicate is
//! definitely true.
//!
//! Subqueries see the aliases of every enclosing query, so correlated
//! subqueries (`from l in e.Lines`) resolve against the current outer row.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Map;

use crate::hql_generator::hql_ast::{HqlAggregate, HqlBinaryOperator, HqlNode, HqlQuery};
use crate::query_planner::{
    logical_expr::{ExprType, Literal},
    query_model::OrderingDirection,
};

pub mod errors;
pub mod value;

pub use errors::QueryEngineError;
pub use value::Value;

pub type QueryEngineResult<T> = Result<T, QueryEngineError>;

type Record = Map<String, serde_json::Value>;

/// Records per entity name, e.g. `{"Invoice": [{"Amount": 10, ...}]}`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(transparent)]
pub struct DataSet {
    entities: HashMap<String, Vec<Record>>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> QueryEngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> QueryEngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(serde_json::Error::io)?;
        Self::from_json_str(&content)
    }

    pub fn insert(&mut self, entity: impl Into<String>, records: Vec<Record>) {
        self.entities.insert(entity.into(), records);
    }

    pub fn records(&self, entity: &str) -> QueryEngineResult<&[Record]> {
        self.entities
            .get(entity)
            .map(Vec::as_slice)
            .ok_or_else(|| QueryEngineError::UnknownEntity(entity.to_string()))
    }
}

/// Alias bindings visible while evaluating a node, innermost last.
type Scope = Vec<(String, Value)>;

pub struct QueryEngine<'a> {
    data: &'a DataSet,
    parameters: HashMap<String, Value>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(data: &'a DataSet) -> Self {
        Self {
            data,
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn execute(&self, query: &HqlQuery) -> QueryEngineResult<Value> {
        self.run_query(query, &Scope::new())
    }

    fn run_query(&self, query: &HqlQuery, outer: &Scope) -> QueryEngineResult<Value> {
        // Cartesian product of the FROM item and every join, filtered by ON
        let mut scopes: Vec<Scope> = Vec::new();
        for item in self.sequence(&query.from.source, outer)? {
            let mut scope = outer.clone();
            scope.push((query.from.alias.clone(), item));
            scopes.push(scope);
        }

        for join in &query.joins {
            let mut joined = Vec::new();
            for scope in &scopes {
                for item in self.sequence(&join.source, scope)? {
                    let mut candidate = scope.clone();
                    candidate.push((join.alias.clone(), item));
                    if self.is_true(&join.on, &candidate)? {
                        joined.push(candidate);
                    }
                }
            }
            scopes = joined;
        }

        for predicate in query.where_clause.iter().chain(query.having.iter()) {
            let mut kept = Vec::with_capacity(scopes.len());
            for scope in scopes {
                if self.is_true(predicate, &scope)? {
                    kept.push(scope);
                }
            }
            scopes = kept;
        }

        if !query.order_by.is_empty() {
            let mut keyed = Vec::with_capacity(scopes.len());
            for scope in scopes {
                let keys = query
                    .order_by
                    .iter()
                    .map(|o| self.eval(&o.expr, &scope))
                    .collect::<QueryEngineResult<Vec<_>>>()?;
                keyed.push((keys, scope));
            }
            keyed.sort_by(|(a, _), (b, _)| {
                for (order, (left, right)) in query.order_by.iter().zip(a.iter().zip(b)) {
                    let ordering = match order.direction {
                        OrderingDirection::Asc => left.sort_compare(right),
                        OrderingDirection::Desc => right.sort_compare(left),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
            scopes = keyed.into_iter().map(|(_, scope)| scope).collect();
        }

        let mut rows: Vec<(Value, Scope)> = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let value = match &query.select {
                Some(select) => self.eval(select, &scope)?,
                None => self.lookup_alias(&query.from.alias, &scope)?,
            };
            rows.push((value, scope));
        }

        if query.distinct {
            let mut unique: Vec<(Value, Scope)> = Vec::with_capacity(rows.len());
            for row in rows {
                if !unique.iter().any(|(seen, _)| *seen == row.0) {
                    unique.push(row);
                }
            }
            rows = unique;
        }

        if let Some(skip) = &query.skip {
            let skip = self.eval_count(skip, outer)?;
            rows = rows.into_iter().skip(skip).collect();
        }
        if let Some(take) = &query.take {
            let take = self.eval_count(take, outer)?;
            rows.truncate(take);
        }

        log::trace!("QueryEngine: {} row(s) after filtering", rows.len());

        let Some(aggregate) = &query.aggregate else {
            return Ok(Value::List(rows.into_iter().map(|(v, _)| v).collect()));
        };

        match aggregate {
            HqlAggregate::Count => Ok(Value::Int(rows.len() as i64)),
            HqlAggregate::Exists => Ok(Value::Bool(!rows.is_empty())),
            HqlAggregate::All(predicate) => {
                for (_, scope) in &rows {
                    if !self.is_true(predicate, scope)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            HqlAggregate::Contains(item) => {
                let item = self.eval(item, outer)?;
                Ok(Value::Bool(
                    rows.iter().any(|(v, _)| v.sql_equals(&item) == Some(true)),
                ))
            }
            HqlAggregate::First => rows
                .into_iter()
                .next()
                .map(|(v, _)| v)
                .ok_or(QueryEngineError::EmptySequence),
            HqlAggregate::Single => {
                let mut values = rows.into_iter().map(|(v, _)| v);
                let first = values.next().ok_or(QueryEngineError::EmptySequence)?;
                if values.next().is_some() {
                    return Err(QueryEngineError::MoreThanOneElement);
                }
                Ok(first)
            }
            HqlAggregate::Sum => sum(rows.iter().map(|(v, _)| v)),
            HqlAggregate::Avg => {
                let present: Vec<&Value> =
                    rows.iter().map(|(v, _)| v).filter(|v| !v.is_null()).collect();
                if present.is_empty() {
                    return Ok(Value::Null);
                }
                let total = match sum(present.iter().copied())? {
                    Value::Int(i) => i as f64,
                    Value::Float(f) => f,
                    _ => return Ok(Value::Null),
                };
                Ok(Value::Float(total / present.len() as f64))
            }
            HqlAggregate::Min => Ok(extreme(rows.iter().map(|(v, _)| v), Ordering::Less)),
            HqlAggregate::Max => Ok(extreme(rows.iter().map(|(v, _)| v), Ordering::Greater)),
        }
    }

    /// Evaluate a FROM/JOIN source into its items. A null collection is empty.
    fn sequence(&self, source: &HqlNode, scope: &Scope) -> QueryEngineResult<Vec<Value>> {
        match self.eval(source, scope)? {
            Value::List(items) => Ok(items),
            Value::Null => Ok(vec![]),
            other => Err(QueryEngineError::TypeMismatch {
                operation: "query source".to_string(),
                found: other.kind(),
            }),
        }
    }

    fn eval_count(&self, node: &HqlNode, scope: &Scope) -> QueryEngineResult<usize> {
        match self.eval(node, scope)? {
            Value::Int(i) => Ok(i.max(0) as usize),
            other => Err(QueryEngineError::TypeMismatch {
                operation: "skip/take".to_string(),
                found: other.kind(),
            }),
        }
    }

    fn is_true(&self, predicate: &HqlNode, scope: &Scope) -> QueryEngineResult<bool> {
        Ok(matches!(self.eval(predicate, scope)?, Value::Bool(true)))
    }

    fn lookup_alias(&self, alias: &str, scope: &Scope) -> QueryEngineResult<Value> {
        scope
            .iter()
            .rev()
            .find(|(name, _)| name == alias)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| QueryEngineError::UnboundAlias(alias.to_string()))
    }

    fn entity_rows(&self, entity: &str) -> QueryEngineResult<Value> {
        let records = self.data.records(entity)?;
        Ok(Value::List(
            records.iter().map(|r| Value::Row(r.clone())).collect(),
        ))
    }

    fn eval(&self, node: &HqlNode, scope: &Scope) -> QueryEngineResult<Value> {
        match node {
            HqlNode::Constant(Literal::Queryable(entity)) => self.entity_rows(entity),

            HqlNode::Constant(literal) => Ok(Value::from_literal(literal)),

            HqlNode::Parameter(name) => self
                .parameters
                .get(name)
                .cloned()
                .ok_or_else(|| QueryEngineError::UnboundParameter(name.clone())),

            HqlNode::Entity(entity) => self.entity_rows(entity),

            HqlNode::Ident(alias) => self.lookup_alias(alias, scope),

            HqlNode::Dot(target, property) => match self.eval(target, scope)? {
                Value::Row(fields) => Ok(fields
                    .get(property)
                    .map(Value::from_json)
                    .unwrap_or(Value::Null)),
                Value::Null => Ok(Value::Null),
                other => Err(QueryEngineError::TypeMismatch {
                    operation: format!("property access .{}", property),
                    found: other.kind(),
                }),
            },

            HqlNode::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                binary(*operator, left, right)
            }

            HqlNode::Not(operand) => match self.eval(operand, scope)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Null => Ok(Value::Null),
                other => Err(QueryEngineError::TypeMismatch {
                    operation: "not".to_string(),
                    found: other.kind(),
                }),
            },

            HqlNode::Negate(operand) => match self.eval(operand, scope)? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| QueryEngineError::IntegerOverflow("negation".to_string())),
                Value::Float(f) => Ok(Value::Float(-f)),
                Value::Null => Ok(Value::Null),
                other => Err(QueryEngineError::TypeMismatch {
                    operation: "negation".to_string(),
                    found: other.kind(),
                }),
            },

            HqlNode::Cast { expr, ty } => cast(self.eval(expr, scope)?, ty),

            HqlNode::Case { whens, else_expr } => {
                for (when, then) in whens {
                    if self.is_true(when, scope)? {
                        return self.eval(then, scope);
                    }
                }
                match else_expr {
                    Some(else_expr) => self.eval(else_expr, scope),
                    None => Ok(Value::Null),
                }
            }

            HqlNode::Coalesce(left, right) => match self.eval(left, scope)? {
                Value::Null => self.eval(right, scope),
                value => Ok(value),
            },

            HqlNode::IsNull(operand) => Ok(Value::Bool(self.eval(operand, scope)?.is_null())),

            HqlNode::IsNotNull(operand) => {
                Ok(Value::Bool(!self.eval(operand, scope)?.is_null()))
            }

            HqlNode::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope))
                    .collect::<QueryEngineResult<Vec<_>>>()?;
                function(name, args)
            }

            HqlNode::Like {
                expr,
                pattern,
                escape,
            } => {
                match (self.eval(expr, scope)?, self.eval(pattern, scope)?) {
                    (Value::String(s), Value::String(p)) => {
                        Ok(Value::Bool(like_to_regex(&p, *escape)?.is_match(&s)))
                    }
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (other, _) => Err(QueryEngineError::TypeMismatch {
                        operation: "like".to_string(),
                        found: other.kind(),
                    }),
                }
            }

            HqlNode::In { item, collection } => {
                let item = self.eval(item, scope)?;
                let items = self.sequence(collection, scope)?;
                if item.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Bool(
                    items.iter().any(|v| v.sql_equals(&item) == Some(true)),
                ))
            }

            HqlNode::Exists(query) => match self.run_query(query, scope)? {
                Value::List(items) => Ok(Value::Bool(!items.is_empty())),
                value => Ok(Value::Bool(!value.is_null())),
            },

            HqlNode::SubQuery(query) => self.run_query(query, scope),
        }
    }
}

/// Execute `query` over `data` without parameters.
pub fn execute(query: &HqlQuery, data: &DataSet) -> QueryEngineResult<Value> {
    QueryEngine::new(data).execute(query)
}

fn type_mismatch(operation: &str, value: &Value) -> QueryEngineError {
    QueryEngineError::TypeMismatch {
        operation: operation.to_string(),
        found: value.kind(),
    }
}

fn binary(operator: HqlBinaryOperator, left: Value, right: Value) -> QueryEngineResult<Value> {
    use HqlBinaryOperator::*;

    match operator {
        // Three-valued logic
        And => match (&left, &right) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Ok(Value::Bool(false)),
            (Value::Bool(true), Value::Bool(true)) => Ok(Value::Bool(true)),
            (Value::Null | Value::Bool(_), Value::Null | Value::Bool(_)) => Ok(Value::Null),
            (Value::Bool(_) | Value::Null, other) | (other, _) => {
                Err(type_mismatch("and", other))
            }
        },
        Or => match (&left, &right) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Ok(Value::Bool(true)),
            (Value::Bool(false), Value::Bool(false)) => Ok(Value::Bool(false)),
            (Value::Null | Value::Bool(_), Value::Null | Value::Bool(_)) => Ok(Value::Null),
            (Value::Bool(_) | Value::Null, other) | (other, _) => {
                Err(type_mismatch("or", other))
            }
        },

        Equal => Ok(left.sql_equals(&right).map_or(Value::Null, Value::Bool)),
        NotEqual => Ok(left
            .sql_equals(&right)
            .map_or(Value::Null, |eq| Value::Bool(!eq))),

        LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            let ordering = left
                .sql_compare(&right)
                .ok_or_else(|| type_mismatch("comparison", &right))?;
            let result = match operator {
                LessThan => ordering == Ordering::Less,
                LessThanOrEqual => ordering != Ordering::Greater,
                GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }

        Add | Subtract | Multiply | Divide => arithmetic(operator, left, right),
    }
}

fn arithmetic(operator: HqlBinaryOperator, left: Value, right: Value) -> QueryEngineResult<Value> {
    use HqlBinaryOperator::*;

    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(a), Value::String(b)) if operator == Add => Ok(Value::String(a + &b)),
        (Value::Int(a), Value::Int(b)) => {
            let result = match operator {
                Add => a.checked_add(b),
                Subtract => a.checked_sub(b),
                Multiply => a.checked_mul(b),
                _ if b == 0 => return Ok(Value::Null),
                _ => a.checked_div(b),
            };
            result.map(Value::Int).ok_or_else(|| {
                QueryEngineError::IntegerOverflow(format!("{} {} {}", a, operator.keyword(), b))
            })
        }
        (a, b) => {
            let (Some(x), Some(y)) = (as_number(&a), as_number(&b)) else {
                let offender = if as_number(&a).is_none() { a } else { b };
                return Err(type_mismatch("arithmetic", &offender));
            };
            Ok(Value::Float(match operator {
                Add => x + y,
                Subtract => x - y,
                Multiply => x * y,
                _ => x / y,
            }))
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn cast(value: Value, ty: &ExprType) -> QueryEngineResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match (ty.non_nullable(), value) {
        (ExprType::Int, Value::Float(f)) => Ok(Value::Int(f.trunc() as i64)),
        (ExprType::Decimal, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (ExprType::String, Value::String(s)) => Ok(Value::String(s)),
        (ExprType::String, value) => Ok(Value::String(value.to_string())),
        (_, value) => Ok(value),
    }
}

fn function(name: &str, args: Vec<Value>) -> QueryEngineResult<Value> {
    let first = args.first().cloned().unwrap_or(Value::Null);
    match name {
        "exists" => match first {
            Value::List(items) => Ok(Value::Bool(!items.is_empty())),
            Value::Null => Ok(Value::Bool(false)),
            other => Err(type_mismatch("exists()", &other)),
        },
        "size" => match first {
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            Value::Null => Ok(Value::Int(0)),
            other => Err(type_mismatch("size()", &other)),
        },
        "upper" | "lower" | "trim" | "length" => match first {
            Value::String(s) => Ok(match name {
                "upper" => Value::String(s.to_uppercase()),
                "lower" => Value::String(s.to_lowercase()),
                "trim" => Value::String(s.trim().to_string()),
                _ => Value::Int(s.chars().count() as i64),
            }),
            Value::Null => Ok(Value::Null),
            other => Err(type_mismatch(&format!("{}()", name), &other)),
        },
        "abs" => match first {
            Value::Int(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| QueryEngineError::IntegerOverflow(format!("abs({})", i))),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            Value::Null => Ok(Value::Null),
            other => Err(type_mismatch("abs()", &other)),
        },
        "concat" => {
            let mut result = String::new();
            for arg in args {
                match arg {
                    Value::Null => return Ok(Value::Null),
                    Value::String(s) => result.push_str(&s),
                    other => result.push_str(&other.to_string()),
                }
            }
            Ok(Value::String(result))
        }
        "replace" => match args.as_slice() {
            [Value::String(s), Value::String(from), Value::String(to)] => {
                Ok(Value::String(s.replace(from.as_str(), to)))
            }
            [a, b, c] if a.is_null() || b.is_null() || c.is_null() => Ok(Value::Null),
            _ => Err(type_mismatch("replace()", &first)),
        },
        "least" => Ok(extreme(args.iter(), Ordering::Less)),
        other => Err(QueryEngineError::UnknownFunction(other.to_string())),
    }
}

fn sum<'v>(values: impl Iterator<Item = &'v Value>) -> QueryEngineResult<Value> {
    let mut total: Option<Value> = None;
    for value in values.filter(|v| !v.is_null()) {
        total = Some(match total {
            None => value.clone(),
            Some(acc) => arithmetic(HqlBinaryOperator::Add, acc, value.clone())?,
        });
    }
    Ok(total.unwrap_or(Value::Null))
}

/// Smallest (`Less`) or largest (`Greater`) non-null value.
fn extreme<'v>(values: impl Iterator<Item = &'v Value>, wanted: Ordering) -> Value {
    values
        .filter(|v| !v.is_null())
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if v.sort_compare(b) != wanted => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

lazy_static! {
    static ref LIKE_TOKEN: Regex = Regex::new(r"[%_]").unwrap();
    static ref LIKE_TOKEN_BACKSLASH: Regex = Regex::new(r"[%_]|\\.").unwrap();
}

/// Compile a `like` pattern into an anchored regex.
///
/// `%` matches any run of characters and `_` any single character. With an
/// escape character, `<escape>x` matches `x` literally. Everything else is
/// matched literally, regex metacharacters included.
fn like_to_regex(pattern: &str, escape: Option<char>) -> QueryEngineResult<Regex> {
    let custom;
    let token: &Regex = match escape {
        None => &*LIKE_TOKEN,
        Some('\\') => &*LIKE_TOKEN_BACKSLASH,
        Some(c) => {
            custom = Regex::new(&format!("[%_]|{}.", regex::escape(&c.to_string())))?;
            &custom
        }
    };

    let mut re = String::from("(?s)^");
    let mut last = 0;
    for token in token.find_iter(pattern) {
        re.push_str(&regex::escape(&pattern[last..token.start()]));
        match token.as_str() {
            "%" => re.push_str(".*"),
            "_" => re.push('.'),
            escaped => {
                let literal: String = escaped.chars().skip(1).collect();
                re.push_str(&regex::escape(&literal));
            }
        }
        last = token.end();
    }
    re.push_str(&regex::escape(&pattern[last..]));
    re.push('$');
    Ok(Regex::new(&re)?)
}
