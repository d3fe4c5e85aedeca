//! Typed expression tree
//!
//! `Expr` is the immutable node graph produced by the client query API. Every
//! pass in the crate consumes it read-only and rebuilds new nodes instead of
//! mutating in place.
//!
//! Branch operands of [`ConditionalExpr`] and [`CoalesceExpr`] are optional so
//! that malformed trees arriving through deserialization can be represented and
//! reported as [`LogicalExprError`] instead of being silently coerced.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query_planner::query_model::QueryModel;

use errors::{BranchSide, LogicalExprError};

pub mod errors;
pub mod visitors;

/// Static type of an expression node.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub enum ExprType {
    Bool,
    Int,
    Decimal,
    String,
    /// Untyped value (`(object)x` in the client API)
    Object,
    Nullable(Box<ExprType>),
    /// A row of a mapped entity, e.g. `Invoice`
    Entity(String),
    Collection(Box<ExprType>),
}

impl ExprType {
    pub fn entity(name: impl Into<String>) -> Self {
        ExprType::Entity(name.into())
    }

    pub fn nullable(inner: ExprType) -> Self {
        match inner {
            ExprType::Nullable(_) => inner,
            other => ExprType::Nullable(Box::new(other)),
        }
    }

    pub fn collection_of(element: ExprType) -> Self {
        ExprType::Collection(Box::new(element))
    }

    /// The type with any `Nullable` wrapper removed.
    pub fn non_nullable(&self) -> &ExprType {
        match self {
            ExprType::Nullable(inner) => inner.non_nullable(),
            other => other,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.non_nullable(), ExprType::Collection(_))
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.non_nullable(), ExprType::Entity(_))
    }

    /// Collections and entity rows, as opposed to scalar values.
    pub fn is_row_or_collection(&self) -> bool {
        self.is_collection() || self.is_entity()
    }

    /// Two branch types are compatible when they agree once nullability is
    /// ignored, or when either side is the untyped `Object`.
    pub fn is_compatible_with(&self, other: &ExprType) -> bool {
        let (left, right) = (self.non_nullable(), other.non_nullable());
        if left == right || *left == ExprType::Object || *right == ExprType::Object {
            return true;
        }
        match (left, right) {
            (ExprType::Collection(l), ExprType::Collection(r)) => l.is_compatible_with(r),
            (ExprType::Int, ExprType::Decimal) | (ExprType::Decimal, ExprType::Int) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprType::Bool => write!(f, "Boolean"),
            ExprType::Int => write!(f, "Int32"),
            ExprType::Decimal => write!(f, "Decimal"),
            ExprType::String => write!(f, "String"),
            ExprType::Object => write!(f, "Object"),
            ExprType::Nullable(inner) => write!(f, "{}?", inner),
            ExprType::Entity(name) => write!(f, "{}", name),
            ExprType::Collection(element) => write!(f, "IEnumerable<{}>", element),
        }
    }
}

/// Structural key of a method: declaring type, name and parameter types.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub struct MethodSignature {
    pub declaring_type: String,
    pub name: String,
    pub parameter_types: Vec<ExprType>,
}

impl MethodSignature {
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        parameter_types: Vec<ExprType>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types,
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.parameter_types.iter().map(|t| t.to_string()).collect();
        write!(f, "{}.{}({})", self.declaring_type, self.name, params.join(", "))
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Root queryable over all rows of an entity, e.g. `session.Query<Invoice>()`
    Queryable(String),
}

impl Literal {
    pub fn expr_type(&self) -> ExprType {
        match self {
            Literal::Null => ExprType::Object,
            Literal::Boolean(_) => ExprType::Bool,
            Literal::Integer(_) => ExprType::Int,
            Literal::Float(_) => ExprType::Decimal,
            Literal::String(_) => ExprType::String,
            Literal::Queryable(entity) => ExprType::collection_of(ExprType::entity(entity.clone())),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Negate,
    /// Cast to the node's declared type
    Convert,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub operator: UnaryOperator,
    pub operand: Box<Expr>,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub operator: BinaryOperator,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

/// Property or field access, e.g. `e.Amount`
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MemberAccess {
    pub target: Box<Expr>,
    pub member: String,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: MethodSignature,
    /// `None` for static methods
    pub target: Option<Box<Expr>>,
    pub args: Vec<Expr>,
    pub ty: ExprType,
}

/// Ternary `test ? if_true : if_false`
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ConditionalExpr {
    pub test: Box<Expr>,
    pub if_true: Option<Box<Expr>>,
    pub if_false: Option<Box<Expr>>,
}

impl ConditionalExpr {
    pub fn if_true(&self) -> Result<&Expr, LogicalExprError> {
        self.if_true
            .as_deref()
            .ok_or(LogicalExprError::MissingBranch(BranchSide::IfTrue))
    }

    pub fn if_false(&self) -> Result<&Expr, LogicalExprError> {
        self.if_false
            .as_deref()
            .ok_or(LogicalExprError::MissingBranch(BranchSide::IfFalse))
    }

    /// Both branches present and type-compatible.
    pub fn check_branch_types(&self) -> Result<(), LogicalExprError> {
        check_branch_pair(self.if_true()?, self.if_false()?)
    }
}

/// Null-coalescing `left ?? right`
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CoalesceExpr {
    pub left: Option<Box<Expr>>,
    pub right: Option<Box<Expr>>,
}

impl CoalesceExpr {
    pub fn left(&self) -> Result<&Expr, LogicalExprError> {
        self.left
            .as_deref()
            .ok_or(LogicalExprError::MissingBranch(BranchSide::CoalesceLeft))
    }

    pub fn right(&self) -> Result<&Expr, LogicalExprError> {
        self.right
            .as_deref()
            .ok_or(LogicalExprError::MissingBranch(BranchSide::CoalesceRight))
    }

    pub fn check_branch_types(&self) -> Result<(), LogicalExprError> {
        check_branch_pair(self.left()?, self.right()?)
    }
}

fn check_branch_pair(left: &Expr, right: &Expr) -> Result<(), LogicalExprError> {
    let (left_ty, right_ty) = (left.ty(), right.ty());
    // A null literal is compatible with every branch type
    let either_null = matches!(left, Expr::Constant(Literal::Null))
        || matches!(right, Expr::Constant(Literal::Null));
    if either_null || left_ty.is_compatible_with(&right_ty) {
        Ok(())
    } else {
        Err(LogicalExprError::IncompatibleBranchTypes {
            left: left_ty.to_string(),
            right: right_ty.to_string(),
        })
    }
}

/// Denotes an element of the query source named `source` (a main from
/// clause item or a join item).
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct QuerySourceRef {
    pub source: String,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SubQueryExpr {
    pub model: Box<QueryModel>,
}

impl SubQueryExpr {
    pub fn new(model: QueryModel) -> Self {
        Self {
            model: Box::new(model),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Expr {
    Constant(Literal),

    Parameter(Parameter),

    Unary(UnaryExpr),

    Binary(BinaryExpr),

    MemberAccess(MemberAccess),

    MethodCall(MethodCall),

    Conditional(ConditionalExpr),

    Coalesce(CoalesceExpr),

    QuerySourceRef(QuerySourceRef),

    SubQuery(SubQueryExpr),
}

impl Expr {
    pub fn constant(value: Literal) -> Self {
        Expr::Constant(value)
    }

    pub fn int(value: i64) -> Self {
        Expr::Constant(Literal::Integer(value))
    }

    pub fn queryable(entity: impl Into<String>) -> Self {
        Expr::Constant(Literal::Queryable(entity.into()))
    }

    pub fn parameter(name: impl Into<String>, ty: ExprType) -> Self {
        Expr::Parameter(Parameter {
            name: name.into(),
            ty,
        })
    }

    pub fn source(name: impl Into<String>, ty: ExprType) -> Self {
        Expr::QuerySourceRef(QuerySourceRef {
            source: name.into(),
            ty,
        })
    }

    pub fn member(target: Expr, member: impl Into<String>, ty: ExprType) -> Self {
        Expr::MemberAccess(MemberAccess {
            target: Box::new(target),
            member: member.into(),
            ty,
        })
    }

    pub fn convert(operand: Expr, ty: ExprType) -> Self {
        Expr::Unary(UnaryExpr {
            operator: UnaryOperator::Convert,
            operand: Box::new(operand),
            ty,
        })
    }

    pub fn not(operand: Expr) -> Self {
        Expr::Unary(UnaryExpr {
            operator: UnaryOperator::Not,
            operand: Box::new(operand),
            ty: ExprType::Bool,
        })
    }

    pub fn binary(operator: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary(BinaryExpr {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn method_call(
        method: MethodSignature,
        target: Option<Expr>,
        args: Vec<Expr>,
        ty: ExprType,
    ) -> Self {
        Expr::MethodCall(MethodCall {
            method,
            target: target.map(Box::new),
            args,
            ty,
        })
    }

    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Self {
        Expr::Conditional(ConditionalExpr {
            test: Box::new(test),
            if_true: Some(Box::new(if_true)),
            if_false: Some(Box::new(if_false)),
        })
    }

    pub fn coalesce(left: Expr, right: Expr) -> Self {
        Expr::Coalesce(CoalesceExpr {
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        })
    }

    pub fn subquery(model: QueryModel) -> Self {
        Expr::SubQuery(SubQueryExpr::new(model))
    }

    /// Static type of this node. Branching nodes report the type of their
    /// first present branch.
    pub fn ty(&self) -> ExprType {
        match self {
            Expr::Constant(literal) => literal.expr_type(),
            Expr::Parameter(param) => param.ty.clone(),
            Expr::Unary(unary) => match unary.operator {
                UnaryOperator::Not => ExprType::Bool,
                UnaryOperator::Negate => unary.operand.ty(),
                UnaryOperator::Convert => unary.ty.clone(),
            },
            Expr::Binary(binary) => {
                if binary.operator.is_arithmetic() {
                    binary.left.ty()
                } else {
                    ExprType::Bool
                }
            }
            Expr::MemberAccess(member) => member.ty.clone(),
            Expr::MethodCall(call) => call.ty.clone(),
            Expr::Conditional(cond) => cond
                .if_true
                .as_deref()
                .or(cond.if_false.as_deref())
                .map(Expr::ty)
                .unwrap_or(ExprType::Object),
            Expr::Coalesce(coalesce) => coalesce
                .left
                .as_deref()
                .or(coalesce.right.as_deref())
                .map(|e| e.ty().non_nullable().clone())
                .unwrap_or(ExprType::Object),
            Expr::QuerySourceRef(source) => source.ty.clone(),
            Expr::SubQuery(subquery) => subquery.model.result_type(),
        }
    }

    pub fn is_branching(&self) -> bool {
        matches!(self, Expr::Conditional(_) | Expr::Coalesce(_))
    }

    /// Whether a conditional/coalesce at this exact position may be expanded
    /// into one copy of its consumer per branch.
    ///
    /// The node itself must be the branching expression (a cast or operator
    /// around it disqualifies it) and it must denote a collection or a row,
    /// never a scalar value.
    pub fn is_expandable_branching(&self) -> bool {
        self.is_branching() && self.ty().is_row_or_collection()
    }

    /// Check that the branches of a conditional or coalesce node are present
    /// and type-compatible. Other nodes are always valid.
    pub fn check_branch_types(&self) -> Result<(), LogicalExprError> {
        match self {
            Expr::Conditional(cond) => cond.check_branch_types(),
            Expr::Coalesce(coalesce) => coalesce.check_branch_types(),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::String(s) => write!(f, "\"{}\"", s),
            Literal::Queryable(entity) => write!(f, "Query<{}>", entity),
        }
    }
}

fn fmt_optional(expr: &Option<Box<Expr>>) -> String {
    match expr {
        Some(e) => e.to_string(),
        None => "<missing>".to_string(),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(literal) => write!(f, "{}", literal),
            Expr::Parameter(param) => write!(f, "${}", param.name),
            Expr::Unary(unary) => match unary.operator {
                UnaryOperator::Not => write!(f, "!({})", unary.operand),
                UnaryOperator::Negate => write!(f, "-({})", unary.operand),
                UnaryOperator::Convert => write!(f, "(({}){})", unary.ty, unary.operand),
            },
            Expr::Binary(binary) => write!(
                f,
                "({} {} {})",
                binary.left,
                binary.operator.symbol(),
                binary.right
            ),
            Expr::MemberAccess(member) => write!(f, "{}.{}", member.target, member.member),
            Expr::MethodCall(call) => {
                let args: Vec<String> = call.args.iter().map(|a| a.to_string()).collect();
                match &call.target {
                    Some(target) => write!(f, "{}.{}({})", target, call.method.name, args.join(", ")),
                    None => write!(
                        f,
                        "{}.{}({})",
                        call.method.declaring_type,
                        call.method.name,
                        args.join(", ")
                    ),
                }
            }
            Expr::Conditional(cond) => write!(
                f,
                "({} ? {} : {})",
                cond.test,
                fmt_optional(&cond.if_true),
                fmt_optional(&cond.if_false)
            ),
            Expr::Coalesce(coalesce) => write!(
                f,
                "({} ?? {})",
                fmt_optional(&coalesce.left),
                fmt_optional(&coalesce.right)
            ),
            Expr::QuerySourceRef(source) => write!(f, "[{}]", source.source),
            Expr::SubQuery(subquery) => write!(f, "{{{}}}", subquery.model),
        }
    }
}
