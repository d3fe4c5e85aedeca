//! Query planning: the typed expression tree, the query model built from it,
//! and the rewrite passes that normalize a model before lowering.

pub mod logical_expr;
pub mod query_model;
pub mod rewriter;
pub mod transformed;

pub use logical_expr::{Expr, ExprType, Literal, MethodSignature};
pub use query_model::QueryModel;
