use crate::query_planner::query_model::QueryModel;

pub mod errors;
pub mod expression_lowering;
pub mod hql_ast;
pub mod method_generators;
pub mod method_registry;
mod to_hql;
pub mod tree_builder;

pub use errors::HqlGeneratorError;
pub use expression_lowering::HqlGeneratorVisitor;
pub use hql_ast::{HqlAggregate, HqlNode, HqlQuery};
pub use method_registry::{
    default_registry, ArgumentExpansion, HqlGeneratorResult, MethodCallContext, MethodGenerator,
    MethodHandler, MethodRegistry,
};
pub use to_hql::ToHql;
pub use tree_builder::HqlTreeBuilder;

pub fn generate_hql(
    model: &QueryModel,
    registry: &MethodRegistry,
    max_subquery_depth: u32,
) -> HqlGeneratorResult<HqlQuery> {
    expression_lowering::generate_hql(model, registry, max_subquery_depth)
}
