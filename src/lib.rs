//! queryweave - typed object queries to HQL
//!
//! This crate normalizes strongly-typed object-query expression trees and
//! lowers them to an HQL tree:
//! - Query models built from a closed expression tree
//! - Rewrite passes, including the subquery conditional/coalesce expansion
//! - A signature-keyed method translation registry with overridable defaults
//! - HQL generation, rendering and in-memory evaluation

pub mod config;
pub mod hql_generator;
pub mod query_engine;
pub mod query_planner;
pub mod translation;
