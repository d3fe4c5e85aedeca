//! Integration tests - full translation pipeline from query model to HQL and
//! in-memory evaluation.

mod expansion_regression_tests;
mod invoice_fixtures;
mod subquery_expansion_tests;
