//! Unit tests - Tests that exercise one component through the public API
//! without touching the filesystem beyond temporary files.

mod config_tests;
mod method_registry_tests;
