//! Unit tests for individual components

mod builders_test;
mod condition_test;
mod config_test;
mod dependency_test;
mod error_test;
mod pool_test;
mod util_test;
mod validation_test;
