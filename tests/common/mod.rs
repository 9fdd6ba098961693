//! Common test utilities for taxi-replay integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod sink;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use sink::*;
