//! Common test utilities for ring-recordings-dl integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod mock_ring;

#[allow(unused_imports)]
pub use fixtures::*;
pub use mock_ring::*;
