//! Common test utilities for smcheck-engine
//!
//! Shared checker fixtures, a line-numbered program builder and
//! domain-specific assertions for the integration tests.

#![allow(dead_code)]

mod assertions;
mod builders;
mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
