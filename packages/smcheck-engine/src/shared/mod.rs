//! Shared module - Common types used by every feature
//!
//! Contains the collaborator-facing program model (expressions, statements,
//! supergraph) and the ports through which collaborators feed the engine.

pub mod models;
pub mod ports;

// Re-exports for convenience
pub use models::*;
