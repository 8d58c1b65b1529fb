//! Error types for smcheck-engine
//!
//! Checker-load failures, internal analysis failures and configuration
//! problems. Bugs found in the analyzed program are not errors in this sense;
//! they are the engine's output (see `features::reporting`).

use crate::config::ConfigError;
use crate::shared::models::Location;
use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// A state named in a state clause can never be entered
    #[error("{}unreachable state '{state}'", at(.location))]
    UnreachableState {
        state: String,
        location: Option<Location>,
    },

    /// A pattern refers to an undeclared name
    #[error("{}unknown declaration '{name}'. {suggestion}", at(.location))]
    UnknownDecl {
        name: String,
        suggestion: String,
        location: Option<Location>,
    },

    /// A pattern refers to an undefined (or self-referencing) named pattern
    #[error("{}unknown named pattern '{name}'", at(.location))]
    UnknownNamedPattern {
        name: String,
        location: Option<Location>,
    },

    #[error("{}malformed pattern: {reason}", at(.location))]
    MalformedPattern {
        reason: String,
        location: Option<Location>,
    },

    #[error("state machine '{machine}' has no stateful declaration")]
    NoStatefulDecl { machine: String },

    /// Iteration cap exceeded; always an internal failure, never a partial result
    #[error("fixed point for {pass} did not converge within {limit} iterations")]
    FixpointNotConverged { pass: String, limit: usize },

    #[error("invalid supergraph: {0}")]
    InvalidSupergraph(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn malformed(reason: impl Into<String>, location: Option<Location>) -> Self {
        EngineError::MalformedPattern {
            reason: reason.into(),
            location,
        }
    }

    /// DSL source location for checker-load errors
    pub fn location(&self) -> Option<&Location> {
        match self {
            EngineError::UnreachableState { location, .. }
            | EngineError::UnknownDecl { location, .. }
            | EngineError::UnknownNamedPattern { location, .. }
            | EngineError::MalformedPattern { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}

fn at(location: &Option<Location>) -> String {
    match location {
        Some(location) => format!("{}: ", location),
        None => String::new(),
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;
