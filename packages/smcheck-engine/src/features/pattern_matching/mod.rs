//! Pattern matching
//!
//! Structural matching of checker patterns against statements, leak
//! discovery at function exits, and per-edge precomputation of the rules
//! that may fire.

pub mod application;
pub mod domain;

pub use application::{find_leaks, precompute_possible_matches, Leaks, Matcher, PossibleMatches};
pub use domain::{Match, PossibleMatch};
