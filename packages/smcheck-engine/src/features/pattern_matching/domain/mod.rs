//! Pattern matching domain models

mod matched;

pub use matched::{Match, PossibleMatch};
