//! Pattern matching application layer

mod leaks;
mod matcher;
mod precompute;

pub use leaks::{find_leaks, Leaks};
pub use matcher::Matcher;
pub use precompute::{precompute_possible_matches, PossibleMatches};
