//! States domain models

mod detected;
mod states_for_node;

pub use detected::{DetectedError, OutcomeFailure};
pub use states_for_node::{class_in_scope, class_owner, EquivClass, StatesForNode};
