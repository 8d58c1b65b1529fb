pub mod fact;
pub mod facts;

pub use fact::Fact;
pub use facts::{Facts, Partition};
