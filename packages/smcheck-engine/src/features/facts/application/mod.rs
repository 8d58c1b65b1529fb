pub mod interprocedural;
pub mod transfer;

pub use transfer::{transfer_edge, FactsContext};
