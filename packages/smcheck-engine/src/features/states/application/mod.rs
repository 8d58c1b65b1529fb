//! States application layer

mod context;
mod transfer;

pub use context::AnalysisContext;
pub use transfer::transfer_edge;
