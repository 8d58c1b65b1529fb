//! Pipeline orchestration

pub mod analysis;
pub mod driver;
pub mod result;
pub mod solution;

pub use analysis::StateMachineAnalysis;
pub use driver::run_checker;
pub use result::{AnalysisOutcome, AnalysisReport, AnalysisStats, ComplexityLimit, MachineRun};
pub use solution::Solution;
