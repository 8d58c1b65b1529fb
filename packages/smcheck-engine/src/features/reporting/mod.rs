//! Error/witness reporting
//!
//! Checks every detected error for reachability in the pruned exploded graph
//! and renders the survivors with a shortest witness trace.

pub mod domain;
pub mod reporter;
pub mod witness;

pub use domain::{render_reports, Note, Report};
pub use reporter::{report_errors, ReportBatch};
pub use witness::{build_report, find_target, ShortestPaths};
