//! Turns detected errors into reports, dropping the unreachable ones

use super::domain::Report;
use super::witness::{build_report, ShortestPaths};
use crate::features::exploded_graph::ExplodedGraph;
use crate::features::states::DetectedError;
use tracing::info;

/// Reports that survived the reachability check, plus the errors dropped
#[derive(Debug, Clone, Default)]
pub struct ReportBatch {
    pub reports: Vec<Report>,
    pub suppressed: Vec<DetectedError>,
}

pub fn report_errors(
    exploded: &ExplodedGraph<'_>,
    errors: Vec<DetectedError>,
    machine: &str,
    emit_notes: bool,
) -> ReportBatch {
    let paths = ShortestPaths::from_entry(exploded);
    let mut batch = ReportBatch::default();
    for error in errors {
        match build_report(exploded, &paths, &error, machine, emit_notes) {
            Some(report) => batch.reports.push(report),
            None => batch.suppressed.push(error),
        }
    }
    info!(
        machine,
        reported = batch.reports.len(),
        suppressed = batch.suppressed.len(),
        "errors reported"
    );
    batch
}
