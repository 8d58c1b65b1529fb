//! Runs every machine of a checker over one program

use super::analysis::StateMachineAnalysis;
use super::result::MachineRun;
use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::shared::ports::{CheckerProvider, SupergraphProvider};
use tracing::info;

/// All machines are compiled before any is run, so a broken checker fails
/// without analysing anything
pub fn run_checker<C, P>(checker: &C, program: &P, config: &EngineConfig) -> EngineResult<Vec<MachineRun>>
where
    C: CheckerProvider + ?Sized,
    P: SupergraphProvider + ?Sized,
{
    let checker = checker.checker()?;
    let analyses = checker
        .machines
        .iter()
        .map(|machine| StateMachineAnalysis::new(machine, config.clone()))
        .collect::<EngineResult<Vec<_>>>()?;

    let supergraph = program.supergraph()?;
    info!(
        checker = %checker.name,
        machines = analyses.len(),
        nodes = supergraph.node_count(),
        "running checker"
    );

    analyses
        .iter()
        .map(|analysis| {
            Ok(MachineRun {
                machine: analysis.machine().name().to_string(),
                outcome: analysis.run(&supergraph)?,
            })
        })
        .collect()
}
