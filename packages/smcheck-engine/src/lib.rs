/*
 * smcheck-engine - Interprocedural State-Machine Checking Engine
 *
 * Feature-First Architecture:
 * - shared/      : Program model (expressions, statements, supergraph) and ports
 * - features/    : Vertical slices (fixpoint → facts → matching → states → exploded graph → reporting)
 * - pipeline/    : Staged orchestration of one run per state machine
 * - config/      : Presets, limits and YAML loading
 *
 * Pipeline:
 *   Facts → possible matches → States → exploded graph → Facts again → witness reports
 */

#![allow(clippy::too_many_arguments)] // Transfer helpers thread graph + context + edge
#![allow(clippy::type_complexity)] // Nested lattice maps
#![allow(clippy::new_without_default)] // Default not meaningful for analysis contexts
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::unnecessary_map_or)] // map_or style for compatibility

pub mod config;
pub mod errors;
pub mod features;
pub mod pipeline;
pub mod shared;

pub use config::{EngineConfig, Preset};
pub use errors::{EngineError, EngineResult};
pub use features::checker::{Checker, CompiledMachine, Outcome, Pattern, State, StateMachine};
pub use features::reporting::{Note, Report};
pub use pipeline::{run_checker, AnalysisOutcome, AnalysisReport, StateMachineAnalysis, Solution};
pub use shared::models::{Expr, Location, Statement, Supergraph, SupergraphBuilder};
