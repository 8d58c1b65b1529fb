//! Engine configuration
//!
//! Limits for one analysis run. Every fixed-point pass, the supergraph and
//! the exploded graph are bounded; hitting a bound is reported, never
//! silently truncated.

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Preset the limits were derived from
    pub preset: Preset,

    /// Worklist iterations allowed per fixed-point pass
    pub max_fixpoint_iterations: usize,

    /// Supergraphs larger than this are reported as too complex
    pub max_supergraph_nodes: usize,

    /// Exploded graphs larger than this are reported as too complex
    pub max_exploded_nodes: usize,

    /// Facts/prune repetitions over the exploded graph
    pub max_prune_rounds: usize,

    /// Attach witness notes to reports
    pub emit_notes: bool,
}

impl EngineConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                preset,
                max_fixpoint_iterations: 50_000,
                max_supergraph_nodes: 5_000,
                max_exploded_nodes: 20_000,
                max_prune_rounds: 4,
                emit_notes: false,
            },
            Preset::Balanced => Self {
                preset,
                max_fixpoint_iterations: 200_000,
                max_supergraph_nodes: 50_000,
                max_exploded_nodes: 200_000,
                max_prune_rounds: 16,
                emit_notes: true,
            },
            Preset::Thorough => Self {
                preset,
                max_fixpoint_iterations: 2_000_000,
                max_supergraph_nodes: 500_000,
                max_exploded_nodes: 2_000_000,
                max_prune_rounds: 64,
                emit_notes: true,
            },
        }
    }

    /// Builder: Set per-pass iteration cap
    pub fn with_max_fixpoint_iterations(mut self, limit: usize) -> Self {
        self.max_fixpoint_iterations = limit;
        self
    }

    /// Builder: Set supergraph size cap
    pub fn with_max_supergraph_nodes(mut self, limit: usize) -> Self {
        self.max_supergraph_nodes = limit;
        self
    }

    /// Builder: Set exploded graph size cap
    pub fn with_max_exploded_nodes(mut self, limit: usize) -> Self {
        self.max_exploded_nodes = limit;
        self
    }

    /// Builder: Set prune round cap
    pub fn with_max_prune_rounds(mut self, rounds: usize) -> Self {
        self.max_prune_rounds = rounds;
        self
    }

    /// Builder: Toggle witness notes
    pub fn with_notes(mut self, emit: bool) -> Self {
        self.emit_notes = emit;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_fixpoint_iterations == 0 || self.max_fixpoint_iterations > 100_000_000 {
            return Err(ConfigError::range_with_hint(
                "max_fixpoint_iterations",
                self.max_fixpoint_iterations,
                1,
                100_000_000,
                "Each fixed-point pass needs at least one iteration",
            ));
        }

        if self.max_supergraph_nodes == 0 || self.max_supergraph_nodes > 10_000_000 {
            return Err(ConfigError::range_with_hint(
                "max_supergraph_nodes",
                self.max_supergraph_nodes,
                1,
                10_000_000,
                "Supergraph size cap must be reasonable",
            ));
        }

        if self.max_exploded_nodes < self.max_supergraph_nodes.min(1_000)
            || self.max_exploded_nodes > 100_000_000
        {
            return Err(ConfigError::range_with_hint(
                "max_exploded_nodes",
                self.max_exploded_nodes,
                self.max_supergraph_nodes.min(1_000),
                100_000_000,
                "The exploded graph is never smaller than the supergraph",
            ));
        }

        if self.max_prune_rounds == 0 || self.max_prune_rounds > 1_000 {
            return Err(ConfigError::range_with_hint(
                "max_prune_rounds",
                self.max_prune_rounds,
                1,
                1_000,
                "At least one pruning round is required",
            ));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}
