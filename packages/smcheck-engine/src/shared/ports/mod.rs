//! Ports - interfaces implemented by external collaborators
//!
//! The host compiler integration supplies the supergraph, the DSL parser
//! supplies the checker. The engine never builds either itself.

use crate::errors::EngineResult;
use crate::features::checker::Checker;
use crate::shared::models::Supergraph;

/// Host-compiler side: builds the interprocedural supergraph
pub trait SupergraphProvider {
    fn supergraph(&self) -> EngineResult<Supergraph>;
}

/// DSL side: parses checker source into its in-memory form
pub trait CheckerProvider {
    fn checker(&self) -> EngineResult<Checker>;
}

impl SupergraphProvider for Supergraph {
    fn supergraph(&self) -> EngineResult<Supergraph> {
        Ok(self.clone())
    }
}

impl CheckerProvider for Checker {
    fn checker(&self) -> EngineResult<Checker> {
        Ok(self.clone())
    }
}
