//! Checker application layer

mod compiled;

pub use compiled::CompiledMachine;
