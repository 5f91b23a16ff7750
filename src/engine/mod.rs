pub mod calculator;
pub mod classifier;
pub mod cycle;
pub mod summary;
pub mod verifier;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cycle::{run_cycle, CycleReport, EngineConfig};
