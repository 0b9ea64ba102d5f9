//! # skysim-engine
//!
//! Scenario runtime: wires the simulation clock, the feed connector,
//! the reconciler and the traffic collaborator into one tick loop.

pub mod error;
pub mod runtime;

pub use error::EngineError;
pub use runtime::{ScenarioRuntime, SimulationContext};
