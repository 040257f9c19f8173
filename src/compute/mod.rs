//! Compute module - Task substrate and the evolution pipeline.

pub mod evolution;
pub mod substrate;
