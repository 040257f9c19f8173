//! Schema module - Run configuration and population types.

mod config;
mod population;

pub use config::*;
pub use population::*;
