//! Component H (SPEC_FULL.md §4.6): the deterministic stochastic block/
//! attestation generator that drives a `ghost_chain::Chain` for the
//! `ghost-bench` CLI. Grounded in the original `sim` Go package
//! (`sim/simulation.go`, `sim/sim_chain.go`, `sim/config.go`).

mod config;
mod driver;

pub use config::{ConfigError, SimConfig};
pub use driver::{genesis_id, Simulation};
