//! Component F of spec.md §4.4: a single facade over whichever of the six
//! fork-choice engines a run is configured with, plus the CSV
//! visualization writer (SPEC_FULL.md §4.5) that reads it back out.
//! Grounded in `eth2/chain/chain.go`'s `BeaconChain` and `viz/viz.go`'s
//! `CreateVizGraph`.

mod chain;
mod error;
pub mod visualize;

pub use chain::{Chain, ForkChoiceRule, NodeSummary, Role};
pub use error::{Error, Result};
