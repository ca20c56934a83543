//! The shared DAG substrate (spec.md §4, components A-C) used by every
//! fork-choice strategy except the contiguous-array one, which keeps its
//! own self-contained representation in the `proto_array_fork_choice`
//! crate.

mod aggregator;
mod arena;
mod beacon_dag;
mod error;
mod fork_choice;

pub use aggregator::AttestationAggregator;
pub use arena::{Arena, DagNode, NodeIndex};
pub use beacon_dag::BeaconDag;
pub use error::{Error, Result};
pub use fork_choice::ForkChoice;
