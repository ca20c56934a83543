//! The contiguous-array LMD-GHOST strategy (spec.md §4.3.f). Unlike the
//! five strategies in the `fork_choice` crate, this one does not sit on
//! top of `ghost_dag::Arena`: it keeps its own flat, append-only node
//! store and a pair of diff-array back-propagation passes instead of
//! per-node pointer chasing. Only `ghost_dag::AttestationAggregator` is
//! shared with the rest of the workbench.

mod error;
mod proto_array;

pub use error::{Error, Result};
pub use proto_array::{ProtoArrayForkChoice, ProtoNode};
