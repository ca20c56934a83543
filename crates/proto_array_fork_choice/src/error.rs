use ghost_types::BlockId;
use std::fmt;

/// Errors surfaced by the contiguous-array strategy. Kept separate from
/// `ghost_dag::Error` since this crate keeps its own block store instead
/// of sharing `ghost_dag::Arena` -- see `choices/proto_array/proto_array.go`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    UnknownBlock(BlockId),
    InvalidNodeIndex(usize),
    InvalidFinalize { finalized_slot: u64, justified_slot: u64 },
    DeltaOverflow(usize),
    IndexOverflow(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownBlock(id) => write!(f, "unknown block {}", id),
            Error::InvalidNodeIndex(i) => write!(f, "invalid node index {}", i),
            Error::InvalidFinalize {
                finalized_slot,
                justified_slot,
            } => write!(
                f,
                "invalid finalize: finalized.slot {} > justified.slot {}",
                finalized_slot, justified_slot
            ),
            Error::DeltaOverflow(i) => write!(f, "weight overflow applying delta at node {}", i),
            Error::IndexOverflow(field) => write!(f, "index overflow adjusting {} during prune", field),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
