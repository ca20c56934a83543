use ghost_types::BlockId;
use std::fmt;

/// Errors surfaced by the DAG and the fork-choice strategies that sit on
/// top of it.
///
/// Following the teacher crate's own `Error<T>` (`consensus/fork_choice`):
/// a hand-written enum, no `thiserror`. Most variants are
/// consistency-violations and indicate a programmer error in a strategy
/// rather than a recoverable condition (see spec.md Error Handling Design).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A block was ingested whose parent is not a known node and is not the
    /// zero id. Not fatal: the DAG accepts the block as a forest root.
    UnknownParent(BlockId),
    /// `justify`/`finalize` were called with a block that is not known to
    /// the DAG.
    UnknownBlock(BlockId),
    /// `finalize` was called with a slot earlier than the current
    /// finalized slot, or `justify`/`finalize` ordering was violated
    /// (`finalized.slot <= justified.slot` broken).
    InvalidFinalize { finalized_slot: u64, justified_slot: u64 },
    /// A strategy's delta list did not agree with the node it names, or
    /// otherwise violated an internal invariant. These are all
    /// consistency-violations: aborts the run.
    InvalidNodeIndex(usize),
    InvalidDeltaLen { deltas: usize, expected: usize },
    DeltaOverflow(usize),
    MissingAncestorTableEntry,
    BestTargetInvariantBroken,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownParent(id) => write!(f, "block references unknown parent {}", id),
            Error::UnknownBlock(id) => write!(f, "unknown block {}", id),
            Error::InvalidFinalize {
                finalized_slot,
                justified_slot,
            } => write!(
                f,
                "invalid finalize: finalized.slot {} > justified.slot {}",
                finalized_slot, justified_slot
            ),
            Error::InvalidNodeIndex(i) => write!(f, "invalid node index {}", i),
            Error::InvalidDeltaLen { deltas, expected } => write!(
                f,
                "delta list length {} does not match expected {}",
                deltas, expected
            ),
            Error::DeltaOverflow(i) => write!(f, "weight overflow applying delta at node {}", i),
            Error::MissingAncestorTableEntry => {
                write!(f, "ancestor table missing an entry during logarithmic lookup")
            }
            Error::BestTargetInvariantBroken => {
                write!(f, "best-target invariant broken")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
