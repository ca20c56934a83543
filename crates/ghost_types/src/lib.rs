//! Core domain types shared by the DAG, the fork-choice strategies and the
//! simulation driver: block identity, validator identity and the immutable
//! `Block` as it arrives from the outside world.

mod block_id;

pub use block_id::BlockId;

/// A slot is a monotonic time unit; a block's position in time. Slots may be
/// skipped, so `Slot` is not the same as `Height`.
pub type Slot = u64;

/// A block's depth in DAG edges from genesis. Unlike `Slot`, `Height` never
/// skips: `height = parent.height + 1`.
pub type Height = u64;

/// The index of a validator in the simulated population.
pub type ValidatorId = u64;

/// An immutable block as it arrives from the simulation driver. Once
/// ingested into the DAG it is never mutated; the DAG node tracks mutable
/// fork-choice state separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub parent: BlockId,
    pub hash: BlockId,
    pub proposer: ValidatorId,
    pub slot: Slot,
}

/// A single validator's vote, as received from the outside world. `weight`
/// is unsigned; the aggregator is responsible for turning target changes
/// into signed deltas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attestation {
    pub target: BlockId,
    pub attester: ValidatorId,
    pub weight: u64,
}

/// `EPOCH_LENGTH` consecutive slots make up an epoch. Fixed at compile time
/// per the configuration surface.
pub const EPOCH_LENGTH: u64 = 64;
