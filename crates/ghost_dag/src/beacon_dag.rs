use crate::aggregator::AttestationAggregator;
use crate::arena::{Arena, NodeIndex};
use crate::error::{Error, Result};
use crate::fork_choice::ForkChoice;
use ghost_types::{Attestation, Block, BlockId, Slot};

/// Component C of spec.md §4: the ingest/query surface shared by every
/// strategy, generic over which `ForkChoice` rule is wired in. Mirrors
/// `eth2/dag/dag.go`'s `BeaconDag`, but the pointer graph of the Go
/// original becomes an `Arena` underneath.
pub struct BeaconDag<F: ForkChoice> {
    arena: Arena,
    aggregator: AttestationAggregator,
    strategy: F,
    justified: NodeIndex,
    finalized: NodeIndex,
}

impl<F: ForkChoice> BeaconDag<F> {
    pub fn new(genesis: BlockId, genesis_slot: Slot, strategy: F) -> Self {
        let (arena, genesis_index) = Arena::new(genesis, genesis_slot);
        let mut dag = BeaconDag {
            arena,
            aggregator: AttestationAggregator::new(),
            strategy,
            justified: genesis_index,
            finalized: genesis_index,
        };
        dag.strategy.on_new_node(&mut dag.arena, genesis_index);
        dag
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn strategy(&self) -> &F {
        &self.strategy
    }

    pub fn justified_block(&self) -> BlockId {
        self.arena.key_of(self.justified)
    }

    pub fn finalized_block(&self) -> BlockId {
        self.arena.key_of(self.finalized)
    }

    /// Ingests a new block. An unknown parent is tolerated: the block is
    /// accepted as a forest root (spec.md §4.2, edge case "orphan
    /// block").
    pub fn block_in(&mut self, block: Block) -> NodeIndex {
        let parent = if block.parent.is_zero() {
            None
        } else {
            Some(block.parent)
        };
        let index = self.arena.insert(block.hash, block.slot, parent);
        self.strategy.on_new_node(&mut self.arena, index);
        index
    }

    /// Ingests a single attestation into the aggregator. Returns `true`
    /// if it was accepted; callers that want the weight change reflected
    /// in fork choice must still call `apply_pending_deltas`.
    pub fn attestation_in(&mut self, att: Attestation) -> bool {
        let arena = &self.arena;
        self.aggregator.ingest(att, |id| arena.slot_of(&id))
    }

    /// Flushes every unflushed aggregator delta into the active strategy.
    /// Call after a batch of `attestation_in` calls and before `head`.
    pub fn apply_pending_deltas(&mut self) -> Result<()> {
        let deltas = self.aggregator.drain_deltas();
        if deltas.is_empty() {
            return Ok(());
        }
        let mut resolved = Vec::with_capacity(deltas.len());
        for (target, delta) in deltas {
            if let Some(index) = self.arena.index_of(&target) {
                resolved.push((index, delta));
            }
        }
        self.strategy.apply_score_changes(&mut self.arena, &resolved)?;
        self.aggregator.cleanup();
        Ok(())
    }

    /// Advances the justified checkpoint. The new justified block must be
    /// known and must not regress behind the current finalized slot.
    pub fn justify(&mut self, block: BlockId) -> Result<()> {
        let index = self.arena.index_of(&block).ok_or(Error::UnknownBlock(block))?;
        self.justified = index;
        Ok(())
    }

    /// Advances the finalized checkpoint and prunes every node at an
    /// earlier slot. Requires `finalized.slot <= justified.slot`
    /// (invariant 6).
    pub fn finalize(&mut self, block: BlockId) -> Result<()> {
        let index = self.arena.index_of(&block).ok_or(Error::UnknownBlock(block))?;
        let finalized_slot = self.arena.get(index).slot;
        let justified_slot = self.arena.get(self.justified).slot;
        if finalized_slot > justified_slot {
            return Err(Error::InvalidFinalize {
                finalized_slot,
                justified_slot,
            });
        }

        self.finalized = index;
        let pruned = self.arena.prune(finalized_slot);
        if !pruned.is_empty() {
            self.strategy.on_prune(&mut self.arena, &pruned);
            let pruned_keys: std::collections::HashSet<BlockId> =
                pruned.iter().map(|i| self.arena.key_of(*i)).collect();
            self.aggregator.forget_targets(|id| pruned_keys.contains(id));
        }
        Ok(())
    }

    /// Returns the current canonical head as selected by the active
    /// strategy, descending from the justified checkpoint.
    pub fn head(&self) -> Result<BlockId> {
        let index = self.strategy.head(&self.arena, self.justified)?;
        Ok(self.arena.key_of(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trivial strategy used only to exercise `BeaconDag` plumbing: head is
    /// always whichever node was inserted most recently.
    #[derive(Default)]
    struct LastInserted {
        last: Option<NodeIndex>,
    }

    impl ForkChoice for LastInserted {
        fn on_new_node(&mut self, _arena: &mut Arena, node: NodeIndex) {
            self.last = Some(node);
        }

        fn apply_score_changes(&mut self, _arena: &mut Arena, _deltas: &[(NodeIndex, i64)]) -> Result<()> {
            Ok(())
        }

        fn on_prune(&mut self, _arena: &mut Arena, _pruned: &[NodeIndex]) {}

        fn head(&self, _arena: &Arena, _justified: NodeIndex) -> Result<NodeIndex> {
            self.last.ok_or(Error::MissingAncestorTableEntry)
        }
    }

    fn block(parent: BlockId, hash: BlockId, slot: Slot) -> Block {
        Block {
            parent,
            hash,
            proposer: 0,
            slot,
        }
    }

    #[test]
    fn block_in_tracks_head() {
        let genesis = BlockId::repeat(0);
        let mut dag = BeaconDag::new(genesis, 0, LastInserted::default());
        dag.block_in(block(genesis, BlockId::repeat(1), 1));
        assert_eq!(dag.head().unwrap(), BlockId::repeat(1));
        dag.block_in(block(BlockId::repeat(1), BlockId::repeat(2), 2));
        assert_eq!(dag.head().unwrap(), BlockId::repeat(2));
    }

    #[test]
    fn finalize_rejects_finalize_ahead_of_justified() {
        let genesis = BlockId::repeat(0);
        let mut dag = BeaconDag::new(genesis, 0, LastInserted::default());
        dag.block_in(block(genesis, BlockId::repeat(1), 5));
        let err = dag.finalize(BlockId::repeat(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidFinalize { .. }));
    }

    #[test]
    fn finalize_prunes_and_forgets_aggregator_state() {
        let genesis = BlockId::repeat(0);
        let mut dag = BeaconDag::new(genesis, 0, LastInserted::default());
        dag.block_in(block(genesis, BlockId::repeat(1), 1));
        dag.block_in(block(BlockId::repeat(1), BlockId::repeat(2), 2));
        dag.attestation_in(Attestation {
            target: BlockId::repeat(1),
            attester: 0,
            weight: 10,
        });
        dag.justify(BlockId::repeat(2)).unwrap();
        dag.finalize(BlockId::repeat(2)).unwrap();
        assert!(!dag.arena().contains(&genesis));
        assert!(!dag.arena().contains(&BlockId::repeat(1)));
        assert!(dag.arena().contains(&BlockId::repeat(2)));
    }
}
