use crate::error::{Error, Result};
use ghost_dag::AttestationAggregator;
use ghost_types::{Attestation, Block, BlockId, Slot};
use std::collections::HashMap;

/// Below this many live nodes a `finalize` tombstones but does not
/// physically compact the arrays (spec.md §4.3.f, "amortized prune"):
/// small prunes cost more in re-indexing than they save.
const DEFAULT_PRUNE_THRESHOLD: usize = 200;

/// One slot of the flat, append-only node store (spec.md §4.3.f). Plays
/// the role `ghost_dag::DagNode` plays for the other five strategies, but
/// as a row of three parallel fields -- `parent`/`weight`/`best_child` are
/// exactly the `p`/`w`/`b` arrays of the design note (spec.md §9), folded
/// together for locality without losing the diff-array back-propagation
/// shape. There is no cached `t` (best-target) array: `head` descends the
/// `best_child` chain from the justified node instead, since a cached
/// best-target would need refreshing on every insertion along the whole
/// ancestor chain above it, not just the immediate parent `block_in`
/// touches.
#[derive(Clone, Debug)]
pub struct ProtoNode {
    pub key: BlockId,
    pub slot: Slot,
    pub parent: Option<usize>,
    pub weight: i64,
    pub best_child: Option<usize>,
}

/// The contiguous-array strategy (spec.md §4.3.f), end to end: its own
/// block store plus the aggregator plumbing every strategy shares.
/// Mirrors `choices/proto_array/proto_array.go`'s `ProtoArrayLMDGhost`,
/// re-indexed 0-based throughout: the original's 1-based scheme, where
/// array slot `0` also doubles as the "no parent" sentinel, does not
/// survive translation to a language where a valid index and "absent"
/// cannot share a representation.
pub struct ProtoArrayForkChoice {
    prune_threshold: usize,
    nodes: Vec<ProtoNode>,
    indices: HashMap<BlockId, usize>,
    aggregator: AttestationAggregator,
    justified: usize,
    finalized: usize,
}

impl ProtoArrayForkChoice {
    pub fn new(genesis: BlockId, genesis_slot: Slot) -> Self {
        Self::with_prune_threshold(genesis, genesis_slot, DEFAULT_PRUNE_THRESHOLD)
    }

    pub fn with_prune_threshold(genesis: BlockId, genesis_slot: Slot, prune_threshold: usize) -> Self {
        let root = ProtoNode {
            key: genesis,
            slot: genesis_slot,
            parent: None,
            weight: 0,
            best_child: None,
        };
        let mut indices = HashMap::new();
        indices.insert(genesis, 0);
        ProtoArrayForkChoice {
            prune_threshold,
            nodes: vec![root],
            indices,
            aggregator: AttestationAggregator::new(),
            justified: 0,
            finalized: 0,
        }
    }

    pub fn justified_block(&self) -> BlockId {
        self.nodes[self.justified].key
    }

    pub fn finalized_block(&self) -> BlockId {
        self.nodes[self.finalized].key
    }

    pub fn node(&self, index: usize) -> Option<&ProtoNode> {
        self.nodes.get(index)
    }

    pub fn index_of(&self, key: &BlockId) -> Option<usize> {
        self.indices.get(key).copied()
    }

    /// Iterates every live node in insertion order. Used by
    /// `ghost_chain`'s visualization writer, which needs a uniform way
    /// to walk the DAG regardless of which of the six engines backs it.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (usize, &ProtoNode)> {
        self.nodes.iter().enumerate()
    }

    /// Ingests a new block. An unknown parent is tolerated exactly as in
    /// `ghost_dag::Arena::insert`: the block becomes a forest root.
    pub fn block_in(&mut self, block: Block) -> usize {
        let parent = if block.parent.is_zero() {
            None
        } else {
            self.indices.get(&block.parent).copied()
        };
        let index = self.nodes.len();
        self.nodes.push(ProtoNode {
            key: block.hash,
            slot: block.slot,
            parent,
            weight: 0,
            best_child: None,
        });
        self.indices.insert(block.hash, index);
        if let Some(p) = parent {
            self.maybe_update_best_child(p, index);
        }
        index
    }

    pub fn attestation_in(&mut self, att: Attestation) -> bool {
        let nodes = &self.nodes;
        let indices = &self.indices;
        self.aggregator
            .ingest(att, |id| indices.get(&id).map(|&i| nodes[i].slot))
    }

    /// Flushes every unflushed aggregator delta through the two-pass
    /// diff back-propagation.
    pub fn apply_pending_deltas(&mut self) -> Result<()> {
        let deltas = self.aggregator.drain_deltas();
        if deltas.is_empty() {
            return Ok(());
        }
        let mut resolved = Vec::with_capacity(deltas.len());
        for (target, delta) in deltas {
            if let Some(&index) = self.indices.get(&target) {
                resolved.push((index, delta));
            }
        }
        self.apply_score_changes(&resolved)?;
        self.aggregator.cleanup();
        Ok(())
    }

    /// The two-pass diff back-propagation (spec.md §4.3.f).
    ///
    /// Pass one walks from the deepest node to the root, summing each
    /// node's diff into its parent's -- since every child has a strictly
    /// larger index than its parent (a block cannot be inserted before
    /// its own parent), a single backward sweep visits every node after
    /// all of its descendants. Pass two applies the summed diffs to
    /// `weight`, then sweeps backward once more repairing `best_child`
    /// wherever a node's new weight overtakes its parent's current best
    /// child.
    fn apply_score_changes(&mut self, deltas: &[(usize, i64)]) -> Result<()> {
        let mut d = vec![0i64; self.nodes.len()];
        for &(index, delta) in deltas {
            *d.get_mut(index).ok_or(Error::InvalidNodeIndex(index))? += delta;
        }

        for i in (0..self.nodes.len()).rev() {
            if d[i] == 0 {
                continue;
            }
            if let Some(parent) = self.nodes[i].parent {
                d[parent] += d[i];
            }
        }

        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.weight = node.weight.checked_add(d[i]).ok_or(Error::DeltaOverflow(i))?;
        }

        for i in (0..self.nodes.len()).rev() {
            if d[i] == 0 {
                continue;
            }
            if let Some(parent) = self.nodes[i].parent {
                self.maybe_update_best_child(parent, i);
            }
        }

        Ok(())
    }

    /// Compares `child_index` against `parent_index`'s current best
    /// child, swapping it in if heavier, with ties broken towards the
    /// earlier-inserted (lower-index) child (invariant 8). O(1).
    fn maybe_update_best_child(&mut self, parent_index: usize, child_index: usize) {
        let child_weight = self.nodes[child_index].weight;

        let should_update = match self.nodes[parent_index].best_child {
            None => true,
            Some(current) if current == child_index => true,
            Some(current) => {
                let current_weight = self.nodes[current].weight;
                child_weight > current_weight || (child_weight == current_weight && child_index < current)
            }
        };

        if should_update {
            self.nodes[parent_index].best_child = Some(child_index);
        }
    }

    /// Descends from the justified node to the head by always following
    /// `best_child`, stopping at the first node with none (spec.md
    /// §4.3.f: descend from the base via `b[·]`). Unlike the cached
    /// best-target some of the other strategies keep, this never goes
    /// stale: a fresh `block_in` only ever needs to repair its immediate
    /// parent's `best_child` (done in `block_in` itself), and every
    /// ancestor above that is read fresh on each `head` call rather than
    /// needing its own cached pointer kept in sync.
    pub fn head(&self) -> Result<BlockId> {
        let mut index = self.justified;
        loop {
            let node = self.nodes.get(index).ok_or(Error::InvalidNodeIndex(index))?;
            match node.best_child {
                Some(child) => index = child,
                None => return Ok(node.key),
            }
        }
    }

    pub fn justify(&mut self, block: BlockId) -> Result<()> {
        let index = self.indices.get(&block).copied().ok_or(Error::UnknownBlock(block))?;
        self.justified = index;
        Ok(())
    }

    /// Advances the finalized checkpoint. Physically compacts the
    /// arrays only once the finalized node's index reaches
    /// `prune_threshold` -- below that, re-indexing costs more than it
    /// saves (spec.md §4.3.f, "amortized prune").
    pub fn finalize(&mut self, block: BlockId) -> Result<()> {
        let index = self.indices.get(&block).copied().ok_or(Error::UnknownBlock(block))?;
        let finalized_slot = self.nodes[index].slot;
        let justified_slot = self.nodes[self.justified].slot;
        if finalized_slot > justified_slot {
            return Err(Error::InvalidFinalize {
                finalized_slot,
                justified_slot,
            });
        }
        self.finalized = index;

        if index < self.prune_threshold {
            return Ok(());
        }

        for node in &self.nodes[..index] {
            self.indices.remove(&node.key);
        }
        self.nodes = self.nodes.split_off(index);

        for idx in self.indices.values_mut() {
            *idx = idx.checked_sub(index).ok_or(Error::IndexOverflow("indices"))?;
        }
        for node in self.nodes.iter_mut() {
            node.parent = node.parent.and_then(|p| p.checked_sub(index));
            node.best_child = node.best_child.map(|c| c - index);
        }
        self.justified -= index;
        self.finalized = 0;

        Ok(())
    }
}
