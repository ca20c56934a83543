use ghost_dag::{Arena, ForkChoice, NodeIndex, Result};
use ghost_types::Height;
use std::collections::HashMap;

/// Records, for a parent, which immediate child currently carries the
/// most weight and what leaf that child's own back-propagation already
/// resolved to -- so the final descent doesn't have to re-walk. `child`
/// (rather than just `weight`) is kept so ties can be broken by
/// `index_as_child` regardless of the order buckets happen to be visited
/// in (spec invariant 8: the earlier-inserted child wins).
#[derive(Clone, Copy)]
struct ChildScore {
    child: NodeIndex,
    best_target: NodeIndex,
    weight: i64,
}

/// Simple back-propagation strategy (spec.md §4.3.d): stores only
/// per-target `latest_scores`, and re-derives the whole weighted tree
/// from scratch on every `head()` call by sweeping height-indexed scratch
/// buckets from the deepest known height down to the finalized one.
/// Mirrors `choices/simple_back_prop/simple_back_prop.go`, except the
/// original buckets by slot; this buckets by height, since height (not
/// slot) is the back-propagation axis the rest of the workbench uses.
#[derive(Default)]
pub struct SimpleBackProp {
    latest_scores: HashMap<NodeIndex, i64>,
    max_known_height: Height,
}

impl SimpleBackProp {
    pub fn new() -> Self {
        SimpleBackProp::default()
    }

    /// Descends from `node` to a leaf by always taking `children[0]`
    /// (spec.md §4.3.d: "descend ... always picking the recorded
    /// best-child (or child 0 if none)"). Used to resolve a block with no
    /// recorded vote-derived best child past any unvoted-on descendants,
    /// mirroring the original's fallthrough to `block.Children[0].Hash`.
    fn descend_to_leaf(arena: &Arena, mut node: NodeIndex) -> NodeIndex {
        loop {
            let children = arena.children(node);
            if children.is_empty() {
                return node;
            }
            node = children[0];
        }
    }
}

impl ForkChoice for SimpleBackProp {
    fn on_new_node(&mut self, arena: &mut Arena, node: NodeIndex) {
        let height = arena.get(node).height;
        if height > self.max_known_height {
            self.max_known_height = height;
        }
    }

    fn apply_score_changes(&mut self, _arena: &mut Arena, deltas: &[(NodeIndex, i64)]) -> Result<()> {
        for (node, delta) in deltas {
            let entry = self.latest_scores.entry(*node).or_insert(0);
            *entry += delta;
            if *entry == 0 {
                self.latest_scores.remove(node);
            }
        }
        Ok(())
    }

    fn on_prune(&mut self, _arena: &mut Arena, pruned: &[NodeIndex]) {
        for p in pruned {
            self.latest_scores.remove(p);
        }
    }

    fn head(&self, arena: &Arena, justified: NodeIndex) -> Result<NodeIndex> {
        let start_height = arena.get(justified).height;
        if self.latest_scores.is_empty() {
            return Ok(Self::descend_to_leaf(arena, justified));
        }

        let total_weight: i64 = self.latest_scores.values().sum();
        let cut_off = total_weight / 2;

        let num_heights = (self.max_known_height - start_height + 1) as usize;
        let mut weighted_at_height: Vec<HashMap<NodeIndex, i64>> = vec![HashMap::new(); num_heights];

        for (target, weight) in self.latest_scores.iter() {
            let height = arena.get(*target).height;
            if height < start_height {
                continue;
            }
            let bucket = (height - start_height) as usize;
            *weighted_at_height[bucket].entry(*target).or_insert(0) += weight;
        }

        let mut best_child: HashMap<NodeIndex, ChildScore> = HashMap::new();

        for h in (1..num_heights).rev() {
            let entries: Vec<(NodeIndex, i64)> = weighted_at_height[h].iter().map(|(k, v)| (*k, *v)).collect();
            for (block, weight) in entries {
                if weight > cut_off {
                    let target = best_child
                        .get(&block)
                        .map(|c| c.best_target)
                        .unwrap_or_else(|| Self::descend_to_leaf(arena, block));
                    return Ok(target);
                }

                let parent = match arena.get(block).parent {
                    Some(p) => p,
                    None => continue,
                };
                let parent_height = arena.get(parent).height;
                let parent_bucket = (parent_height - start_height) as usize;
                *weighted_at_height[parent_bucket].entry(parent).or_insert(0) += weight;

                let block_best_target = best_child
                    .get(&block)
                    .map(|c| c.best_target)
                    .unwrap_or_else(|| Self::descend_to_leaf(arena, block));
                let should_update = match best_child.get(&parent) {
                    None => true,
                    Some(existing) => {
                        weight > existing.weight
                            || (weight == existing.weight
                                && arena.get(block).index_as_child < arena.get(existing.child).index_as_child)
                    }
                };
                if should_update {
                    best_child.insert(
                        parent,
                        ChildScore {
                            child: block,
                            best_target: block_best_target,
                            weight,
                        },
                    );
                }
            }
        }

        Ok(best_child
            .get(&justified)
            .map(|c| c.best_target)
            .unwrap_or_else(|| Self::descend_to_leaf(arena, justified)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_dag::BeaconDag;
    use ghost_types::{Attestation, Block, BlockId};

    fn block(parent: BlockId, hash: BlockId, slot: u64) -> Block {
        Block {
            parent,
            hash,
            proposer: 0,
            slot,
        }
    }

    #[test]
    fn single_attestation_chain() {
        let genesis = BlockId::repeat(b'A');
        let mut dag = BeaconDag::new(genesis, 0, SimpleBackProp::new());
        dag.block_in(block(genesis, BlockId::repeat(b'B'), 1));
        dag.block_in(block(BlockId::repeat(b'B'), BlockId::repeat(b'C'), 2));
        dag.attestation_in(Attestation {
            target: BlockId::repeat(b'C'),
            attester: 0,
            weight: 1,
        });
        dag.apply_pending_deltas().unwrap();
        assert_eq!(dag.head().unwrap(), BlockId::repeat(b'C'));
    }

    #[test]
    fn matches_spec_on_simple_fork() {
        let genesis = BlockId::repeat(0);
        let mut dag = BeaconDag::new(genesis, 0, SimpleBackProp::new());
        dag.block_in(block(genesis, BlockId::repeat(1), 1));
        dag.block_in(block(genesis, BlockId::repeat(2), 1));
        for v in 0..3u64 {
            dag.attestation_in(Attestation {
                target: BlockId::repeat(1),
                attester: v,
                weight: 1,
            });
        }
        for v in 3..5u64 {
            dag.attestation_in(Attestation {
                target: BlockId::repeat(2),
                attester: v,
                weight: 1,
            });
        }
        dag.apply_pending_deltas().unwrap();
        assert_eq!(dag.head().unwrap(), BlockId::repeat(1));
    }

    #[test]
    fn tie_breaks_to_first_inserted_child() {
        let genesis = BlockId::repeat(0);
        let mut dag = BeaconDag::new(genesis, 0, SimpleBackProp::new());
        dag.block_in(block(genesis, BlockId::repeat(1), 1));
        dag.block_in(block(genesis, BlockId::repeat(2), 1));
        for v in 0..2u64 {
            dag.attestation_in(Attestation {
                target: BlockId::repeat(1),
                attester: v,
                weight: 1,
            });
        }
        for v in 2..4u64 {
            dag.attestation_in(Attestation {
                target: BlockId::repeat(2),
                attester: v,
                weight: 1,
            });
        }
        dag.apply_pending_deltas().unwrap();
        assert_eq!(dag.head().unwrap(), BlockId::repeat(1));
    }

    #[test]
    fn cut_off_short_circuits_to_majority_block() {
        let genesis = BlockId::repeat(0);
        let mut dag = BeaconDag::new(genesis, 0, SimpleBackProp::new());
        dag.block_in(block(genesis, BlockId::repeat(1), 1));
        dag.block_in(block(BlockId::repeat(1), BlockId::repeat(2), 2));
        dag.block_in(block(BlockId::repeat(2), BlockId::repeat(3), 3));
        dag.attestation_in(Attestation {
            target: BlockId::repeat(3),
            attester: 0,
            weight: 10,
        });
        dag.apply_pending_deltas().unwrap();
        assert_eq!(dag.head().unwrap(), BlockId::repeat(3));
    }

    /// With no attestations at all, `head()` must still descend past the
    /// justified block to the leaf via `children[0]`, not stop at
    /// `justified` itself (spec.md §4.3.d).
    #[test]
    fn no_attestations_still_descends_to_leaf() {
        let genesis = BlockId::repeat(0);
        let a = BlockId::repeat(1);
        let b = BlockId::repeat(2);
        let c = BlockId::repeat(3);
        let d = BlockId::repeat(4);
        let mut dag = BeaconDag::new(genesis, 0, SimpleBackProp::new());
        dag.block_in(block(genesis, a, 1));
        dag.block_in(block(a, b, 2));
        dag.block_in(block(b, c, 3));
        dag.block_in(block(c, d, 4));
        dag.justify(c).unwrap();
        dag.finalize(c).unwrap();
        assert_eq!(dag.head().unwrap(), d);
    }

    /// A voted-for block that has unvoted descendants must resolve past
    /// them to a leaf, not stop at the last block with a recorded vote.
    #[test]
    fn voted_block_with_unvoted_child_still_descends_to_leaf() {
        let genesis = BlockId::repeat(0);
        let a = BlockId::repeat(1);
        let b = BlockId::repeat(2);
        let mut dag = BeaconDag::new(genesis, 0, SimpleBackProp::new());
        dag.block_in(block(genesis, a, 1));
        dag.block_in(block(a, b, 2));
        dag.attestation_in(Attestation {
            target: a,
            attester: 0,
            weight: 1,
        });
        dag.apply_pending_deltas().unwrap();
        assert_eq!(dag.head().unwrap(), b);
    }
}
