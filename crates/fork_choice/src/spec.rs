use ghost_dag::{Arena, ForkChoice, NodeIndex, Result};
use std::collections::HashMap;

/// The naive baseline strategy (spec.md §4.3.a): no caching, no mutation
/// of the DAG, `ancestor` is a linear parent-walk done fresh on every
/// call. Correct by inspection; used as the reference the other five
/// strategies are checked against (P1).
#[derive(Default)]
pub struct Spec {
    latest_scores: HashMap<NodeIndex, i64>,
}

impl Spec {
    pub fn new() -> Self {
        Spec::default()
    }

    fn vote_count(&self, arena: &Arena, block: NodeIndex) -> i64 {
        let height = arena.get(block).height;
        self.latest_scores
            .iter()
            .filter_map(|(target, weight)| {
                arena
                    .ancestor_at_height(*target, height)
                    .filter(|a| *a == block)
                    .map(|_| *weight)
            })
            .sum()
    }
}

impl ForkChoice for Spec {
    fn on_new_node(&mut self, _arena: &mut Arena, _node: NodeIndex) {}

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
        let mut current = justified;
        loop {
            let children = arena.children(current);
            if children.is_empty() {
                return Ok(current);
            }
            let mut best = children[0];
            let mut best_votes = self.vote_count(arena, best);
            for &child in &children[1..] {
                let votes = self.vote_count(arena, child);
                if votes > best_votes {
                    best = child;
                    best_votes = votes;
                }
            }
            current = best;
        }
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
        let mut dag = BeaconDag::new(genesis, 0, Spec::new());
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
    fn majority_vote_picks_fork() {
        let genesis = BlockId::repeat(0);
        let mut dag = BeaconDag::new(genesis, 0, Spec::new());
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
        let mut dag = BeaconDag::new(genesis, 0, Spec::new());
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
    fn attestation_switch_changes_head() {
        let genesis = BlockId::repeat(0);
        let mut dag = BeaconDag::new(genesis, 0, Spec::new());
        dag.block_in(block(genesis, BlockId::repeat(1), 1));
        dag.block_in(block(genesis, BlockId::repeat(2), 1));
        dag.attestation_in(Attestation {
            target: BlockId::repeat(1),
            attester: 0,
            weight: 2,
        });
        dag.attestation_in(Attestation {
            target: BlockId::repeat(2),
            attester: 1,
            weight: 2,
        });
        dag.apply_pending_deltas().unwrap();
        assert_eq!(dag.head().unwrap(), BlockId::repeat(1));

        dag.attestation_in(Attestation {
            target: BlockId::repeat(2),
            attester: 0,
            weight: 2,
        });
        dag.apply_pending_deltas().unwrap();
        assert_eq!(dag.head().unwrap(), BlockId::repeat(2));
    }
}
