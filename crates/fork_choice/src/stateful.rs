use ghost_dag::{Arena, ForkChoice, NodeIndex, Result};

/// Incremental best-target strategy (spec.md §4.3.e, "stateful" /
/// "protolambda"). Unlike every other strategy here, this one mutates the
/// arena's own `children[0]` ordering, `index_as_child`, `weight` and
/// `best_target` fields directly -- those four are reserved for this
/// strategy alone (spec.md §5, Shared resources) and must never be read
/// by a peer sharing the same arena.
///
/// Grounded in `choices/protolambda/protolambda.go`'s `AddVote`/
/// `RemoveVote`/`PropagateBestTargetUp`, adapted from per-vote mutation to
/// the shared `(target, delta)` batch contract every strategy here uses.
#[derive(Default)]
pub struct Stateful;

impl Stateful {
    pub fn new() -> Self {
        Stateful::default()
    }

    /// Walks from `node` up to the root, following `children[0]` while
    /// the walk is still at the best-child slot, copying `best_target`
    /// into each ancestor it reaches. Mirrors `PropagateBestTargetUp`.
    fn propagate_best_target_up(arena: &mut Arena, node: NodeIndex) {
        let best_target = arena.get(node).best_target;
        let mut child = node;
        loop {
            let parent = match arena.get(child).parent {
                Some(p) => p,
                None => break,
            };
            if arena.get(child).index_as_child != 0 {
                break;
            }
            arena.get_mut(parent).best_target = best_target;
            child = parent;
        }
    }

    /// Swaps `node` into its parent's `children[0]` slot, displacing
    /// whatever was there, and fixes up both nodes' `index_as_child`.
    /// O(1), per spec.md §4.3.e.
    fn swap_to_front(arena: &mut Arena, parent: NodeIndex, node: NodeIndex) {
        let node_slot = arena.get(node).index_as_child;
        let old_best = arena.get(parent).children[0];

        arena.get_mut(parent).children.swap(0, node_slot);
        arena.get_mut(node).index_as_child = 0;
        arena.get_mut(old_best).index_as_child = node_slot;
    }

    /// Applies one node's weight delta and maintains the best-child/
    /// best-target invariants at its parent, per spec.md §4.3.e.
    ///
    /// The optional cut-off described in §4.3.e ("once the propagating
    /// node's weight exceeds half the total, subsequent ancestors cannot
    /// change best-target") does not hold in general: a positive delta can
    /// make a path heaviest for the first time at a node whose own weight
    /// already clears half the total, in which case an ancestor further up
    /// still needs its best-child swapped. `protolambda.go`'s `AddVote`
    /// recurses to the root unconditionally, so this mirrors that instead.
    fn apply_one(arena: &mut Arena, node: NodeIndex, delta: i64) {
        let new_weight = arena.get(node).weight + delta;
        arena.get_mut(node).weight = new_weight;

        if let Some(parent) = arena.get(node).parent {
            let index_as_child = arena.get(node).index_as_child;
            let best_child = arena.get(parent).children[0];

            if delta > 0 && index_as_child != 0 {
                let best_weight = arena.get(best_child).weight;
                let overtakes = new_weight > best_weight
                    || (new_weight == best_weight && node.index() < best_child.index());
                if overtakes {
                    Self::swap_to_front(arena, parent, node);
                    Self::propagate_best_target_up(arena, node);
                }
            } else if delta < 0 && index_as_child == 0 {
                let siblings = arena.get(parent).children.clone();
                let mut new_best = node;
                let mut new_best_weight = new_weight;
                for &sibling in siblings.iter().skip(1) {
                    let w = arena.get(sibling).weight;
                    if w > new_best_weight || (w == new_best_weight && sibling.index() < new_best.index()) {
                        new_best = sibling;
                        new_best_weight = w;
                    }
                }
                if new_best != node {
                    Self::swap_to_front(arena, parent, new_best);
                    Self::propagate_best_target_up(arena, new_best);
                }
            }
        }
    }
}

impl ForkChoice for Stateful {
    /// The new node's own best-target is itself. If it is its parent's
    /// only (hence first) child, its best-target propagates up the
    /// `children[0]` chain exactly as `BlockIn` does in the original.
    fn on_new_node(&mut self, arena: &mut Arena, node: NodeIndex) {
        arena.get_mut(node).best_target = Some(node);
        if let Some(parent) = arena.get(node).parent {
            if arena.get(parent).children.len() == 1 {
                Self::propagate_best_target_up(arena, node);
            }
        }
    }

    /// Walks every delta from its target up to the root, maintaining the
    /// best-child/best-target invariants at each step all the way up (no
    /// cut-off -- see [`Stateful::apply_one`]).
    fn apply_score_changes(&mut self, arena: &mut Arena, deltas: &[(NodeIndex, i64)]) -> Result<()> {
        for &(target, delta) in deltas {
            let mut node = Some(target);
            while let Some(n) = node {
                Self::apply_one(arena, n, delta);
                node = arena.get(n).parent;
            }
        }
        Ok(())
    }

    fn on_prune(&mut self, _arena: &mut Arena, _pruned: &[NodeIndex]) {
        // Pruned nodes were ancestors of every surviving node; the
        // weight/best_target/children[0] invariants inside each
        // surviving subtree are unaffected by removing nodes above it.
    }

    /// All the work has already been done incrementally: the head is
    /// just the justified node's `best_target`.
    fn head(&self, arena: &Arena, justified: NodeIndex) -> Result<NodeIndex> {
        Ok(arena.get(justified).best_target.unwrap_or(justified))
    }
}
