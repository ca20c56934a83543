use crate::arena::{Arena, NodeIndex};
use crate::error::Result;

/// The pluggable head-selection rule (spec.md §4.3). A `BeaconDag` holds
/// exactly one implementation at a time: strategies never run
/// side-by-side against a single shared arena (differential testing runs
/// one `BeaconDag` per strategy instead, over the same input stream).
///
/// Implementations are free to keep their own scratch state (tables,
/// caches, index maps) alongside the shared `Arena`; only the five
/// fields called out on `DagNode` are shared mutable state, and only the
/// incremental strategy is allowed to write them.
pub trait ForkChoice {
    /// Called once for every node as it is inserted into the arena, in
    /// insertion order, immediately after `Arena::insert`. Takes the arena
    /// mutably: the incremental best-target strategy (4.3.e) is the only
    /// implementor that writes through it (seeding `best_target` and
    /// propagating it up the `children[0]` chain); every other strategy
    /// simply ignores the access it doesn't need.
    fn on_new_node(&mut self, arena: &mut Arena, node: NodeIndex);

    /// Applies a batch of per-node weight deltas, as produced by draining
    /// the attestation aggregator. `deltas` pairs a node with the signed
    /// change to its individual weight; strategies that maintain subtree
    /// totals must back-propagate themselves.
    fn apply_score_changes(&mut self, arena: &mut Arena, deltas: &[(NodeIndex, i64)]) -> Result<()>;

    /// Called after the arena has pruned `pruned` (all now tombstoned).
    /// Strategies with their own index maps or caches must forget them
    /// here.
    fn on_prune(&mut self, arena: &mut Arena, pruned: &[NodeIndex]);

    /// Returns the current canonical head, descending from `justified`.
    fn head(&self, arena: &Arena, justified: NodeIndex) -> Result<NodeIndex>;
}
