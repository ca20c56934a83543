use crate::error::{Error, Result};
use ghost_types::{BlockId, Height, Slot};
use std::collections::HashMap;

/// An index into `Arena::nodes`. Stable for the lifetime of the arena: a
/// pruned node's slot in the backing `Vec` is tombstoned, never reused, so
/// existing `NodeIndex` values held by a strategy's own scratch structures
/// are never invalidated by a prune.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(u32);

impl NodeIndex {
    fn new(i: usize) -> Self {
        NodeIndex(i as u32)
    }

    fn get(self) -> usize {
        self.0 as usize
    }

    /// Exposes the raw index for strategies that keep their own
    /// node-indexed scratch arrays (e.g. the cached-ancestor table, the
    /// contiguous-array strategy's parallel arrays).
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The in-DAG representation of a block (spec.md §3, component A).
///
/// `weight`, `best_target`, `children[0]` ordering and `index_as_child` are
/// reserved for the incremental best-target ("stateful") strategy; every
/// other strategy must treat them as read-only scratch it does not rely on
/// (spec.md §5, Shared resources).
#[derive(Clone, Debug)]
pub struct DagNode {
    pub key: BlockId,
    pub slot: Slot,
    pub height: Height,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub index_as_child: usize,
    pub weight: i64,
    pub best_target: Option<NodeIndex>,
    removed: bool,
}

impl DagNode {
    fn genesis(key: BlockId, slot: Slot) -> Self {
        DagNode {
            key,
            slot,
            height: 0,
            parent: None,
            children: Vec::new(),
            index_as_child: 0,
            weight: 0,
            best_target: None,
            removed: false,
        }
    }
}

/// Owns every `DagNode` ever ingested. Mirrors `eth2/dag/dag.go`'s
/// `BeaconDag.Nodes` map, but keyed by a stable array index instead of a
/// pointer, per the arena design note (spec.md §9).
pub struct Arena {
    nodes: Vec<DagNode>,
    indices: HashMap<BlockId, NodeIndex>,
}

impl Arena {
    /// Creates a fresh arena with a single genesis node at height 0.
    pub fn new(genesis: BlockId, genesis_slot: Slot) -> (Self, NodeIndex) {
        let node = DagNode::genesis(genesis, genesis_slot);
        let mut arena = Arena {
            nodes: vec![node],
            indices: HashMap::new(),
        };
        let idx = NodeIndex::new(0);
        arena.indices.insert(genesis, idx);
        (arena, idx)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get(&self, index: NodeIndex) -> &DagNode {
        &self.nodes[index.get()]
    }

    pub fn get_mut(&mut self, index: NodeIndex) -> &mut DagNode {
        &mut self.nodes[index.get()]
    }

    pub fn index_of(&self, key: &BlockId) -> Option<NodeIndex> {
        self.indices.get(key).copied()
    }

    pub fn contains(&self, key: &BlockId) -> bool {
        self.indices.contains_key(key)
    }

    /// Iterates over every live (non-pruned) node, in insertion order.
    pub fn iter_live(&self) -> impl Iterator<Item = (NodeIndex, &DagNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.removed)
            .map(|(i, n)| (NodeIndex::new(i), n))
    }

    /// Inserts a new node with the given `parent`. If `parent` is `None`
    /// (either because the caller supplied no parent, or the named parent
    /// is not a known live node), the new node becomes a forest root: an
    /// `UnknownParent` condition that the DAG tolerates (spec.md §7).
    pub fn insert(&mut self, key: BlockId, slot: Slot, parent: Option<BlockId>) -> NodeIndex {
        let parent_index = parent.and_then(|p| self.indices.get(&p).copied());

        let height = parent_index.map(|p| self.get(p).height + 1).unwrap_or(0);
        let new_index = NodeIndex::new(self.nodes.len());

        let index_as_child = if let Some(p) = parent_index {
            let parent_node = self.get_mut(p);
            parent_node.children.push(new_index);
            parent_node.children.len() - 1
        } else {
            0
        };

        self.nodes.push(DagNode {
            key,
            slot,
            height,
            parent: parent_index,
            children: Vec::new(),
            index_as_child,
            weight: 0,
            best_target: None,
            removed: false,
        });
        self.indices.insert(key, new_index);
        new_index
    }

    /// Naive parent-walk ancestor lookup: the ground truth that the
    /// cached/logarithmic strategies check themselves against (P3).
    pub fn ancestor_at_height(&self, mut node: NodeIndex, height: Height) -> Option<NodeIndex> {
        loop {
            let n = self.get(node);
            if n.height == height {
                return Some(node);
            }
            if n.height < height {
                return None;
            }
            node = n.parent?;
        }
    }

    /// Deletes every node with `slot < finalized.slot`: nulls the parent of
    /// any remaining node whose parent was pruned, removes pruned nodes
    /// from the `key -> index` lookup (satisfying invariant 7: no pruned
    /// node remains reachable via `nodes`), and returns the set of indices
    /// that were pruned so the active strategy can clean up its own
    /// scratch in `on_prune`.
    pub fn prune(&mut self, finalized_slot: Slot) -> Vec<NodeIndex> {
        let mut pruned = Vec::new();
        for i in 0..self.nodes.len() {
            if self.nodes[i].removed {
                continue;
            }
            if self.nodes[i].slot < finalized_slot {
                let idx = NodeIndex::new(i);
                self.indices.remove(&self.nodes[i].key);
                self.nodes[i].removed = true;
                self.nodes[i].children.clear();
                pruned.push(idx);
            }
        }
        for node in self.nodes.iter_mut() {
            if node.removed {
                continue;
            }
            if let Some(p) = node.parent {
                if self.nodes[p.get()].removed {
                    node.parent = None;
                }
            }
        }
        pruned
    }

    /// Re-derives `index_as_child` for every child of `parent`. Used by
    /// `prune` callers that also want to keep the best-child ordering of
    /// the incremental strategy valid (that strategy does not need this
    /// directly, see `fork_choice::stateful::Stateful::on_prune`).
    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.nodes[index.get()].children
    }

    pub fn slot_of(&self, key: &BlockId) -> Option<Slot> {
        self.index_of(key).map(|i| self.get(i).slot)
    }

    pub fn key_of(&self, index: NodeIndex) -> BlockId {
        self.get(index).key
    }

    pub fn get_checked(&self, index: usize) -> Result<&DagNode> {
        self.nodes.get(index).ok_or(Error::InvalidNodeIndex(index))
    }
}
