use crate::error::{Error, Result};
use fork_choice::{Cached, SimpleBackProp, Spec, Stateful, Vitalik};
use ghost_dag::BeaconDag;
use ghost_types::{Attestation, Block, BlockId, Slot, ValidatorId};
use proto_array_fork_choice::ProtoArrayForkChoice;
use std::collections::HashMap;
use std::str::FromStr;

/// Which of the six engines a `Chain` is backed by. Selected once at
/// construction from the configuration surface's `fork_choice_rule`
/// string (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForkChoiceRule {
    Spec,
    Cached,
    Vitalik,
    SimpleBackProp,
    Stateful,
    ProtoArray,
}

impl FromStr for ForkChoiceRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spec" => Ok(ForkChoiceRule::Spec),
            "cached" => Ok(ForkChoiceRule::Cached),
            "vitalik" => Ok(ForkChoiceRule::Vitalik),
            "simple_back_prop" => Ok(ForkChoiceRule::SimpleBackProp),
            "stateful" => Ok(ForkChoiceRule::Stateful),
            "proto_array" => Ok(ForkChoiceRule::ProtoArray),
            other => Err(Error::UnknownForkChoiceRule(other.to_string())),
        }
    }
}

/// A tagged variant over the five `Arena`-based strategies plus the
/// self-contained contiguous-array one (spec.md §9 design note: "model
/// as a tagged variant of strategies... do not inherit; compose"). All
/// six expose the same method names with the same signatures, so a
/// single dispatch macro covers the pass-through operations; only the
/// node-traversal helpers the visualization writer needs differ in
/// shape between the `Arena`-backed engines and the flat-array one.
enum ChainInner {
    Spec(BeaconDag<Spec>),
    Cached(BeaconDag<Cached>),
    Vitalik(BeaconDag<Vitalik>),
    SimpleBackProp(BeaconDag<SimpleBackProp>),
    Stateful(BeaconDag<Stateful>),
    ProtoArray(ProtoArrayForkChoice),
}

/// Delegates to whichever variant is active, using one expression that
/// must type-check identically against every `BeaconDag<F>` and
/// `ProtoArrayForkChoice` (their ingest/query method names and
/// signatures are kept in lockstep for exactly this reason).
macro_rules! dispatch {
    ($self:expr, $inner:ident => $expr:expr) => {
        match $self {
            ChainInner::Spec($inner) => $expr,
            ChainInner::Cached($inner) => $expr,
            ChainInner::Vitalik($inner) => $expr,
            ChainInner::SimpleBackProp($inner) => $expr,
            ChainInner::Stateful($inner) => $expr,
            ChainInner::ProtoArray($inner) => $expr,
        }
    };
}

/// Like [`dispatch!`], but the flat-array engine needs its own
/// expression since it has no `Arena` to borrow.
macro_rules! dispatch2 {
    ($self:expr, $dag:ident => $dag_expr:expr, $pa:ident => $pa_expr:expr) => {
        match $self {
            ChainInner::Spec($dag) => $dag_expr,
            ChainInner::Cached($dag) => $dag_expr,
            ChainInner::Vitalik($dag) => $dag_expr,
            ChainInner::SimpleBackProp($dag) => $dag_expr,
            ChainInner::Stateful($dag) => $dag_expr,
            ChainInner::ProtoArray($pa) => $pa_expr,
        }
    };
}

impl ChainInner {
    fn block_in(&mut self, block: Block) {
        dispatch!(self, inner => {
            inner.block_in(block);
        })
    }

    fn attestation_in(&mut self, att: Attestation) -> bool {
        dispatch!(self, inner => inner.attestation_in(att))
    }

    /// The dirty/sync boundary (spec.md §4.2): drains the aggregator
    /// through the active strategy, then asks it for the head.
    fn update_head(&mut self) -> Result<BlockId> {
        dispatch!(self, inner => {
            inner.apply_pending_deltas()?;
            Ok(inner.head()?)
        })
    }

    fn justify(&mut self, block: BlockId) -> Result<()> {
        dispatch!(self, inner => Ok(inner.justify(block)?))
    }

    fn finalize(&mut self, block: BlockId) -> Result<()> {
        dispatch!(self, inner => Ok(inner.finalize(block)?))
    }

    fn justified_block(&self) -> BlockId {
        dispatch!(self, inner => inner.justified_block())
    }

    fn finalized_block(&self) -> BlockId {
        dispatch!(self, inner => inner.finalized_block())
    }

    fn slot_of(&self, id: BlockId) -> Option<Slot> {
        dispatch2!(
            self,
            dag => dag.arena().index_of(&id).map(|i| dag.arena().get(i).slot),
            pa => pa.index_of(&id).and_then(|i| pa.node(i)).map(|n| n.slot)
        )
    }

    fn parent_of(&self, id: BlockId) -> Option<BlockId> {
        dispatch2!(
            self,
            dag => dag
                .arena()
                .index_of(&id)
                .and_then(|i| dag.arena().get(i).parent)
                .map(|p| dag.arena().key_of(p)),
            pa => pa
                .index_of(&id)
                .and_then(|i| pa.node(i))
                .and_then(|n| n.parent)
                .and_then(|p| pa.node(p))
                .map(|n| n.key)
        )
    }

    /// The immediate children of a live node, in child-insertion order
    /// for the `Arena`-backed engines. The contiguous-array engine keeps
    /// no child list of its own (only `best_child`), so this falls back
    /// to a linear scan of its node store; used only by the simulation
    /// driver's random-walk target selection, never on a hot path.
    fn children_of(&self, id: BlockId) -> Vec<BlockId> {
        dispatch2!(
            self,
            dag => dag
                .arena()
                .index_of(&id)
                .map(|i| dag.arena().children(i).iter().map(|c| dag.arena().key_of(*c)).collect())
                .unwrap_or_default(),
            pa => match pa.index_of(&id) {
                Some(idx) => pa
                    .iter_nodes()
                    .filter(|(_, n)| n.parent == Some(idx))
                    .map(|(_, n)| n.key)
                    .collect(),
                None => Vec::new(),
            }
        )
    }

    /// Every live node as `(hash, slot, parent)`, in no particular order.
    fn nodes(&self) -> Vec<(BlockId, Slot, Option<BlockId>)> {
        dispatch2!(
            self,
            dag => dag
                .arena()
                .iter_live()
                .map(|(_, n)| (n.key, n.slot, n.parent.map(|p| dag.arena().key_of(p))))
                .collect(),
            pa => pa
                .iter_nodes()
                .map(|(_, n)| (n.key, n.slot, n.parent.and_then(|p| pa.node(p)).map(|pn| pn.key)))
                .collect()
        )
    }
}

/// A node's role in the current checkpoint/head state, for the
/// visualization writer's `BlockType` column (`viz.go`'s node coloring).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Normal,
    Head,
    Justified,
    Finalized,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Head => "head",
            Role::Justified => "justified",
            Role::Finalized => "finalized",
        }
    }
}

/// One row of [`Chain::nodes`]'s output: everything the visualization
/// writer needs about a single live block.
pub struct NodeSummary {
    pub hash: BlockId,
    pub slot: Slot,
    pub proposer: ValidatorId,
    pub parent: Option<BlockId>,
    pub role: Role,
}

/// Component F (spec.md §4.4): the single entry point callers use
/// regardless of which fork-choice engine is configured underneath.
/// Keeps its own block store (`parent`/`proposer`/`slot` metadata is not
/// part of any engine's DAG node) alongside the active engine, mirroring
/// `BeaconChain`'s separate `Storage` and `Dag` in `eth2/chain/chain.go`.
pub struct Chain {
    blocks: HashMap<BlockId, Block>,
    inner: ChainInner,
    head: BlockId,
}

impl Chain {
    pub fn new(genesis: BlockId, genesis_slot: Slot, rule: ForkChoiceRule) -> Self {
        let inner = match rule {
            ForkChoiceRule::Spec => ChainInner::Spec(BeaconDag::new(genesis, genesis_slot, Spec::new())),
            ForkChoiceRule::Cached => ChainInner::Cached(BeaconDag::new(genesis, genesis_slot, Cached::new())),
            ForkChoiceRule::Vitalik => ChainInner::Vitalik(BeaconDag::new(genesis, genesis_slot, Vitalik::new())),
            ForkChoiceRule::SimpleBackProp => {
                ChainInner::SimpleBackProp(BeaconDag::new(genesis, genesis_slot, SimpleBackProp::new()))
            }
            ForkChoiceRule::Stateful => {
                ChainInner::Stateful(BeaconDag::new(genesis, genesis_slot, Stateful::new()))
            }
            ForkChoiceRule::ProtoArray => {
                ChainInner::ProtoArray(ProtoArrayForkChoice::new(genesis, genesis_slot))
            }
        };

        let mut blocks = HashMap::new();
        blocks.insert(
            genesis,
            Block {
                parent: BlockId::zero(),
                hash: genesis,
                proposer: 0,
                slot: genesis_slot,
            },
        );

        Chain {
            blocks,
            inner,
            head: genesis,
        }
    }

    /// Ingests a new block, recording its proposer/parent metadata
    /// alongside forwarding it to the active engine. Does not itself
    /// recompute the head; call [`Chain::head`] for that (`chain.go`'s
    /// `BlockIn` folds the two together, but keeping them separate here
    /// lets a caller batch many blocks before paying for a sync).
    pub fn block_in(&mut self, block: Block) {
        self.blocks.insert(block.hash, block);
        self.inner.block_in(block);
    }

    pub fn attestation_in(&mut self, att: Attestation) -> bool {
        self.inner.attestation_in(att)
    }

    /// Drains pending attestation deltas through the active engine and
    /// returns the resulting head, caching it for [`Chain::current_head`]
    /// and role lookups in [`Chain::nodes`].
    pub fn head(&mut self) -> Result<BlockId> {
        self.head = self.inner.update_head()?;
        Ok(self.head)
    }

    /// The head as of the last [`Chain::head`] call, without recomputing.
    pub fn current_head(&self) -> BlockId {
        self.head
    }

    pub fn justify(&mut self, block: BlockId) -> Result<()> {
        self.inner.justify(block)
    }

    pub fn finalize(&mut self, block: BlockId) -> Result<()> {
        self.inner.finalize(block)
    }

    pub fn justified_block(&self) -> BlockId {
        self.inner.justified_block()
    }

    pub fn finalized_block(&self) -> BlockId {
        self.inner.finalized_block()
    }

    pub fn slot_of(&self, id: BlockId) -> Option<Slot> {
        self.inner.slot_of(id)
    }

    pub fn parent_of(&self, id: BlockId) -> Option<BlockId> {
        self.inner.parent_of(id)
    }

    /// The immediate children of a live node. Used by the simulation
    /// driver's random-walk target selection (`ghost_sim`'s
    /// `random_target`, grounded in `sim.go`'s `getRandomTarget`).
    pub fn children_of(&self, id: BlockId) -> Vec<BlockId> {
        self.inner.children_of(id)
    }

    pub fn proposer_of(&self, id: BlockId) -> Option<ValidatorId> {
        self.blocks.get(&id).map(|b| b.proposer)
    }

    /// Every live node, annotated with its role against the last-synced
    /// head and the current justified/finalized checkpoints. Feeds the
    /// visualization writer directly.
    pub fn nodes(&self) -> Vec<NodeSummary> {
        let head = self.head;
        let justified = self.inner.justified_block();
        let finalized = self.inner.finalized_block();

        self.inner
            .nodes()
            .into_iter()
            .map(|(hash, slot, parent)| {
                let role = if hash == head {
                    Role::Head
                } else if hash == justified {
                    Role::Justified
                } else if hash == finalized {
                    Role::Finalized
                } else {
                    Role::Normal
                };
                let proposer = self.blocks.get(&hash).map(|b| b.proposer).unwrap_or(0);
                NodeSummary {
                    hash,
                    slot,
                    proposer,
                    parent,
                    role,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: [ForkChoiceRule; 6] = [
        ForkChoiceRule::Spec,
        ForkChoiceRule::Cached,
        ForkChoiceRule::Vitalik,
        ForkChoiceRule::SimpleBackProp,
        ForkChoiceRule::Stateful,
        ForkChoiceRule::ProtoArray,
    ];

    fn block(parent: BlockId, hash: BlockId, slot: u64) -> Block {
        Block {
            parent,
            hash,
            proposer: 0,
            slot,
        }
    }

    #[test]
    fn from_str_round_trips_known_rules() {
        assert_eq!(ForkChoiceRule::from_str("spec").unwrap(), ForkChoiceRule::Spec);
        assert_eq!(ForkChoiceRule::from_str("proto_array").unwrap(), ForkChoiceRule::ProtoArray);
        assert!(ForkChoiceRule::from_str("nonsense").is_err());
    }

    #[test]
    fn every_rule_agrees_on_majority_fork_scenario() {
        let genesis = BlockId::repeat(0);
        let b1 = BlockId::repeat(1);
        let b2 = BlockId::repeat(2);

        for rule in RULES {
            let mut chain = Chain::new(genesis, 0, rule);
            chain.block_in(block(genesis, b1, 1));
            chain.block_in(block(genesis, b2, 1));
            for v in 0..3u64 {
                chain.attestation_in(Attestation {
                    target: b1,
                    attester: v,
                    weight: 1,
                });
            }
            for v in 3..5u64 {
                chain.attestation_in(Attestation {
                    target: b2,
                    attester: v,
                    weight: 1,
                });
            }
            assert_eq!(chain.head().unwrap(), b1, "rule {:?} disagreed", rule);
        }
    }

    #[test]
    fn every_rule_agrees_after_justify_and_finalize() {
        let genesis = BlockId::repeat(0);
        let a = BlockId::repeat(1);
        let b = BlockId::repeat(2);
        let c = BlockId::repeat(3);
        let d = BlockId::repeat(4);

        for rule in RULES {
            let mut chain = Chain::new(genesis, 0, rule);
            chain.block_in(block(genesis, a, 1));
            chain.block_in(block(a, b, 2));
            chain.block_in(block(b, c, 3));
            chain.block_in(block(c, d, 4));
            chain.justify(c).unwrap();
            chain.finalize(c).unwrap();
            assert_eq!(chain.head().unwrap(), d, "rule {:?} disagreed", rule);
        }
    }

    #[test]
    fn nodes_report_head_justified_finalized_roles() {
        let genesis = BlockId::repeat(0);
        let a = BlockId::repeat(1);
        let mut chain = Chain::new(genesis, 0, ForkChoiceRule::Stateful);
        chain.block_in(block(genesis, a, 1));
        chain.head().unwrap();
        chain.justify(a).unwrap();

        let nodes = chain.nodes();
        let genesis_role = nodes.iter().find(|n| n.hash == genesis).unwrap().role;
        let a_role = nodes.iter().find(|n| n.hash == a).unwrap().role;
        assert_eq!(a_role, Role::Head);
        assert_eq!(genesis_role, Role::Finalized);
    }

    #[test]
    fn parent_and_slot_lookups_agree_with_insertion() {
        let genesis = BlockId::repeat(0);
        let a = BlockId::repeat(1);
        let mut chain = Chain::new(genesis, 0, ForkChoiceRule::ProtoArray);
        chain.block_in(block(genesis, a, 3));
        assert_eq!(chain.parent_of(a), Some(genesis));
        assert_eq!(chain.slot_of(a), Some(3));
        assert_eq!(chain.parent_of(genesis), None);
    }

    #[test]
    fn children_of_reports_every_immediate_child_for_every_rule() {
        let genesis = BlockId::repeat(0);
        let b1 = BlockId::repeat(1);
        let b2 = BlockId::repeat(2);

        for rule in RULES {
            let mut chain = Chain::new(genesis, 0, rule);
            chain.block_in(block(genesis, b1, 1));
            chain.block_in(block(genesis, b2, 1));

            let mut children = chain.children_of(genesis);
            children.sort();
            let mut expected = vec![b1, b2];
            expected.sort();
            assert_eq!(children, expected, "rule {:?} disagreed", rule);
            assert!(chain.children_of(b1).is_empty());
        }
    }

    #[test]
    fn repeated_head_calls_with_no_new_input_are_idempotent() {
        let genesis = BlockId::repeat(0);
        let b1 = BlockId::repeat(1);
        let b2 = BlockId::repeat(2);

        for rule in RULES {
            let mut chain = Chain::new(genesis, 0, rule);
            chain.block_in(block(genesis, b1, 1));
            chain.block_in(block(genesis, b2, 1));
            chain.attestation_in(Attestation {
                target: b1,
                attester: 0,
                weight: 3,
            });

            let first = chain.head().unwrap();
            for _ in 0..3 {
                assert_eq!(chain.head().unwrap(), first, "rule {:?} drifted on repeated head()", rule);
            }
        }
    }
}
