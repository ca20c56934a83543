use ghost_types::{Attestation, BlockId, Slot, ValidatorId};
use std::collections::HashMap;

/// The accumulated weight of all currently-latest attestations naming a
/// single target (spec.md §3). `prev_weight` doubles as the dirty marker:
/// if it equals `weight`, the target has no unflushed delta (spec.md §9,
/// "Aggregator dirty flag").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AggregatedAttestation {
    weight: u64,
    prev_weight: u64,
}

impl AggregatedAttestation {
    fn new() -> Self {
        AggregatedAttestation {
            weight: 0,
            prev_weight: 0,
        }
    }

    fn is_flushed(&self) -> bool {
        self.weight == self.prev_weight
    }
}

/// Per-validator record of the most recent attestation accepted into the
/// aggregator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LatestTarget {
    target: BlockId,
    weight: u64,
    slot: Slot,
}

/// Reduces per-validator latest-message votes into per-block weight,
/// incrementally (spec.md §4.1). Decoupled from the DAG: slot lookups for
/// monotonicity checks are supplied by an injected closure, exactly as the
/// spec's `slot_of(BlockId) -> u64` callback.
#[derive(Default)]
pub struct AttestationAggregator {
    latest_aggregates: HashMap<BlockId, AggregatedAttestation>,
    latest_targets: HashMap<ValidatorId, LatestTarget>,
}

impl AttestationAggregator {
    pub fn new() -> Self {
        AttestationAggregator {
            latest_aggregates: HashMap::new(),
            latest_targets: HashMap::new(),
        }
    }

    fn aggregate_mut(&mut self, target: BlockId) -> &mut AggregatedAttestation {
        self.latest_aggregates
            .entry(target)
            .or_insert_with(AggregatedAttestation::new)
    }

    /// Ingests a single attestation. Returns `true` if it was accepted,
    /// `false` if it was silently dropped (unknown target, or an
    /// earlier-slot target than one already recorded for this attester).
    ///
    /// `slot_of` resolves a `BlockId` to its current slot; `None` means the
    /// block is unknown to the caller (not yet ingested, or pruned).
    pub fn ingest(&mut self, att: Attestation, slot_of: impl Fn(BlockId) -> Option<Slot>) -> bool {
        let target_slot = match slot_of(att.target) {
            Some(s) => s,
            None => return false,
        };

        let prev = self.latest_targets.get(&att.attester).copied();

        if let Some(prev) = prev {
            // `prev.slot` is the slot of the attester's previously recorded
            // target, cached at the time it was ingested -- monotonicity is
            // checked against it directly rather than re-resolving
            // `prev.target`, which may since have been pruned.
            if prev.slot > target_slot {
                return false;
            }

            if prev.target == att.target {
                if att.weight != prev.weight {
                    let agg = self.aggregate_mut(att.target);
                    agg.weight = (agg.weight as i64 + att.weight as i64 - prev.weight as i64)
                        .max(0) as u64;
                }
            } else {
                if let Some(old_agg) = self.latest_aggregates.get_mut(&prev.target) {
                    old_agg.weight = old_agg.weight.saturating_sub(prev.weight);
                }
                let new_agg = self.aggregate_mut(att.target);
                new_agg.weight += att.weight;
            }
        } else {
            let agg = self.aggregate_mut(att.target);
            agg.weight += att.weight;
        }

        self.latest_targets.insert(
            att.attester,
            LatestTarget {
                target: att.target,
                weight: att.weight,
                slot: target_slot,
            },
        );
        true
    }

    /// Emits `(target, delta)` for every aggregate with an unflushed
    /// change, then marks them flushed. After this call, invariant 5
    /// holds: every aggregate has `prev_weight == weight`.
    pub fn drain_deltas(&mut self) -> Vec<(BlockId, i64)> {
        let mut deltas = Vec::new();
        for (target, agg) in self.latest_aggregates.iter_mut() {
            if !agg.is_flushed() {
                deltas.push((*target, agg.weight as i64 - agg.prev_weight as i64));
                agg.prev_weight = agg.weight;
            }
        }
        deltas
    }

    /// Deletes any aggregate that is both flushed and no longer referenced
    /// as any validator's latest target.
    pub fn cleanup(&mut self) {
        let mut alive: HashMap<BlockId, ()> = HashMap::new();
        for t in self.latest_targets.values() {
            alive.insert(t.target, ());
        }
        self.latest_aggregates
            .retain(|target, agg| !agg.is_flushed() || alive.contains_key(target));
    }

    /// Drops any bookkeeping referencing a pruned block: aggregates for
    /// targets that no longer exist, and latest-target records pointing at
    /// them. Called by the DAG after a `finalize` prune.
    pub fn forget_targets(&mut self, pruned: impl Fn(&BlockId) -> bool) {
        self.latest_aggregates.retain(|target, _| !pruned(target));
        self.latest_targets.retain(|_, t| !pruned(&t.target));
    }

    #[cfg(test)]
    pub fn aggregate_weight(&self, target: &BlockId) -> Option<u64> {
        self.latest_aggregates.get(target).map(|a| a.weight)
    }

    #[cfg(test)]
    pub fn latest_target_weight_sum(&self) -> u64 {
        self.latest_targets.values().map(|t| t.weight).sum()
    }

    #[cfg(test)]
    pub fn aggregate_weight_sum(&self) -> u64 {
        self.latest_aggregates.values().map(|a| a.weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(map: &HashMap<BlockId, Slot>) -> impl Fn(BlockId) -> Option<Slot> + '_ {
        move |id| map.get(&id).copied()
    }

    #[test]
    fn first_attestation_creates_aggregate() {
        let mut agg = AttestationAggregator::new();
        let mut known = HashMap::new();
        known.insert(BlockId::repeat(1), 1);
        let att = Attestation {
            target: BlockId::repeat(1),
            attester: 0,
            weight: 10,
        };
        assert!(agg.ingest(att, slots(&known)));
        assert_eq!(agg.aggregate_weight(&BlockId::repeat(1)), Some(10));
    }

    #[test]
    fn unknown_target_is_dropped() {
        let mut agg = AttestationAggregator::new();
        let known: HashMap<BlockId, Slot> = HashMap::new();
        let att = Attestation {
            target: BlockId::repeat(1),
            attester: 0,
            weight: 10,
        };
        assert!(!agg.ingest(att, slots(&known)));
        assert_eq!(agg.aggregate_weight(&BlockId::repeat(1)), None);
    }

    #[test]
    fn older_slot_target_is_dropped() {
        let mut agg = AttestationAggregator::new();
        let mut known = HashMap::new();
        known.insert(BlockId::repeat(1), 5);
        known.insert(BlockId::repeat(2), 3);

        agg.ingest(
            Attestation {
                target: BlockId::repeat(1),
                attester: 0,
                weight: 10,
            },
            slots(&known),
        );
        let accepted = agg.ingest(
            Attestation {
                target: BlockId::repeat(2),
                attester: 0,
                weight: 99,
            },
            slots(&known),
        );
        assert!(!accepted);
        assert_eq!(agg.aggregate_weight(&BlockId::repeat(1)), Some(10));
    }

    #[test]
    fn switching_target_moves_weight() {
        let mut agg = AttestationAggregator::new();
        let mut known = HashMap::new();
        known.insert(BlockId::repeat(1), 1);
        known.insert(BlockId::repeat(2), 2);

        agg.ingest(
            Attestation {
                target: BlockId::repeat(1),
                attester: 0,
                weight: 10,
            },
            slots(&known),
        );
        agg.ingest(
            Attestation {
                target: BlockId::repeat(2),
                attester: 0,
                weight: 10,
            },
            slots(&known),
        );

        assert_eq!(agg.aggregate_weight(&BlockId::repeat(1)), Some(0));
        assert_eq!(agg.aggregate_weight(&BlockId::repeat(2)), Some(10));
    }

    #[test]
    fn drain_deltas_then_idempotent() {
        let mut agg = AttestationAggregator::new();
        let mut known = HashMap::new();
        known.insert(BlockId::repeat(1), 1);
        agg.ingest(
            Attestation {
                target: BlockId::repeat(1),
                attester: 0,
                weight: 10,
            },
            slots(&known),
        );
        let deltas = agg.drain_deltas();
        assert_eq!(deltas, vec![(BlockId::repeat(1), 10)]);
        assert_eq!(agg.drain_deltas(), vec![]);
    }

    #[test]
    fn weight_conservation_after_churn() {
        let mut agg = AttestationAggregator::new();
        let mut known = HashMap::new();
        for i in 1..=5u8 {
            known.insert(BlockId::repeat(i), i as u64);
        }
        for v in 0..10u64 {
            agg.ingest(
                Attestation {
                    target: BlockId::repeat((v % 5 + 1) as u8),
                    attester: v,
                    weight: v + 1,
                },
                slots(&known),
            );
        }
        agg.drain_deltas();
        assert_eq!(agg.aggregate_weight_sum(), agg.latest_target_weight_sum());
    }
}
