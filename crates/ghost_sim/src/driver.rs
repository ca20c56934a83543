use crate::config::{ConfigError, SimConfig};
use ghost_chain::{Chain, ForkChoiceRule};
use ghost_types::{Attestation, Block, BlockId, EPOCH_LENGTH};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use slog::{debug, info, Logger};
use std::str::FromStr;

/// The block the simulation starts from. A recognizable non-zero hash,
/// matching `sim.go`'s `Hash256{1}` origin convention -- the all-zero id
/// stays reserved as the "no parent" sentinel.
pub fn genesis_id() -> BlockId {
    BlockId::repeat(1)
}

/// Deterministic RNG-driven block/attestation generator (SPEC_FULL.md
/// §4.6), grounded in `sim/simulation.go`'s `Simulation` and
/// `sim/sim_chain.go`'s `SimChain`. Drives a `Chain` of whichever engine
/// the configuration names, through `blocks` proposal rounds each
/// followed by `attestations_per_block` attestations, periodically
/// advancing the justified/finalized checkpoints.
pub struct Simulation {
    rng: XorShiftRng,
    chain: Chain,
    config: SimConfig,
    slot: u64,
    last_checkpoint_epoch: u64,
}

impl Simulation {
    /// Validates `config`, then builds a fresh `Chain` seeded with the
    /// genesis block and the configured engine. Fails only on
    /// configuration errors (spec.md §7); never panics.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rule = ForkChoiceRule::from_str(&config.fork_choice_rule)
            .map_err(|_| ConfigError::UnknownForkChoiceRule(config.fork_choice_rule.clone()))?;
        let chain = Chain::new(genesis_id(), 0, rule);
        let rng = XorShiftRng::from_seed(expand_seed(config.seed));
        Ok(Simulation {
            rng,
            chain,
            config,
            slot: 0,
            last_checkpoint_epoch: 0,
        })
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Walks up from the current head towards genesis with probability
    /// `latency_factor` per step -- stopping at genesis (slot 0) -- then
    /// back down a random child path for a random number of steps in
    /// `0..=up_count`. Ported directly from `sim.go`'s `getRandomTarget`:
    /// the up/down dance is what lets the simulation spontaneously fork
    /// without any explicit adversarial logic.
    fn random_target(&mut self) -> BlockId {
        let mut target = self.chain.current_head();
        let mut up_count = 0u64;
        loop {
            let slot = self.chain.slot_of(target).unwrap_or(0);
            if slot > 0 && self.rng.gen_bool(self.config.latency_factor) {
                target = self.chain.parent_of(target).unwrap_or(target);
                up_count += 1;
            } else {
                break;
            }
        }

        let down_count = self.rng.gen_range(0, up_count + 1);
        for _ in 0..down_count {
            let children = self.chain.children_of(target);
            if children.is_empty() {
                break;
            }
            let pick = self.rng.gen_range(0, children.len());
            target = children[pick];
        }
        target
    }

    fn random_block_id(&mut self) -> BlockId {
        BlockId::random(&mut self.rng)
    }

    fn attest_weight(&mut self) -> u64 {
        self.config.base_attest_weight
            + self.rng.gen_range(0, self.config.max_extra_attest_weight + 1)
    }

    /// Proposes one new block (`sim.go`'s `SimNewBlock`): picks a
    /// perturbed parent via `random_target`, skips `0..=10` slots with
    /// per-iteration probability `slot_skip_chance` (capped per spec.md
    /// §6), derives a proposer from the validator population, and
    /// self-attests the proposer's own block.
    fn propose_block(&mut self) {
        let parent = self.random_target();
        let mut slot = self.chain.slot_of(parent).unwrap_or(0) + 1;
        for _ in 0..10 {
            if self.rng.gen_bool(self.config.slot_skip_chance) {
                slot += 1;
            } else {
                break;
            }
        }

        let proposer = self.rng.gen_range(0, self.config.validator_count);
        let hash = self.random_block_id();

        let block = Block {
            parent,
            hash,
            proposer,
            slot,
        };
        self.chain.block_in(block);
        self.slot = self.slot.max(slot);

        let weight = self.attest_weight();
        self.chain.attestation_in(Attestation {
            target: hash,
            attester: proposer,
            weight,
        });
    }

    /// Submits one attestation from a random validator to a random
    /// target (`sim.go`'s `SimNewAttestation`): every validator is
    /// eligible to attest to any live block in this simulation (no
    /// committee/shuffling model, per spec.md §1's Non-goals).
    fn random_attestation(&mut self) {
        let target = self.random_target();
        let attester = self.rng.gen_range(0, self.config.validator_count);
        let weight = self.attest_weight();
        self.chain.attestation_in(Attestation {
            target,
            attester,
            weight,
        });
    }

    /// Walks `steps` parent-hops back from `from`, stopping early at
    /// genesis. Used to locate the block `justify_epochs_ago`/
    /// `finalize_epochs_ago` epochs behind the current head.
    fn ancestor_steps_back(&self, from: BlockId, steps: u64) -> BlockId {
        let mut node = from;
        for _ in 0..steps {
            match self.chain.parent_of(node) {
                Some(p) => node = p,
                None => break,
            }
        }
        node
    }

    /// Advances the justified/finalized checkpoints once a full epoch
    /// has elapsed, each set to the ancestor of the current head
    /// `{justify,finalize}_epochs_ago * EPOCH_LENGTH` height-steps back.
    /// The original's `SimJustify` is a stub (`sim_chain.go`: `// TODO`);
    /// this implements the checkpoint advance the configuration surface
    /// promises instead of leaving it unimplemented.
    fn advance_checkpoints(&mut self) {
        let head = self.chain.current_head();
        let justify_target = self.ancestor_steps_back(head, self.config.justify_epochs_ago * EPOCH_LENGTH);
        let finalize_target = self.ancestor_steps_back(head, self.config.finalize_epochs_ago * EPOCH_LENGTH);

        // `finalize_epochs_ago >= justify_epochs_ago` (validated in
        // `SimConfig::validate`) guarantees `finalize_target` is an
        // ancestor of `justify_target` or equal to it, so justifying
        // first never leaves `finalized.slot > justified.slot`
        // transiently observable between the two calls.
        let _ = self.chain.justify(justify_target);
        let _ = self.chain.finalize(finalize_target);
    }

    /// Drives `blocks` proposal rounds, each followed by
    /// `attestations_per_block` attestations, recomputing the head and
    /// advancing checkpoints once per epoch, logging progress via `slog`
    /// at a throttled interval. Returns the final head.
    pub fn run(&mut self, log: &Logger) -> BlockId {
        let log_every = (self.config.blocks / 20).max(1);

        for i in 0..self.config.blocks {
            self.propose_block();
            for _ in 0..self.config.attestations_per_block {
                self.random_attestation();
            }

            let head = self.chain.head().unwrap_or_else(|e| {
                panic!("fork choice consistency violation at block {}: {}", i, e)
            });

            let current_epoch = self.slot / EPOCH_LENGTH;
            if current_epoch > self.last_checkpoint_epoch {
                self.last_checkpoint_epoch = current_epoch;
                self.advance_checkpoints();
            }

            if i % log_every == 0 {
                info!(
                    log,
                    "simulation progress";
                    "block" => i,
                    "slot" => self.slot,
                    "head" => %head,
                    "justified" => %self.chain.justified_block(),
                    "finalized" => %self.chain.finalized_block(),
                );
            } else {
                debug!(log, "block proposed"; "block" => i, "head" => %head);
            }
        }

        self.chain.head().unwrap_or_else(|e| panic!("fork choice consistency violation at final head: {}", e))
    }
}

/// Expands a `u64` seed into the 16-byte array `XorShiftRng::from_seed`
/// needs, by repeating the seed's bytes. Not cryptographic; this RNG
/// only drives a deterministic simulation (spec.md §5, Determinism).
fn expand_seed(seed: u64) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    let seed_bytes = seed.to_le_bytes();
    bytes[..8].copy_from_slice(&seed_bytes);
    bytes[8..].copy_from_slice(&seed_bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> SimConfig {
        SimConfig {
            validator_count: EPOCH_LENGTH,
            latency_factor: 0.6,
            slot_skip_chance: 0.3,
            base_attest_weight: 1,
            max_extra_attest_weight: 3,
            blocks: 50,
            attestations_per_block: 2,
            justify_epochs_ago: 1,
            finalize_epochs_ago: 1,
            fork_choice_rule: "proto_array".to_string(),
            seed,
        }
    }

    fn discard_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn same_seed_produces_identical_head_sequence() {
        let log = discard_logger();
        let mut sim_a = Simulation::new(small_config(42)).unwrap();
        let head_a = sim_a.run(&log);

        let mut sim_b = Simulation::new(small_config(42)).unwrap();
        let head_b = sim_b.run(&log);

        assert_eq!(head_a, head_b);
    }

    #[test]
    fn different_seeds_need_not_agree() {
        let log = discard_logger();
        let mut sim_a = Simulation::new(small_config(1)).unwrap();
        let _ = sim_a.run(&log);
        let mut sim_b = Simulation::new(small_config(2)).unwrap();
        let _ = sim_b.run(&log);
        // Not asserting inequality (seeds could coincidentally agree);
        // this just exercises that both configurations run to
        // completion without a consistency-violation panic.
    }

    #[test]
    fn every_engine_agrees_on_the_same_simulated_stream() {
        let log = discard_logger();
        let rules = [
            "spec",
            "cached",
            "vitalik",
            "simple_back_prop",
            "stateful",
            "proto_array",
        ];
        let mut heads = Vec::new();
        for rule in rules {
            let mut cfg = small_config(7);
            cfg.fork_choice_rule = rule.to_string();
            let mut sim = Simulation::new(cfg).unwrap();
            heads.push(sim.run(&log));
        }
        for h in &heads[1..] {
            assert_eq!(*h, heads[0], "engines disagreed on simulated head");
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = small_config(1);
        cfg.validator_count = EPOCH_LENGTH + 1;
        assert!(Simulation::new(cfg).is_err());
    }
}
