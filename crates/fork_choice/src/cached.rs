use ghost_dag::{Arena, ForkChoice, NodeIndex, Result};
use ghost_types::Height;
use std::collections::HashMap;

const NUM_LEVELS: usize = 16;
const LOGZ_LEN: usize = 100_000;

/// `logz[i] = floor(log2(i))`, `logz[0] = logz[1] = 0` (spec.md §9, "Log
/// table"). Falls back to a bit-trick for indices beyond the precomputed
/// table, which only happens for chains far longer than any simulated
/// run exercises.
fn build_logz() -> Vec<u8> {
    let mut logz = vec![0u8; LOGZ_LEN];
    for i in 2..LOGZ_LEN {
        logz[i] = logz[i / 2] + 1;
    }
    logz
}

fn log2_floor(n: u64, logz: &[u8]) -> u32 {
    if (n as usize) < logz.len() {
        logz[n as usize] as u32
    } else {
        63 - n.leading_zeros()
    }
}

/// Cached-logarithmic-ancestor strategy (spec.md §4.3.b): a binary-lifting
/// table of `NUM_LEVELS` back-pointers per node turns `ancestor` from an
/// O(depth) walk into O(log depth), memoized in a flat cache keyed by
/// `(node, height)`.
pub struct Cached {
    latest_scores: HashMap<NodeIndex, i64>,
    ancestors: Vec<[Option<NodeIndex>; NUM_LEVELS]>,
    cache: HashMap<(NodeIndex, Height), NodeIndex>,
    logz: Vec<u8>,
}

impl Default for Cached {
    fn default() -> Self {
        Cached {
            latest_scores: HashMap::new(),
            ancestors: Vec::new(),
            cache: HashMap::new(),
            logz: build_logz(),
        }
    }
}

impl Cached {
    pub fn new() -> Self {
        Cached::default()
    }

    fn ensure_slot(&mut self, index: NodeIndex) {
        let i = index.index();
        if self.ancestors.len() <= i {
            self.ancestors.resize(i + 1, [None; NUM_LEVELS]);
        }
    }

    /// The spec `ancestor`, with caching and logarithmic skip-ahead.
    pub fn ancestor(&mut self, arena: &Arena, block: NodeIndex, height: Height) -> Option<NodeIndex> {
        let block_height = arena.get(block).height;
        if height >= block_height {
            return if height > block_height { None } else { Some(block) };
        }

        if let Some(hit) = self.cache.get(&(block, height)) {
            return Some(*hit);
        }

        let level = log2_floor(block_height - height - 1, &self.logz) as usize;
        let skip = self.ancestors[block.index()][level]?;
        let result = self.ancestor(arena, skip, height)?;

        self.cache.insert((block, height), result);
        Some(result)
    }

    fn vote_count(&mut self, arena: &Arena, block: NodeIndex) -> i64 {
        let height = arena.get(block).height;
        let targets: Vec<(NodeIndex, i64)> = self
            .latest_scores
            .iter()
            .map(|(t, w)| (*t, *w))
            .collect();
        targets
            .into_iter()
            .filter_map(|(target, weight)| {
                self.ancestor(arena, target, height)
                    .filter(|a| *a == block)
                    .map(|_| weight)
            })
            .sum()
    }
}

impl ForkChoice for Cached {
    fn on_new_node(&mut self, arena: &mut Arena, node: NodeIndex) {
        self.ensure_slot(node);
        let this = arena.get(node);
        let height = this.height;
        let parent = this.parent;
        for i in 0..NUM_LEVELS {
            let step = 1u64 << i;
            let back_pointer = if height % step == 0 {
                parent
            } else {
                parent.and_then(|p| self.ancestors[p.index()][i])
            };
            self.ancestors[node.index()][i] = back_pointer;
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
        self.cache.retain(|(node, _), anc| {
            !pruned.contains(node) && !pruned.contains(anc)
        });
    }

    fn head(&self, arena: &Arena, justified: NodeIndex) -> Result<NodeIndex> {
        // `ancestor` memoizes through `&mut self`, but `ForkChoice::head`
        // only borrows `&self` (descent never mutates fork-choice state
        // beyond its own cache). A `RefCell` would let the cache populate
        // here too; since `head` is called far more often read-only, we
        // simply recompute eagerly under an interior clone instead.
        let mut scratch = CachedScratch {
            latest_scores: &self.latest_scores,
            ancestors: &self.ancestors,
            cache: self.cache.clone(),
            logz: &self.logz,
        };
        let mut current = justified;
        loop {
            let children = arena.children(current);
            if children.is_empty() {
                return Ok(current);
            }
            let mut best = children[0];
            let mut best_votes = scratch.vote_count(arena, best);
            for &child in &children[1..] {
                let votes = scratch.vote_count(arena, child);
                if votes > best_votes {
                    best = child;
                    best_votes = votes;
                }
            }
            current = best;
        }
    }
}

/// Read-only view used by `head`, so descent never needs `&mut self` on
/// the strategy even though ancestor lookups are memoized.
struct CachedScratch<'a> {
    latest_scores: &'a HashMap<NodeIndex, i64>,
    ancestors: &'a [[Option<NodeIndex>; NUM_LEVELS]],
    cache: HashMap<(NodeIndex, Height), NodeIndex>,
    logz: &'a [u8],
}

impl<'a> CachedScratch<'a> {
    fn ancestor(&mut self, arena: &Arena, block: NodeIndex, height: Height) -> Option<NodeIndex> {
        let block_height = arena.get(block).height;
        if height >= block_height {
            return if height > block_height { None } else { Some(block) };
        }
        if let Some(hit) = self.cache.get(&(block, height)) {
            return Some(*hit);
        }
        let level = log2_floor(block_height - height - 1, self.logz) as usize;
        let skip = self.ancestors[block.index()][level]?;
        let result = self.ancestor(arena, skip, height)?;
        self.cache.insert((block, height), result);
        Some(result)
    }

    fn vote_count(&mut self, arena: &Arena, block: NodeIndex) -> i64 {
        let height = arena.get(block).height;
        let targets: Vec<(NodeIndex, i64)> = self.latest_scores.iter().map(|(t, w)| (*t, *w)).collect();
        targets
            .into_iter()
            .filter_map(|(target, weight)| {
                self.ancestor(arena, target, height)
                    .filter(|a| *a == block)
                    .map(|_| weight)
            })
            .sum()
    }
}
