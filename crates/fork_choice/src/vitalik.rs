use ghost_dag::{Arena, ForkChoice, NodeIndex, Result};
use ghost_types::Height;
use std::collections::HashMap;

const NUM_LEVELS: usize = 16;
const LOGZ_LEN: usize = 100_000;

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

/// Vitalik-optimized strategy (spec.md §4.3.c): the same cached-ancestor
/// machinery as [`crate::cached::Cached`] plus a clear-winner descent that
/// jumps several heights at a time when one candidate already holds a
/// majority of the remaining vote weight, and an only-child fast path
/// when descent hits a single-child node with no clear winner. The
/// bit-sampling child-selection heuristic present in an earlier draft of
/// the algorithm is deliberately not implemented: plain max-by-votes
/// replaces it, per the later revision.
pub struct Vitalik {
    latest_scores: HashMap<NodeIndex, i64>,
    ancestors: Vec<[Option<NodeIndex>; NUM_LEVELS]>,
    cache: HashMap<(NodeIndex, Height), NodeIndex>,
    logz: Vec<u8>,
    max_known_height: Height,
}

impl Default for Vitalik {
    fn default() -> Self {
        Vitalik {
            latest_scores: HashMap::new(),
            ancestors: Vec::new(),
            cache: HashMap::new(),
            logz: build_logz(),
            max_known_height: 0,
        }
    }
}

impl Vitalik {
    pub fn new() -> Self {
        Vitalik::default()
    }

    fn ensure_slot(&mut self, index: NodeIndex) {
        let i = index.index();
        if self.ancestors.len() <= i {
            self.ancestors.resize(i + 1, [None; NUM_LEVELS]);
        }
    }

    /// `pub(crate)` rather than private so the P3 property tests
    /// (`properties.rs`) can probe it directly against the naive
    /// parent-walk, the same way `Cached::ancestor` is exercised.
    pub(crate) fn ancestor(&mut self, arena: &Arena, block: NodeIndex, height: Height) -> Option<NodeIndex> {
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

    /// Sums `scores` by ancestor at `height`, returning the per-block
    /// totals and the grand total of weight that resolved to some
    /// ancestor at that height.
    fn scores_at_height(
        &mut self,
        arena: &Arena,
        scores: &HashMap<NodeIndex, i64>,
        height: Height,
    ) -> (HashMap<NodeIndex, i64>, i64) {
        let mut at_height: HashMap<NodeIndex, i64> = HashMap::new();
        let mut total = 0i64;
        let entries: Vec<(NodeIndex, i64)> = scores.iter().map(|(k, v)| (*k, *v)).collect();
        for (target, weight) in entries {
            if let Some(anc) = self.ancestor(arena, target, height) {
                *at_height.entry(anc).or_insert(0) += weight;
                total += weight;
            }
        }
        (at_height, total)
    }

    fn clear_winner(
        &mut self,
        arena: &Arena,
        scores: &HashMap<NodeIndex, i64>,
        height: Height,
    ) -> Option<NodeIndex> {
        let (at_height, total) = self.scores_at_height(arena, scores, height);
        at_height
            .into_iter()
            .find(|(_, weight)| *weight * 2 >= total)
            .map(|(node, _)| node)
    }
}

impl ForkChoice for Vitalik {
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
        self.cache.retain(|(node, _), anc| !pruned.contains(node) && !pruned.contains(anc));
    }

    fn head(&self, arena: &Arena, justified: NodeIndex) -> Result<NodeIndex> {
        // Descent mutates only its own scratch (the memoization cache and
        // a working copy of the votes); it never touches `latest_scores`
        // itself. `&self` suffices at the trait boundary by cloning the
        // handful of fields descent actually needs to mutate.
        let mut working = Working {
            scores: self.latest_scores.clone(),
            ancestors: &self.ancestors,
            cache: self.cache.clone(),
            logz: &self.logz,
            max_known_height: self.max_known_height,
        };
        working.descend(arena, justified)
    }
}

struct Working<'a> {
    scores: HashMap<NodeIndex, i64>,
    ancestors: &'a [[Option<NodeIndex>; NUM_LEVELS]],
    cache: HashMap<(NodeIndex, Height), NodeIndex>,
    logz: &'a [u8],
    max_known_height: Height,
}

impl<'a> Working<'a> {
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

    fn scores_at_height(&mut self, arena: &Arena, height: Height) -> (HashMap<NodeIndex, i64>, i64) {
        let mut at_height: HashMap<NodeIndex, i64> = HashMap::new();
        let mut total = 0i64;
        let entries: Vec<(NodeIndex, i64)> = self.scores.iter().map(|(k, v)| (*k, *v)).collect();
        for (target, weight) in entries {
            if let Some(anc) = self.ancestor(arena, target, height) {
                *at_height.entry(anc).or_insert(0) += weight;
                total += weight;
            }
        }
        (at_height, total)
    }

    fn clear_winner(&mut self, arena: &Arena, height: Height) -> Option<NodeIndex> {
        let (at_height, total) = self.scores_at_height(arena, height);
        at_height
            .into_iter()
            .find(|(_, weight)| *weight * 2 >= total)
            .map(|(node, _)| node)
    }

    fn floor_log2(n: u64, logz: &[u8]) -> u32 {
        if n == 0 {
            0
        } else {
            log2_floor(n, logz)
        }
    }

    fn prune_votes(&mut self, arena: &Arena, head: NodeIndex) {
        let head_height = arena.get(head).height;
        let targets: Vec<NodeIndex> = self.scores.keys().copied().collect();
        for target in targets {
            match self.ancestor(arena, target, head_height) {
                Some(anc) if anc == head => {}
                _ => {
                    self.scores.remove(&target);
                }
            }
        }
    }

    fn descend(&mut self, arena: &Arena, justified: NodeIndex) -> Result<NodeIndex> {
        let mut head = justified;
        loop {
            let children = arena.children(head).to_vec();
            if children.is_empty() {
                return Ok(head);
            }

            let head_height = arena.get(head).height;
            let mut step = Self::floor_log2(
                self.max_known_height.saturating_sub(head_height),
                self.logz,
            ) / 2;

            let mut jumped = false;
            while step > 0 {
                if let Some(winner) = self.clear_winner(arena, head_height + step as u64) {
                    head = winner;
                    jumped = true;
                    break;
                }
                step /= 2;
            }

            if jumped {
                self.prune_votes(arena, head);
                continue;
            }

            if children.len() == 1 {
                head = children[0];
            } else {
                let mut best = children[0];
                let mut best_votes = 0i64;
                let mut counted = HashMap::new();
                for &child in &children {
                    counted.insert(child, 0i64);
                }
                let next_height = head_height + 1;
                let targets: Vec<(NodeIndex, i64)> = self.scores.iter().map(|(k, v)| (*k, *v)).collect();
                for (target, weight) in targets {
                    if let Some(child) = self.ancestor(arena, target, next_height) {
                        if let Some(entry) = counted.get_mut(&child) {
                            *entry += weight;
                        }
                    }
                }
                best_votes = counted.get(&best).copied().unwrap_or(0);
                for &child in &children[1..] {
                    let votes = counted.get(&child).copied().unwrap_or(0);
                    if votes > best_votes {
                        best = child;
                        best_votes = votes;
                    }
                }
                head = best;
            }

            self.prune_votes(arena, head);
        }
    }
}
