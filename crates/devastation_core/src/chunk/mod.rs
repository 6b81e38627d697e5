//! # Devastated Chunks
//!
//! Chunk-scoped frontier flooding.
//!
//! ## Chunk States
//!
//! ```text
//! uninitialized ──> active (frontier non-empty) ──> fully devastated
//!                        │        ^
//!                        v        │
//!                  stuck (empty frontier, too few blocks)
//!                        │
//!                        └──> repair queue ──> unrepairable
//! ```
//!
//! A chunk's frontier holds corrupted blocks that still touch a convertible
//! neighbour inside the chunk. The invariant is re-verified lazily: members
//! are retired when picked and found to have nothing left to convert.

mod engine;
mod frontier;
mod repair;
mod spread;

use std::collections::HashMap;

use devastation_world::{BlockPos, ChunkCoord};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use engine::{ChunkEngineState, ChunkFrontierEngine, ChunkSnapshot, ChunkTickReport};

/// Insertion-ordered position set with O(1) random pick and removal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<BlockPos>", into = "Vec<BlockPos>")]
pub struct FrontierSet {
    members: Vec<BlockPos>,
    index: HashMap<BlockPos, usize>,
}

impl FrontierSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if there are no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns true if `pos` is a member.
    #[must_use]
    pub fn contains(&self, pos: BlockPos) -> bool {
        self.index.contains_key(&pos)
    }

    /// Adds `pos`; returns false if it was already present.
    pub fn insert(&mut self, pos: BlockPos) -> bool {
        if self.index.contains_key(&pos) {
            return false;
        }
        self.index.insert(pos, self.members.len());
        self.members.push(pos);
        true
    }

    /// Removes `pos`; returns false if it was absent.
    pub fn remove(&mut self, pos: BlockPos) -> bool {
        let Some(slot) = self.index.remove(&pos) else {
            return false;
        };
        self.members.swap_remove(slot);
        if let Some(moved) = self.members.get(slot) {
            self.index.insert(*moved, slot);
        }
        true
    }

    /// Uniformly random member.
    pub fn pick(&self, rng: &mut impl Rng) -> Option<BlockPos> {
        self.members.choose(rng).copied()
    }

    /// Shuffles and keeps `target` members.
    pub fn prune(&mut self, rng: &mut impl Rng, target: usize) {
        self.members.shuffle(rng);
        self.members.truncate(target);
        self.reindex();
    }

    /// Iterates members in their current order.
    pub fn iter(&self) -> impl Iterator<Item = BlockPos> + '_ {
        self.members.iter().copied()
    }

    fn reindex(&mut self) {
        self.index = self
            .members
            .iter()
            .enumerate()
            .map(|(slot, pos)| (*pos, slot))
            .collect();
    }
}

impl From<Vec<BlockPos>> for FrontierSet {
    fn from(members: Vec<BlockPos>) -> Self {
        let mut set = Self::new();
        for pos in members {
            set.insert(pos);
        }
        set
    }
}

impl From<FrontierSet> for Vec<BlockPos> {
    fn from(set: FrontierSet) -> Self {
        set.members
    }
}

/// A block pushed across the chunk edge, with hops left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleedEntry {
    /// Corrupted block outside the owning chunk.
    pub pos: BlockPos,
    /// Further hops this entry may make.
    pub remaining: u32,
}

/// One tracked 32x32 column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DevastatedChunk {
    /// Column coordinate.
    pub coord: ChunkCoord,
    /// Blocks converted inside the column.
    pub blocks_devastated: u64,
    /// Blocks converted across the edge by bleed.
    #[serde(default)]
    pub bleed_blocks: u64,
    /// Growth boundary.
    pub frontier: FrontierSet,
    /// Blocks bleeding into neighbouring columns.
    pub bleed_frontier: Vec<BleedEntry>,
    /// Frontier has been seeded at least once.
    pub frontier_initialized: bool,
    /// Terminal: frontier emptied after enough conversions.
    pub is_fully_devastated: bool,
    /// Terminal: repair gave up.
    pub is_unrepairable: bool,
    /// Consecutive repairs that found nothing.
    pub repair_attempts: u32,
    /// Simulated time of the last repair.
    pub last_repair_time: Option<f64>,
    /// Waiting in the repair queue.
    #[serde(default)]
    pub queued_for_repair: bool,
    /// Ticks since the last fill-in pass.
    pub fill_in_tick_counter: u32,
}

impl DevastatedChunk {
    /// A freshly tracked, uninitialized chunk.
    #[must_use]
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks_devastated: 0,
            bleed_blocks: 0,
            frontier: FrontierSet::new(),
            bleed_frontier: Vec::new(),
            frontier_initialized: false,
            is_fully_devastated: false,
            is_unrepairable: false,
            repair_attempts: 0,
            last_repair_time: None,
            queued_for_repair: false,
            fill_in_tick_counter: 0,
        }
    }

    /// Fully devastated or unrepairable.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_fully_devastated || self.is_unrepairable
    }

    /// Initialized, empty frontier, not terminal.
    #[must_use]
    pub fn is_stuck(&self) -> bool {
        self.frontier_initialized && self.frontier.is_empty() && !self.is_terminal()
    }

    /// Converted blocks relative to `nominal`, clamped to 0..=1.
    #[must_use]
    pub fn devastation_level(&self, nominal: u64) -> f64 {
        if self.is_fully_devastated {
            return 1.0;
        }
        if nominal == 0 {
            return 0.0;
        }
        (self.blocks_devastated as f64 / nominal as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;

    fn pos(x: i32) -> BlockPos {
        BlockPos::new(x, 64, 0)
    }

    #[test]
    fn test_frontier_set_remove_keeps_index() {
        let mut set = FrontierSet::new();
        for x in 0..5 {
            assert!(set.insert(pos(x)));
        }
        assert!(!set.insert(pos(2)));
        assert!(set.remove(pos(1)));
        assert!(!set.remove(pos(1)));
        assert_eq!(set.len(), 4);
        for x in [0, 2, 3, 4] {
            assert!(set.contains(pos(x)));
            assert!(set.remove(pos(x)));
        }
        assert!(set.is_empty());
    }

    #[test]
    fn test_frontier_set_prune() {
        let mut rng = seeded_rng(Some(1));
        let mut set: FrontierSet = (0..50).map(pos).collect::<Vec<_>>().into();
        set.prune(&mut rng, 10);
        assert_eq!(set.len(), 10);
        let kept: Vec<BlockPos> = set.iter().collect();
        for p in kept {
            assert!(set.remove(p));
        }
        assert!(set.is_empty());
    }

    #[test]
    fn test_frontier_set_serializes_as_list() {
        let set: FrontierSet = vec![pos(1), pos(2)].into();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"[{"x":1,"y":64,"z":0},{"x":2,"y":64,"z":0}]"#);
        let back: FrontierSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_devastation_level() {
        let mut chunk = DevastatedChunk::new(ChunkCoord::new(0, 0));
        chunk.blocks_devastated = 250;
        assert!((chunk.devastation_level(1000) - 0.25).abs() < 1e-9);
        chunk.blocks_devastated = 4000;
        assert!((chunk.devastation_level(1000) - 1.0).abs() < 1e-9);
    }
}
