//! The chunk frontier engine.

use std::collections::{HashMap, VecDeque};

use devastation_world::{BlockPos, ChunkCoord};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::frontier::{step_chunk, StepCounts};
use super::{repair, spread, DevastatedChunk};
use crate::context::TickContext;
use crate::events::{DevastationEvent, EventSender, TrackCause};

/// Counters that live across ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkEngineState {
    /// Ticks run.
    pub tick_counter: u64,
    /// Ticks since the last spread check.
    pub spread_counter: u32,
}

/// Persisted form of the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    /// Tracked chunks, ordered by coordinate.
    pub chunks: Vec<DevastatedChunk>,
    /// Chunks waiting for repair, front first.
    #[serde(default)]
    pub repair_queue: Vec<ChunkCoord>,
}

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkTickReport {
    /// Blocks converted inside tracked chunks.
    pub blocks_converted: u64,
    /// Blocks converted by edge bleed.
    pub bleed_converted: u64,
    /// Chunks that became fully devastated.
    pub fully_devastated: Vec<ChunkCoord>,
    /// Chunk repaired this tick.
    pub repaired: Option<ChunkCoord>,
    /// Chunks created by spreading.
    pub spread_to: Vec<ChunkCoord>,
}

/// Owns every tracked chunk and steps them.
#[derive(Clone, Debug, Default)]
pub struct ChunkFrontierEngine {
    chunks: HashMap<u64, DevastatedChunk>,
    repair_queue: VecDeque<u64>,
    state: ChunkEngineState,
}

impl ChunkFrontierEngine {
    /// Creates an engine tracking nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Looks up a tracked chunk.
    #[must_use]
    pub fn get(&self, coord: ChunkCoord) -> Option<&DevastatedChunk> {
        self.chunks.get(&coord.pack())
    }

    /// Returns true if the chunk is tracked.
    #[must_use]
    pub fn is_tracked(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord.pack())
    }

    /// Tracked chunks, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &DevastatedChunk> {
        self.chunks.values()
    }

    /// Chunks waiting for repair.
    #[must_use]
    pub fn repair_queue_len(&self) -> usize {
        self.repair_queue.len()
    }

    /// Engine counters.
    #[must_use]
    pub fn state(&self) -> ChunkEngineState {
        self.state
    }

    /// Starts tracking a chunk. Returns false if it already was.
    pub fn track(&mut self, coord: ChunkCoord, cause: TrackCause, events: &EventSender) -> bool {
        let key = coord.pack();
        if self.chunks.contains_key(&key) {
            return false;
        }
        self.chunks.insert(key, DevastatedChunk::new(coord));
        debug!(chunk = %coord, ?cause, "chunk tracked");
        events.send(DevastationEvent::ChunkTracked { chunk: coord, cause });
        true
    }

    /// Stops tracking a chunk without touching its blocks.
    pub fn untrack(&mut self, coord: ChunkCoord) -> Option<DevastatedChunk> {
        self.chunks.remove(&coord.pack())
    }

    /// Stops tracking every chunk whose centre column lies within
    /// `radius` of `center` horizontally.
    pub fn untrack_within(
        &mut self,
        center: BlockPos,
        radius: i32,
        events: &EventSender,
    ) -> Vec<ChunkCoord> {
        let limit = i64::from(radius) * i64::from(radius);
        let mut cleansed: Vec<ChunkCoord> = self
            .chunks
            .values()
            .map(|chunk| chunk.coord)
            .filter(|coord| {
                let middle = BlockPos::new(coord.center_x(), center.y, coord.center_z());
                middle.horizontal_distance_squared(center) <= limit
            })
            .collect();
        cleansed.sort_unstable();

        for coord in &cleansed {
            self.chunks.remove(&coord.pack());
            debug!(chunk = %coord, ward = %center, "chunk cleansed");
            events.send(DevastationEvent::ChunkCleansed {
                chunk: *coord,
                ward: center,
            });
        }
        cleansed
    }

    fn sorted_keys(&self) -> Vec<u64> {
        let mut coords: Vec<ChunkCoord> = self.chunks.values().map(|c| c.coord).collect();
        coords.sort_unstable();
        coords.into_iter().map(ChunkCoord::pack).collect()
    }

    /// Runs one step over every tracked chunk, then one repair and, on its
    /// interval, a spread check.
    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> ChunkTickReport {
        let mut report = ChunkTickReport::default();
        self.state.tick_counter += 1;
        let config = ctx.config;

        for key in self.sorted_keys() {
            let Some(mut chunk) = self.chunks.remove(&key) else {
                continue;
            };
            let tracked = &self.chunks;
            let is_tracked = |coord: ChunkCoord| tracked.contains_key(&coord.pack());

            let mut counts = StepCounts::default();
            if let Err(err) = step_chunk(&mut chunk, ctx, &is_tracked, &mut counts) {
                warn!(chunk = %chunk.coord, %err, "chunk step failed");
            }
            report.blocks_converted += counts.converted;
            report.bleed_converted += counts.bleed_converted;

            if chunk.frontier_initialized && chunk.frontier.is_empty() && !chunk.is_terminal() {
                if chunk.blocks_devastated >= config.chunks.min_blocks_for_full {
                    chunk.is_fully_devastated = true;
                    debug!(chunk = %chunk.coord, blocks = chunk.blocks_devastated, "chunk fully devastated");
                    ctx.events.send(DevastationEvent::ChunkFullyDevastated {
                        chunk: chunk.coord,
                        blocks: chunk.blocks_devastated,
                    });
                    report.fully_devastated.push(chunk.coord);
                } else if !chunk.queued_for_repair {
                    if self.repair_queue.len() < config.chunks.repair_queue_capacity {
                        chunk.queued_for_repair = true;
                        self.repair_queue.push_back(key);
                    } else {
                        debug!(
                            chunk = %chunk.coord,
                            queued = self.repair_queue.len(),
                            "repair queue full, retrying next tick"
                        );
                    }
                }
            }
            self.chunks.insert(key, chunk);
        }

        let repaired = self.repair_next(ctx, &mut report);
        report.repaired = repaired;

        self.state.spread_counter += 1;
        let interval = (f64::from(config.chunks.spread_interval_ticks) / ctx.speed())
            .round()
            .max(1.0) as u32;
        if self.state.spread_counter >= interval {
            self.state.spread_counter = 0;
            report.spread_to = self.spread_check(ctx);
        }
        report
    }

    /// Dequeues one stuck chunk and tries to reseed it.
    fn repair_next(
        &mut self,
        ctx: &mut TickContext<'_>,
        report: &mut ChunkTickReport,
    ) -> Option<ChunkCoord> {
        let key = self.repair_queue.pop_front()?;
        let chunk = self.chunks.get_mut(&key)?;
        chunk.queued_for_repair = false;
        if !chunk.is_stuck() {
            return None;
        }

        let cfg = &ctx.config.chunks;
        if chunk
            .last_repair_time
            .is_some_and(|last| ctx.now - last < cfg.repair_cooldown_seconds)
        {
            chunk.queued_for_repair = true;
            self.repair_queue.push_back(key);
            return None;
        }
        let max_attempts = cfg.max_repair_attempts;
        chunk.last_repair_time = Some(ctx.now);

        match repair::repair(chunk, ctx) {
            Ok(Some(converted)) => {
                debug!(chunk = %chunk.coord, frontier = chunk.frontier.len(), "chunk repaired");
                report.blocks_converted += converted;
                Some(chunk.coord)
            }
            Ok(None) => {
                chunk.repair_attempts += 1;
                if chunk.repair_attempts >= max_attempts {
                    chunk.is_unrepairable = true;
                    debug!(chunk = %chunk.coord, attempts = chunk.repair_attempts, "chunk unrepairable");
                }
                None
            }
            Err(err) => {
                warn!(chunk = %chunk.coord, %err, "chunk repair failed");
                None
            }
        }
    }

    /// Rolls every tracked, repairable chunk against the spread chance and
    /// seeds a random untracked, unprotected cardinal neighbour across the
    /// shared border. Returns the chunks created.
    pub fn spread_check(&mut self, ctx: &mut TickContext<'_>) -> Vec<ChunkCoord> {
        let chance = ctx.config.chunks.spread_chance.clamp(0.0, 1.0);
        let mut created = Vec::new();

        for key in self.sorted_keys() {
            let Some(from) = self
                .chunks
                .get(&key)
                .filter(|chunk| !chunk.is_unrepairable)
                .map(|chunk| chunk.coord)
            else {
                continue;
            };
            if !ctx.rng.gen_bool(chance) {
                continue;
            }
            let candidates: Vec<ChunkCoord> = from
                .neighbors()
                .into_iter()
                .filter(|n| !self.is_tracked(*n) && !ctx.protection.is_chunk_protected(*n))
                .collect();
            let Some(&to) = candidates.choose(ctx.rng) else {
                continue;
            };

            match spread::seed_across(from, to, ctx) {
                Ok(seeds) if !seeds.is_empty() => {
                    let mut chunk = DevastatedChunk::new(to);
                    chunk.blocks_devastated = seeds.len() as u64;
                    chunk.frontier = seeds.into();
                    chunk.frontier_initialized = true;
                    self.chunks.insert(to.pack(), chunk);
                    debug!(from = %from, chunk = %to, "chunk spread");
                    ctx.events.send(DevastationEvent::ChunkTracked {
                        chunk: to,
                        cause: TrackCause::Spread,
                    });
                    created.push(to);
                }
                Ok(_) => {}
                Err(err) => warn!(from = %from, chunk = %to, %err, "chunk spread failed"),
            }
        }
        created
    }

    /// Persisted form.
    #[must_use]
    pub fn snapshot(&self) -> ChunkSnapshot {
        let mut chunks: Vec<DevastatedChunk> = self.chunks.values().cloned().collect();
        chunks.sort_unstable_by_key(|chunk| chunk.coord);
        ChunkSnapshot {
            chunks,
            repair_queue: self
                .repair_queue
                .iter()
                .map(|key| ChunkCoord::unpack(*key))
                .collect(),
        }
    }

    /// Replaces every tracked chunk with a persisted set.
    pub fn restore(&mut self, snapshot: ChunkSnapshot, events: &EventSender) {
        self.chunks.clear();
        self.repair_queue.clear();
        self.state = ChunkEngineState::default();

        for mut chunk in snapshot.chunks {
            chunk.queued_for_repair = false;
            events.send(DevastationEvent::ChunkTracked {
                chunk: chunk.coord,
                cause: TrackCause::Restored,
            });
            self.chunks.insert(chunk.coord.pack(), chunk);
        }
        for coord in snapshot.repair_queue {
            if let Some(chunk) = self.chunks.get_mut(&coord.pack()) {
                if !chunk.queued_for_repair {
                    chunk.queued_for_repair = true;
                    self.repair_queue.push_back(coord.pack());
                }
            }
        }
    }
}
