//! The source growth engine.

use std::collections::BTreeSet;

use devastation_world::{BlockPos, ChunkCoord};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::metastasis::{find_spawn_position, local_saturation};
use super::population::eviction_candidate;
use super::{DevastationSource, Placement};
use crate::config::{DevastationConfig, SourceConfig};
use crate::context::TickContext;
use crate::error::DevastationResult;
use crate::events::{DevastationEvent, EventSender, RemovalReason};
use crate::rng::{project, roll_budget, unit_direction};

/// Counters that live across ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceEngineState {
    /// Ticks run.
    pub tick_counter: u64,
    /// Ticks since the last saturated-source sweep.
    pub cleanup_counter: u32,
    /// Next id handed out.
    pub next_id: u64,
}

/// Persisted form of the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    /// Next id handed out.
    pub next_id: u64,
    /// Every source.
    pub sources: Vec<DevastationSource>,
}

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceTickReport {
    /// Blocks devastated.
    pub blocks_converted: u64,
    /// Blocks healed by healing sources.
    pub blocks_healed: u64,
    /// Ids of children spawned.
    pub children_spawned: Vec<u64>,
    /// Ids of sources removed.
    pub sources_removed: Vec<u64>,
    /// Chunks containing at least one conversion.
    pub touched_chunks: BTreeSet<ChunkCoord>,
}

/// Owns every source and steps them.
#[derive(Clone, Debug)]
pub struct SourceGrowthEngine {
    sources: Vec<DevastationSource>,
    state: SourceEngineState,
}

impl Default for SourceGrowthEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceGrowthEngine {
    /// Creates an engine with no sources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            state: SourceEngineState {
                next_id: 1,
                ..SourceEngineState::default()
            },
        }
    }

    /// Every source, in placement order.
    #[must_use]
    pub fn sources(&self) -> &[DevastationSource] {
        &self.sources
    }

    /// Looks up a source.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&DevastationSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if there are no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Engine counters.
    #[must_use]
    pub fn state(&self) -> SourceEngineState {
        self.state
    }

    /// Places a protected source, evicting one under the population cap if
    /// needed.
    ///
    /// Returns `None` if the cap is reached and nothing can be evicted.
    pub fn place(
        &mut self,
        placement: Placement,
        config: &DevastationConfig,
        events: &EventSender,
    ) -> Option<u64> {
        let mut removals = Vec::new();
        if !self.make_room(config.sources.max_sources, &mut removals) {
            debug!(pos = %placement.pos, "source rejected: population full");
            return None;
        }
        self.apply_removals(&removals, events, None);

        let id = self.allocate_id();
        let source = DevastationSource::placed(id, placement, &config.sources);
        debug!(id, pos = %source.pos, healing = source.is_healing, "source placed");
        events.send(DevastationEvent::SourceSpawned {
            id,
            pos: source.pos,
            parent: None,
            generation: 0,
        });
        self.sources.push(source);
        Some(id)
    }

    /// Removes a source by id.
    pub fn remove(&mut self, id: u64, events: &EventSender) -> bool {
        let found = self.sources.iter().any(|s| s.id == id);
        if found {
            self.apply_removals(&[(id, RemovalReason::Manual)], events, None);
        }
        found
    }

    /// Runs one growth step over every source.
    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> SourceTickReport {
        let mut report = SourceTickReport::default();
        let mut removals: Vec<(u64, RemovalReason)> = Vec::new();
        let mut spawn_requests: Vec<u64> = Vec::new();
        self.state.tick_counter += 1;

        for source in &mut self.sources {
            match ctx.grid.get(source.pos) {
                Ok(anchor) if anchor.is_air() => {
                    removals.push((source.id, RemovalReason::AnchorLost));
                    continue;
                }
                Ok(_) => {}
                Err(fault) => {
                    warn!(source = source.id, %fault, "source anchor unreadable");
                    continue;
                }
            }
            if source.is_saturated {
                continue;
            }

            if let Err(err) = grow(source, ctx, &mut report) {
                warn!(source = source.id, %err, "source tick failed");
                continue;
            }
            if wants_metastasis(source, ctx) {
                spawn_requests.push(source.id);
            }
        }

        for parent_id in spawn_requests {
            if removals.iter().any(|(id, _)| *id == parent_id) {
                continue;
            }
            self.metastasize(parent_id, ctx, &mut removals, &mut report);
        }

        self.state.cleanup_counter += 1;
        if self.state.cleanup_counter >= ctx.config.sources.cleanup_interval_ticks {
            self.state.cleanup_counter = 0;
            for source in &self.sources {
                let already = removals.iter().any(|(id, _)| *id == source.id);
                if !already && source.is_saturated && !source.is_protected && !source.is_healing {
                    removals.push((source.id, RemovalReason::Saturated));
                }
            }
        }

        self.apply_removals(&removals, ctx.events, Some(&mut report));
        report
    }

    /// Spawns a child for `parent_id` or records the failed search.
    fn metastasize(
        &mut self,
        parent_id: u64,
        ctx: &mut TickContext<'_>,
        removals: &mut Vec<(u64, RemovalReason)>,
        report: &mut SourceTickReport,
    ) {
        let Some(parent) = self.get(parent_id).cloned() else {
            return;
        };
        let existing: Vec<BlockPos> = self
            .sources
            .iter()
            .filter(|s| !removals.iter().any(|(id, _)| *id == s.id))
            .map(|s| s.pos)
            .collect();

        let spawned = match find_spawn_position(&parent, &existing, ctx) {
            Some(pos) => self.spawn_child(&parent, pos, ctx, removals, report),
            None => false,
        };

        let cfg = &ctx.config.sources;
        let Some(parent) = self.sources.iter_mut().find(|s| s.id == parent_id) else {
            return;
        };
        parent.blocks_since_last_metastasis = 0;
        parent.forced_metastasis = false;
        if spawned {
            parent.children_spawned += 1;
            parent.last_child_spawn_time = Some(ctx.now);
            parent.failed_spawn_attempts = 0;
            if parent.children_spawned >= cfg.max_children {
                parent.is_saturated = true;
                debug!(source = parent.id, "source saturated after spawning children");
            }
        } else {
            parent.failed_spawn_attempts += 1;
            if parent.failed_spawn_attempts >= cfg.max_failed_spawn_attempts {
                parent.is_saturated = true;
                debug!(source = parent.id, "source saturated after failed spawn searches");
            }
        }
    }

    fn spawn_child(
        &mut self,
        parent: &DevastationSource,
        pos: BlockPos,
        ctx: &mut TickContext<'_>,
        removals: &mut Vec<(u64, RemovalReason)>,
        report: &mut SourceTickReport,
    ) -> bool {
        let mut pending = removals.clone();
        if !self.make_room(ctx.config.sources.max_sources, &mut pending) {
            debug!(parent = parent.id, "child rejected: population full");
            return false;
        }
        match ctx.try_convert(pos) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => {
                warn!(parent = parent.id, %pos, %err, "child anchor conversion failed");
                return false;
            }
        }
        *removals = pending;

        let id = self.allocate_id();
        let child = DevastationSource::child_of(parent, id, pos, &ctx.config.sources);
        debug!(id, parent = parent.id, %pos, generation = child.generation_level, "metastasis");
        ctx.events.send(DevastationEvent::SourceSpawned {
            id,
            pos,
            parent: Some(parent.id),
            generation: child.generation_level,
        });
        report.blocks_converted += 1;
        report.touched_chunks.insert(pos.chunk());
        report.children_spawned.push(id);
        self.sources.push(child);
        true
    }

    /// Marks evictions until one more source fits under `max`.
    fn make_room(&self, max: usize, removals: &mut Vec<(u64, RemovalReason)>) -> bool {
        let mut active = self.sources.len().saturating_sub(removals.len());
        while active >= max {
            let pending: &[(u64, RemovalReason)] = removals;
            let Some(index) =
                eviction_candidate(&self.sources, |id| pending.iter().any(|(r, _)| *r == id))
            else {
                return false;
            };
            removals.push((self.sources[index].id, RemovalReason::Evicted));
            active -= 1;
        }
        true
    }

    fn apply_removals(
        &mut self,
        removals: &[(u64, RemovalReason)],
        events: &EventSender,
        mut report: Option<&mut SourceTickReport>,
    ) {
        if removals.is_empty() {
            return;
        }
        self.sources.retain(|source| {
            let Some((_, reason)) = removals.iter().find(|(id, _)| *id == source.id) else {
                return true;
            };
            debug!(id = source.id, pos = %source.pos, ?reason, "source removed");
            events.send(DevastationEvent::SourceRemoved {
                id: source.id,
                pos: source.pos,
                reason: *reason,
            });
            if let Some(report) = report.as_deref_mut() {
                report.sources_removed.push(source.id);
            }
            false
        });
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.state.next_id;
        self.state.next_id += 1;
        id
    }

    /// Persisted form.
    #[must_use]
    pub fn snapshot(&self) -> SourceSnapshot {
        SourceSnapshot {
            next_id: self.state.next_id,
            sources: self.sources.clone(),
        }
    }

    /// Replaces every source with a persisted set.
    pub fn restore(&mut self, snapshot: SourceSnapshot) {
        let max_id = snapshot.sources.iter().map(|s| s.id).max().unwrap_or(0);
        self.state = SourceEngineState {
            next_id: snapshot.next_id.max(max_id + 1),
            ..SourceEngineState::default()
        };
        self.sources = snapshot.sources;
    }
}

/// Radial conversion (or healing) attempts for one source.
fn grow(
    source: &mut DevastationSource,
    ctx: &mut TickContext<'_>,
    report: &mut SourceTickReport,
) -> DevastationResult<()> {
    let desired = roll_budget(ctx.rng, source.amount * ctx.speed());
    let attempts = ctx.config.sources.attempts_per_conversion;

    for _ in 0..desired {
        for _ in 0..attempts {
            let direction = unit_direction(ctx.rng);
            let u: f64 = ctx.rng.gen();
            let distance = f64::from(source.current_radius) * (1.0 - u.sqrt());
            let target = project(source.pos, direction, distance);

            let success = if source.is_healing {
                ctx.try_heal(target)?
            } else {
                ctx.try_convert(target)?
            };

            source.window_attempts += 1;
            if success {
                source.window_successes += 1;
                if source.is_healing {
                    report.blocks_healed += 1;
                } else {
                    source.blocks_devastated_total += 1;
                    source.blocks_since_last_metastasis += 1;
                    report.blocks_converted += 1;
                    report.touched_chunks.insert(target.chunk());
                }
            }
            if source.window_attempts >= ctx.config.sources.success_window {
                close_window(source, ctx.config);
            }
            if success {
                break;
            }
        }
    }
    Ok(())
}

/// Adaptive radius and stall detection at the end of a success window.
fn close_window(source: &mut DevastationSource, config: &DevastationConfig) {
    let cfg: &SourceConfig = &config.sources;
    let rate = source.success_rate();
    source.window_attempts = 0;
    source.window_successes = 0;

    if rate < cfg.low_success_threshold && !source.at_full_radius() {
        let step = if rate < cfg.low_success_threshold / 2.0 { 4 } else { 2 };
        source.current_radius = (source.current_radius + step).min(source.range);
    }

    if source.is_healing {
        return;
    }
    if rate < cfg.very_low_success_threshold && source.at_full_radius() {
        source.stall_counter += 1;
    } else {
        source.stall_counter = 0;
    }
    if source.stall_counter >= cfg.max_stall_windows {
        source.stall_counter = 0;
        if cfg.metastasis_enabled {
            source.forced_metastasis = true;
        } else {
            source.is_saturated = true;
            debug!(source = source.id, "source saturated after stalling");
        }
    }
}

fn wants_metastasis(source: &DevastationSource, ctx: &mut TickContext<'_>) -> bool {
    let cfg = &ctx.config.sources;
    if source.is_healing || source.is_saturated || !cfg.metastasis_enabled {
        return false;
    }
    let cooldown = cfg.child_spawn_delay_seconds / ctx.speed();
    if source
        .last_child_spawn_time
        .is_some_and(|last| ctx.now - last < cooldown)
    {
        return false;
    }
    if source.forced_metastasis {
        return true;
    }
    if source.blocks_since_last_metastasis < source.metastasis_threshold || !source.at_full_radius()
    {
        return false;
    }
    let threshold = cfg.saturation_threshold;
    local_saturation(source, ctx) >= threshold
}
