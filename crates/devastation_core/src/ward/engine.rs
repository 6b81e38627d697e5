//! The rift ward engine: protection queries, host polling and healing.

use std::collections::HashMap;
use std::time::Duration;

use devastation_world::{BlockPos, ChunkCoord, CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::shell::next_in_shell;
use super::{HealProgress, RiftWard, WardHost};
use crate::config::{ScanMode, WardConfig};
use crate::context::TickContext;
use crate::error::DevastationResult;
use crate::events::{DevastationEvent, EventSender};
use crate::protection::ProtectionQuery;
use crate::rng::{point_in_sphere, project, unit_direction};

/// Area a ward has cleansed so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CleansedArea {
    /// Ward position.
    pub ward: BlockPos,
    /// Radius around the ward that is clean.
    pub radius: i32,
}

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WardTickReport {
    /// Blocks healed.
    pub blocks_healed: u64,
    /// Cleansed area of every active ward.
    pub cleansed: Vec<CleansedArea>,
}

/// Persisted form of the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WardSnapshot {
    /// Every known ward.
    pub wards: Vec<RiftWard>,
}

/// Owns every ward and answers protection queries.
#[derive(Clone, Debug)]
pub struct RiftWardEngine {
    wards: Vec<RiftWard>,
    /// Packed chunk key -> indices of active wards overlapping the chunk.
    chunk_cache: HashMap<u64, Vec<usize>>,
    radius: i32,
    mode: ScanMode,
}

impl RiftWardEngine {
    /// Creates an engine with no wards.
    #[must_use]
    pub fn new(config: &WardConfig) -> Self {
        Self {
            wards: Vec::new(),
            chunk_cache: HashMap::new(),
            radius: config.protection_radius.max(0),
            mode: config.mode,
        }
    }

    /// Every known ward.
    #[must_use]
    pub fn wards(&self) -> &[RiftWard] {
        &self.wards
    }

    /// Looks up a ward by position.
    #[must_use]
    pub fn get(&self, pos: BlockPos) -> Option<&RiftWard> {
        self.wards.iter().find(|w| w.pos == pos)
    }

    /// Number of known wards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wards.len()
    }

    /// Returns true if there are no wards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wards.is_empty()
    }

    /// Number of active wards.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.wards.iter().filter(|w| w.active).count()
    }

    /// Protection radius in effect.
    #[must_use]
    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Starts tracking a ward. It protects nothing until a poll finds it
    /// on and fuelled. Returns false if the position is already known.
    pub fn add(&mut self, pos: BlockPos, now: f64) -> bool {
        if self.get(pos).is_some() {
            return false;
        }
        debug!(%pos, "ward discovered");
        self.wards.push(RiftWard::new(pos, now));
        true
    }

    /// Forgets a ward.
    pub fn remove(&mut self, pos: BlockPos) -> bool {
        let before = self.wards.len();
        self.wards.retain(|w| w.pos != pos);
        let removed = self.wards.len() != before;
        if removed {
            debug!(%pos, "ward removed");
            self.rebuild_cache();
        }
        removed
    }

    /// Refreshes each ward's cached state from the host, at most once per
    /// poll interval per ward unless `force` is set. Wards whose structure
    /// is gone are removed.
    pub fn poll<H: WardHost + ?Sized>(
        &mut self,
        host: &H,
        real_now: Duration,
        config: &WardConfig,
        events: &EventSender,
        force: bool,
    ) {
        let interval = Duration::from_millis(config.poll_interval_ms);
        let mut changed = false;
        let mut gone = Vec::new();

        for ward in &mut self.wards {
            let due = force
                || ward
                    .last_poll
                    .map_or(true, |last| real_now.saturating_sub(last) >= interval);
            if !due {
                continue;
            }
            ward.last_poll = Some(real_now);

            let Some(state) = host.structure_at(ward.pos) else {
                gone.push(ward.pos);
                continue;
            };
            let active = state.is_on() && state.has_fuel();
            if active != ward.active {
                changed = true;
                ward.active = active;
                if active {
                    debug!(pos = %ward.pos, "ward activated");
                    events.send(DevastationEvent::WardActivated { pos: ward.pos });
                } else {
                    debug!(pos = %ward.pos, "ward deactivated");
                }
            }
        }

        if !gone.is_empty() {
            for pos in &gone {
                debug!(%pos, "ward structure gone");
            }
            self.wards.retain(|w| !gone.contains(&w.pos));
            changed = true;
        }
        if changed {
            self.rebuild_cache();
        }
    }

    /// Recomputes chunk membership for active wards.
    fn rebuild_cache(&mut self) {
        self.chunk_cache.clear();
        let radius = self.radius;
        let limit = i64::from(radius) * i64::from(radius);

        for (index, ward) in self.wards.iter().enumerate().filter(|(_, w)| w.active) {
            let low = ChunkCoord::from_block_pos(ward.pos.x - radius, ward.pos.z - radius);
            let high = ChunkCoord::from_block_pos(ward.pos.x + radius, ward.pos.z + radius);
            for cx in low.x..=high.x {
                for cz in low.z..=high.z {
                    let chunk = ChunkCoord::new(cx, cz);
                    // Closest point of the chunk's footprint to the ward.
                    let nx = ward.pos.x.clamp(chunk.world_x(), chunk.world_x() + CHUNK_SIZE - 1);
                    let nz = ward.pos.z.clamp(chunk.world_z(), chunk.world_z() + CHUNK_SIZE - 1);
                    let nearest = BlockPos::new(nx, ward.pos.y, nz);
                    if nearest.horizontal_distance_squared(ward.pos) <= limit {
                        self.chunk_cache.entry(chunk.pack()).or_default().push(index);
                    }
                }
            }
        }
    }

    /// Applies a changed mode or radius: progress resets and protection is
    /// recomputed.
    pub fn apply_config(&mut self, config: &WardConfig) {
        let radius = config.protection_radius.max(0);
        if radius == self.radius && config.mode == self.mode {
            return;
        }
        debug!(mode = ?config.mode, radius, "ward settings changed, progress reset");
        self.radius = radius;
        self.mode = config.mode;
        for ward in &mut self.wards {
            ward.progress = HealProgress::default();
        }
        self.rebuild_cache();
    }

    /// Heals around every active ward for `dt` seconds of budget.
    ///
    /// Returns the blocks healed and each active ward's cleansed area; the
    /// caller stops tracking chunks inside those areas.
    pub fn tick(&mut self, ctx: &mut TickContext<'_>, dt: f64) -> WardTickReport {
        let config = ctx.config;
        self.apply_config(&config.wards);
        let mut report = WardTickReport::default();
        let radius = self.radius;
        let mode = self.mode;
        let rate = config.wards.heal_rate * dt.max(0.0) * ctx.speed();

        for ward in self.wards.iter_mut().filter(|w| w.active) {
            let budget = ward.progress.budget_carry + rate;
            let heals = budget.floor().max(0.0);
            ward.progress.budget_carry = budget - heals;

            let result = match mode {
                ScanMode::Raster => raster_step(ward, ctx, radius, heals as u64),
                ScanMode::Radial => radial_step(ward, ctx, radius, heals as u64),
                ScanMode::Random => random_step(ward, ctx, radius, heals as u64),
            };
            match result {
                Ok(healed) => {
                    ward.progress.blocks_healed += healed;
                    report.blocks_healed += healed;
                }
                Err(err) => warn!(pos = %ward.pos, %err, "ward healing failed"),
            }
            report.cleansed.push(CleansedArea {
                ward: ward.pos,
                radius: cleansed_radius(&ward.progress, mode, radius),
            });
        }
        report
    }

    /// Persisted form.
    #[must_use]
    pub fn snapshot(&self) -> WardSnapshot {
        WardSnapshot {
            wards: self.wards.clone(),
        }
    }

    /// Replaces every ward with a persisted set.
    pub fn restore(&mut self, snapshot: WardSnapshot) {
        self.wards = snapshot.wards;
        for ward in &mut self.wards {
            ward.last_poll = None;
        }
        self.rebuild_cache();
    }
}

impl ProtectionQuery for RiftWardEngine {
    fn is_protected(&self, pos: BlockPos) -> bool {
        let Some(indices) = self.chunk_cache.get(&pos.chunk().pack()) else {
            return false;
        };
        let limit = i64::from(self.radius) * i64::from(self.radius);
        indices
            .iter()
            .filter_map(|index| self.wards.get(*index))
            .any(|ward| ward.pos.distance_squared(pos) <= limit)
    }

    fn is_chunk_protected(&self, chunk: ChunkCoord) -> bool {
        self.chunk_cache.contains_key(&chunk.pack())
    }
}

fn cleansed_radius(progress: &HealProgress, mode: ScanMode, radius: i32) -> i32 {
    match mode {
        ScanMode::Raster if progress.raster_scan_complete => radius,
        ScanMode::Raster => progress.current_clean_radius,
        ScanMode::Radial => progress.max_clean_radius_reached,
        ScanMode::Random => radius,
    }
}

/// Walks shells outward from the persisted cursor.
fn raster_step(
    ward: &mut RiftWard,
    ctx: &mut TickContext<'_>,
    radius: i32,
    heals: u64,
) -> DevastationResult<u64> {
    let scan_limit = ctx.config.wards.scan_limit_per_tick;
    let limit = i64::from(radius) * i64::from(radius);
    let progress = &mut ward.progress;
    let mut healed = 0;
    let mut examined = 0;

    while healed < heals && examined < scan_limit {
        let r = progress.current_clean_radius;
        let from = progress.raster_cursor.unwrap_or([-r, -r, -r]);
        let Some(offset) = next_in_shell(r, from) else {
            progress.max_clean_radius_reached = progress.max_clean_radius_reached.max(r);
            progress.raster_cursor = None;
            if r >= radius {
                debug!(pos = %ward.pos, "raster pass complete");
                progress.raster_scan_complete = true;
                progress.current_clean_radius = 0;
                break;
            }
            progress.current_clean_radius = r + 1;
            continue;
        };

        examined += 1;
        progress.raster_cursor = Some([offset[0], offset[1], offset[2] + 1]);
        let pos = ward.pos.offset(offset[0], offset[1], offset[2]);
        if pos.distance_squared(ward.pos) <= limit && ctx.try_heal(pos)? {
            healed += 1;
        }
    }
    Ok(healed)
}

/// Grows one radius, sampling its shell until enough samples come up clean.
fn radial_step(
    ward: &mut RiftWard,
    ctx: &mut TickContext<'_>,
    radius: i32,
    heals: u64,
) -> DevastationResult<u64> {
    let scan_limit = ctx.config.wards.scan_limit_per_tick;
    let max_failures = ctx.config.wards.radial_max_failures.max(1);
    let limit = i64::from(radius) * i64::from(radius);
    let progress = &mut ward.progress;
    let mut healed = 0;
    let mut examined = 0;

    while healed < heals && examined < scan_limit {
        let r = progress.current_clean_radius;
        if r == 0 {
            let mut swept = true;
            for dy in -radius..=radius {
                if healed >= heals {
                    swept = false;
                    break;
                }
                examined += 1;
                if ctx.try_heal(ward.pos.offset(0, dy, 0))? {
                    healed += 1;
                }
            }
            // The column is redone from the bottom until one pass finishes.
            if !swept {
                break;
            }
            progress.radial_clean_failures = 0;
            if radius == 0 {
                break;
            }
            progress.current_clean_radius = 1;
            continue;
        }

        examined += 1;
        let pos = project(ward.pos, unit_direction(ctx.rng), f64::from(r));
        if pos.distance_squared(ward.pos) <= limit && ctx.try_heal(pos)? {
            healed += 1;
            progress.radial_clean_failures = 0;
            continue;
        }
        progress.radial_clean_failures += 1;
        if progress.radial_clean_failures >= max_failures {
            progress.radial_clean_failures = 0;
            progress.max_clean_radius_reached = progress.max_clean_radius_reached.max(r);
            if r >= radius {
                progress.current_clean_radius = 0;
                break;
            }
            progress.current_clean_radius = r + 1;
        }
    }
    Ok(healed)
}

/// Uniform samples over the whole protection sphere.
fn random_step(
    ward: &mut RiftWard,
    ctx: &mut TickContext<'_>,
    radius: i32,
    heals: u64,
) -> DevastationResult<u64> {
    let scan_limit = ctx.config.wards.scan_limit_per_tick;
    let mut healed = 0;
    for _ in 0..scan_limit {
        if healed >= heals {
            break;
        }
        let pos = point_in_sphere(ctx.rng, ward.pos, radius);
        if ctx.try_heal(pos)? {
            healed += 1;
        }
    }
    Ok(healed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::Harness;
    use crate::ward::{StaticWardHost, WardStructure};
    use devastation_world::{names, VoxelGrid};

    fn center() -> BlockPos {
        BlockPos::new(0, 64, 0)
    }

    fn active_engine(h: &Harness) -> RiftWardEngine {
        let mut host = StaticWardHost::new();
        host.place(center(), WardStructure::running());
        let mut engine = RiftWardEngine::new(&h.config.wards);
        engine.add(center(), 0.0);
        engine.poll(&host, Duration::ZERO, &h.config.wards, &h.sender, true);
        engine
    }

    fn corrupt_ball(h: &mut Harness, radius: i32) -> u64 {
        let corrupted = h.id(names::SOIL_CORRUPTED);
        let limit = i64::from(radius) * i64::from(radius);
        let mut count = 0;
        for x in -radius..=radius {
            for y in -radius..=0 {
                for z in -radius..=radius {
                    let pos = center().offset(x, y, z);
                    if pos.distance_squared(center()) <= limit {
                        h.world.set(pos, corrupted).unwrap();
                        count += 1;
                    }
                }
            }
        }
        count
    }

    #[test]
    fn test_protection_needs_active_ward() {
        let h = Harness::soil();
        let mut engine = RiftWardEngine::new(&h.config.wards);
        engine.add(center(), 0.0);
        assert!(!engine.is_protected(center()));

        let engine = active_engine(&h);
        assert!(engine.is_protected(center()));
        assert!(engine.is_protected(BlockPos::new(16, 64, 0)));
        assert!(!engine.is_protected(BlockPos::new(17, 64, 0)));
        assert!(!engine.is_protected(BlockPos::new(12, 76, 0)));
        assert!(engine.is_chunk_protected(ChunkCoord::new(-1, -1)));
        assert!(!engine.is_chunk_protected(ChunkCoord::new(1, 0)));
    }

    #[test]
    fn test_chunk_cache_uses_footprint_distance() {
        let h = Harness::soil();
        let mut host = StaticWardHost::new();
        let ward = BlockPos::new(16, 64, 16);
        host.place(ward, WardStructure::running());
        let mut engine = RiftWardEngine::new(&h.config.wards);
        engine.add(ward, 0.0);
        engine.poll(&host, Duration::ZERO, &h.config.wards, &h.sender, true);

        // Edge neighbours are 16 away; diagonal corners are sqrt(2)*16 away.
        assert!(engine.is_chunk_protected(ChunkCoord::new(1, 0)));
        assert!(!engine.is_chunk_protected(ChunkCoord::new(1, 1)));
    }

    #[test]
    fn test_poll_throttles_and_removes() {
        let h = Harness::soil();
        let mut host = StaticWardHost::new();
        host.place(center(), WardStructure { on: true, fuel: false });
        let mut engine = RiftWardEngine::new(&h.config.wards);
        engine.add(center(), 0.0);

        engine.poll(&host, Duration::ZERO, &h.config.wards, &h.sender, false);
        assert_eq!(engine.active_count(), 0);

        host.get_mut(center()).unwrap().fuel = true;
        engine.poll(&host, Duration::from_millis(500), &h.config.wards, &h.sender, false);
        assert_eq!(engine.active_count(), 0, "cached until the interval passes");
        engine.poll(&host, Duration::from_millis(1000), &h.config.wards, &h.sender, false);
        assert_eq!(engine.active_count(), 1);
        assert_eq!(h.receiver.drain(), vec![DevastationEvent::WardActivated { pos: center() }]);

        host.remove(center());
        engine.poll(&host, Duration::from_millis(2000), &h.config.wards, &h.sender, false);
        assert!(engine.is_empty());
        assert!(!engine.is_protected(center()));
    }

    #[test]
    fn test_raster_heals_everything_and_completes() {
        let mut h = Harness::soil();
        h.config.wards.protection_radius = 8;
        corrupt_ball(&mut h, 10);
        let mut engine = active_engine(&h);

        let mut radii = Vec::new();
        for _ in 0..1000 {
            engine.tick(&mut h.ctx(), 0.5);
            let ward = engine.get(center()).unwrap();
            radii.push(ward.progress.current_clean_radius);
            if ward.progress.raster_scan_complete {
                break;
            }
        }
        let ward = engine.get(center()).unwrap();
        assert!(ward.progress.raster_scan_complete);
        assert_eq!(ward.progress.max_clean_radius_reached, 8);
        assert!(radii[..radii.len() - 1].windows(2).all(|w| w[0] <= w[1]));

        let ctx = h.ctx();
        for x in -10..=10 {
            for y in -10..=0 {
                for z in -10..=10 {
                    let pos = center().offset(x, y, z);
                    let inside = pos.distance_squared(center()) <= 64;
                    assert_eq!(ctx.is_devastated_at(pos), !inside && pos.distance_squared(center()) <= 100, "{pos}");
                }
            }
        }
    }

    #[test]
    fn test_raster_respects_heal_budget() {
        let mut h = Harness::soil();
        h.config.wards.heal_rate = 10.0;
        corrupt_ball(&mut h, 6);
        let mut engine = active_engine(&h);
        let report = engine.tick(&mut h.ctx(), 1.0);
        assert_eq!(report.blocks_healed, 10);

        h.config.wards.heal_rate = 0.5;
        let first = engine.tick(&mut h.ctx(), 1.0).blocks_healed;
        let second = engine.tick(&mut h.ctx(), 1.0).blocks_healed;
        assert_eq!(first + second, 1, "fractional budget carries over");
    }

    #[test]
    fn test_radial_advances_and_wraps() {
        let mut h = Harness::soil();
        h.config.wards.mode = ScanMode::Radial;
        h.config.wards.protection_radius = 6;
        corrupt_ball(&mut h, 6);
        let mut engine = active_engine(&h);

        for _ in 0..5000 {
            engine.tick(&mut h.ctx(), 0.5);
            if engine.get(center()).unwrap().progress.max_clean_radius_reached == 6 {
                break;
            }
        }
        let progress = &engine.get(center()).unwrap().progress;
        assert_eq!(progress.max_clean_radius_reached, 6);
        assert_eq!(progress.current_clean_radius, 0, "restarts past the protection radius");
        let ctx = h.ctx();
        assert!(!ctx.is_devastated_at(center()), "column swept at radius 0");
        assert!(!ctx.is_devastated_at(center().offset(0, -6, 0)));
    }

    #[test]
    fn test_radial_finishes_column_before_moving_out() {
        let mut h = Harness::soil();
        h.config.wards.mode = ScanMode::Radial;
        h.config.wards.protection_radius = 6;
        h.config.wards.heal_rate = 2.0;
        let corrupted = h.id(names::SOIL_CORRUPTED);
        for dy in -6..=0 {
            h.world.set(center().offset(0, dy, 0), corrupted).unwrap();
        }
        let mut engine = active_engine(&h);

        assert_eq!(engine.tick(&mut h.ctx(), 1.0).blocks_healed, 2);
        assert_eq!(engine.get(center()).unwrap().progress.current_clean_radius, 0);

        for _ in 0..3 {
            engine.tick(&mut h.ctx(), 1.0);
        }
        assert_eq!(engine.get(center()).unwrap().progress.blocks_healed, 7);
        let ctx = h.ctx();
        for dy in -6..=0 {
            assert!(!ctx.is_devastated_at(center().offset(0, dy, 0)), "y offset {dy}");
        }
    }

    #[test]
    fn test_random_mode_heals_and_reports_full_radius() {
        let mut h = Harness::soil();
        h.config.wards.mode = ScanMode::Random;
        corrupt_ball(&mut h, 5);
        let mut engine = active_engine(&h);
        let report = engine.tick(&mut h.ctx(), 0.5);
        assert!(report.blocks_healed > 0);
        assert_eq!(report.cleansed, vec![CleansedArea { ward: center(), radius: 16 }]);
    }

    #[test]
    fn test_mode_switch_resets_progress() {
        let mut h = Harness::soil();
        corrupt_ball(&mut h, 4);
        let mut engine = active_engine(&h);
        engine.tick(&mut h.ctx(), 0.5);
        assert!(engine.get(center()).unwrap().progress.blocks_healed > 0);

        h.config.wards.mode = ScanMode::Random;
        h.config.wards.heal_rate = 0.0;
        engine.tick(&mut h.ctx(), 0.5);
        assert_eq!(engine.get(center()).unwrap().progress, HealProgress::default());
    }

    #[test]
    fn test_healing_only_touches_devastated_blocks() {
        let mut h = Harness::soil();
        let mut engine = active_engine(&h);
        let before = h.world.clone();
        for _ in 0..20 {
            assert_eq!(engine.tick(&mut h.ctx(), 0.5).blocks_healed, 0);
        }
        for x in -16..=16 {
            for z in -16..=16 {
                let pos = BlockPos::new(x, 64, z);
                assert_eq!(h.world.get(pos), before.get(pos));
            }
        }
    }

    #[test]
    fn test_snapshot_keeps_cursor() {
        let mut h = Harness::soil();
        corrupt_ball(&mut h, 8);
        let mut engine = active_engine(&h);
        engine.tick(&mut h.ctx(), 0.5);

        let snapshot = engine.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let mut restored = RiftWardEngine::new(&h.config.wards);
        restored.restore(serde_json::from_str(&json).unwrap());
        let original = engine.get(center()).unwrap();
        let back = restored.get(center()).unwrap();
        assert_eq!(back.progress, original.progress);
        assert!(back.progress.raster_cursor.is_some());
        assert!(restored.is_protected(center()), "active state survives a restore");
    }
}
