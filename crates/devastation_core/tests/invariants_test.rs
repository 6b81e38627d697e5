//! # Cross-Engine Invariants
//!
//! Properties that must hold whatever the random rolls: bleed stays near
//! its chunk, wards veto conversions, raster progress never goes backward
//! and terminal chunks stay put. Also the source heuristics that only show
//! up over many windows: radius steps, stalls and spawn cooldowns.

mod common;

use std::time::Duration;

use common::World;
use devastation_core::{
    ChunkFrontierEngine, DevastationConfig, MemoryBlobStore, Placement, ProtectionQuery,
    RiftWardEngine, SavedState, SourceGrowthEngine, StaticWardHost, TrackCause, WardStructure,
};
use devastation_world::{BlockPos, ChunkCoord, CHUNK_SIZE};

/// How far outside chunk (0, 0) a position lies horizontally.
fn distance_outside_origin(pos: BlockPos) -> i32 {
    let dx = (-pos.x).max(pos.x - (CHUNK_SIZE - 1)).max(0);
    let dz = (-pos.z).max(pos.z - (CHUNK_SIZE - 1)).max(0);
    dx + dz
}

#[test]
fn test_edge_bleed_stays_within_its_hop_budget() {
    let mut world = World::soil();
    world.config.chunks.edge_bleed_chance = 1.0;
    world.config.chunks.bleed_spread_budget = 3;
    world.config.chunks.spread_chance = 0.0;
    world.config.chunks.max_depth_below_surface = Some(2);
    world.config.chunks.base_budget = 40;

    let origin = ChunkCoord::new(0, 0);
    let mut engine = ChunkFrontierEngine::new();
    engine.track(origin, TrackCause::Manual, &world.sender);
    let mut bled = 0;
    for _ in 0..400 {
        bled += engine.tick(&mut world.ctx()).bleed_converted;
    }
    assert!(bled > 0, "edge blocks bleed when the chance is 1");
    assert_eq!(engine.get(origin).unwrap().bleed_blocks, bled);

    let reach = world.config.chunks.bleed_spread_budget as i32 + 1;
    let outside: Vec<BlockPos> = world
        .devastated_in(BlockPos::new(-12, 40, -12), BlockPos::new(43, 64, 43))
        .into_iter()
        .filter(|pos| !origin.contains(*pos))
        .collect();
    assert!(!outside.is_empty());
    assert!(outside.iter().all(|pos| distance_outside_origin(*pos) <= reach));
    assert_eq!(engine.len(), 1, "bleed never tracks a chunk");
}

#[test]
fn test_active_ward_vetoes_every_conversion() {
    let mut world = World::soil();
    world.config.chunks.edge_bleed_chance = 1.0;
    world.config.chunks.spread_chance = 1.0;
    world.config.chunks.spread_interval_ticks = 5;

    let ward_pos = BlockPos::new(6, 64, 6);
    let mut host = StaticWardHost::new();
    host.place(ward_pos, WardStructure::running());
    let mut wards = RiftWardEngine::new(&world.config.wards);
    wards.add(ward_pos, 0.0);
    wards.poll(&host, Duration::ZERO, &world.config.wards, &world.sender, true);
    assert!(wards.is_protected(ward_pos));

    let mut sources = SourceGrowthEngine::new();
    sources.place(Placement::new(BlockPos::new(10, 64, 10), 12, 6.0), &world.config, &world.sender);
    let mut chunks = ChunkFrontierEngine::new();
    chunks.track(ChunkCoord::new(1, 0), TrackCause::Manual, &world.sender);
    chunks.track(ChunkCoord::new(0, -1), TrackCause::Manual, &world.sender);

    for _ in 0..300 {
        sources.tick(&mut world.ctx_with(&wards));
        chunks.tick(&mut world.ctx_with(&wards));
    }

    let limit = i64::from(world.config.wards.protection_radius).pow(2);
    let r = world.config.wards.protection_radius;
    let inside: Vec<BlockPos> = world
        .devastated_in(ward_pos.offset(-r, -r, -r), ward_pos.offset(r, 0, r))
        .into_iter()
        .filter(|pos| pos.distance_squared(ward_pos) <= limit)
        .collect();
    assert!(inside.is_empty(), "devastated inside the ward: {inside:?}");
    assert!(!chunks.is_tracked(ChunkCoord::new(0, 0)), "protected chunks are never spread into");
}

#[test]
fn test_raster_progress_is_monotone() {
    let mut world = World::soil();
    world.config.wards.protection_radius = 10;
    world.config.wards.heal_rate = 30.0;
    world.config.wards.scan_limit_per_tick = 256;
    let mut sources = SourceGrowthEngine::new();
    sources.place(Placement::new(BlockPos::new(0, 64, 0), 12, 20.0), &world.config, &world.sender);
    for _ in 0..200 {
        sources.tick(&mut world.ctx());
    }
    sources.remove(1, &world.sender);

    let ward_pos = BlockPos::new(0, 64, 0);
    let mut host = StaticWardHost::new();
    host.place(ward_pos, WardStructure::running());
    let mut wards = RiftWardEngine::new(&world.config.wards);
    wards.add(ward_pos, 0.0);
    wards.poll(&host, Duration::ZERO, &world.config.wards, &world.sender, true);

    let mut max_clean = 0;
    let mut cleansed = 0;
    for _ in 0..5_000 {
        let report = wards.tick(&mut world.ctx(), 0.5);
        let progress = &wards.get(ward_pos).unwrap().progress;
        assert!(progress.max_clean_radius_reached >= max_clean);
        max_clean = progress.max_clean_radius_reached;
        assert!(report.cleansed[0].radius >= cleansed);
        cleansed = report.cleansed[0].radius;
        if progress.raster_scan_complete {
            break;
        }
    }
    assert_eq!(cleansed, 10);
    assert_eq!(max_clean, 10);
}

#[test]
fn test_terminal_chunks_never_change() {
    let mut world = World::soil();
    world.config.chunks.max_depth_below_surface = Some(1);
    world.config.chunks.edge_bleed_chance = 0.0;
    world.config.chunks.spread_chance = 0.0;
    world.config.chunks.base_budget = 100;
    world.config.chunks.frontier_prune_threshold = 100_000;
    world.config.chunks.frontier_prune_target = 50_000;

    let origin = ChunkCoord::new(0, 0);
    let mut engine = ChunkFrontierEngine::new();
    engine.track(origin, TrackCause::Manual, &world.sender);
    for _ in 0..5_000 {
        if engine.get(origin).unwrap().is_terminal() {
            break;
        }
        engine.tick(&mut world.ctx());
    }
    let settled = engine.get(origin).unwrap().clone();
    assert!(settled.is_fully_devastated);
    world.receiver.drain();

    for _ in 0..100 {
        let report = engine.tick(&mut world.ctx());
        assert_eq!(report.blocks_converted, 0);
    }
    assert_eq!(engine.get(origin).unwrap(), &settled);
    assert!(world.receiver.drain().is_empty());
}

#[test]
fn test_restored_state_keeps_running() {
    let mut world = World::soil();
    let mut sources = SourceGrowthEngine::new();
    sources.place(Placement::new(BlockPos::new(0, 64, 0), 8, 3.0), &world.config, &world.sender);
    let mut chunks = ChunkFrontierEngine::new();
    chunks.track(ChunkCoord::new(2, 2), TrackCause::Manual, &world.sender);
    let mut wards = RiftWardEngine::new(&world.config.wards);
    wards.add(BlockPos::new(-40, 64, -40), 0.0);
    for _ in 0..50 {
        sources.tick(&mut world.ctx());
        chunks.tick(&mut world.ctx());
    }

    let saved = SavedState {
        sources: sources.snapshot(),
        chunks: chunks.snapshot(),
        wards: wards.snapshot(),
        regen: world.regen.snapshot(),
    };
    let store = MemoryBlobStore::new();
    saved.save(&store).unwrap();
    let loaded = SavedState::load(&store);

    let mut sources = SourceGrowthEngine::new();
    sources.restore(loaded.sources);
    let mut chunks = ChunkFrontierEngine::new();
    chunks.restore(loaded.chunks, &world.sender);
    let mut wards = RiftWardEngine::new(&DevastationConfig::default().wards);
    wards.restore(loaded.wards);

    assert_eq!(sources.snapshot(), saved.sources);
    assert_eq!(chunks.snapshot(), saved.chunks);
    assert_eq!(wards.len(), 1);
    assert_eq!(wards.get(BlockPos::new(-40, 64, -40)).unwrap().progress.current_clean_radius, 0);
    assert_eq!(wards.radius(), 16);

    let id = sources
        .place(Placement::new(BlockPos::new(60, 64, 60), 4, 1.0), &world.config, &world.sender)
        .unwrap();
    assert!(saved.sources.sources.iter().all(|s| s.id != id));
    let before = chunks.get(ChunkCoord::new(2, 2)).unwrap().blocks_devastated;
    for _ in 0..10 {
        chunks.tick(&mut world.ctx());
    }
    assert!(chunks.get(ChunkCoord::new(2, 2)).unwrap().blocks_devastated > before);
}

#[test]
fn test_barren_windows_widen_radius_by_four() {
    let mut world = World::bedrock();
    world.config.sources.metastasis_enabled = false;
    let mut sources = SourceGrowthEngine::new();
    let id = sources
        .place(Placement::new(BlockPos::new(0, 64, 0), 20, 1.0), &world.config, &world.sender)
        .unwrap();
    assert_eq!(sources.get(id).unwrap().current_radius, 2);

    // Five failed attempts per tick close a 100-attempt window every 20 ticks.
    for _ in 0..19 {
        sources.tick(&mut world.ctx());
    }
    assert_eq!(sources.get(id).unwrap().current_radius, 2);
    sources.tick(&mut world.ctx());
    assert_eq!(sources.get(id).unwrap().current_radius, 6);
    for _ in 0..20 {
        sources.tick(&mut world.ctx());
    }
    assert_eq!(sources.get(id).unwrap().current_radius, 10);
}

#[test]
fn test_moderate_windows_widen_radius_by_two() {
    let mut world = World::soil();
    world.config.sources.metastasis_enabled = false;
    world.config.sources.initial_radius = 8;
    world.config.sources.attempts_per_conversion = 1;
    world.config.sources.low_success_threshold = 1.0;
    let mut sources = SourceGrowthEngine::new();
    // Buried in soil, so most of one 100-attempt tick lands on fresh blocks
    // and only repeat hits near the centre fail.
    let id = sources
        .place(Placement::new(BlockPos::new(0, 30, 0), 20, 100.0), &world.config, &world.sender)
        .unwrap();

    let report = sources.tick(&mut world.ctx());
    let source = sources.get(id).unwrap();
    assert!(report.blocks_converted >= 50, "{}", report.blocks_converted);
    assert!(report.blocks_converted < 100);
    assert_eq!(source.window_attempts, 0, "window closed");
    assert_eq!(source.current_radius, 10);
}

#[test]
fn test_stalled_source_forces_metastasis_then_saturates() {
    let mut world = World::bedrock();
    world.config.sources.initial_radius = 4;
    world.config.sources.max_failed_spawn_attempts = 2;
    let mut sources = SourceGrowthEngine::new();
    let id = sources
        .place(Placement::new(BlockPos::new(0, 64, 0), 4, 1.0), &world.config, &world.sender)
        .unwrap();

    for _ in 0..199 {
        sources.tick(&mut world.ctx());
    }
    let source = sources.get(id).unwrap();
    assert_eq!(source.stall_counter, 9);
    assert_eq!(source.failed_spawn_attempts, 0);

    // The tenth stalled window forces a search, which finds nothing here.
    sources.tick(&mut world.ctx());
    let source = sources.get(id).unwrap();
    assert_eq!(source.stall_counter, 0);
    assert_eq!(source.failed_spawn_attempts, 1);
    assert!(!source.forced_metastasis);
    assert!(!source.is_saturated);

    for _ in 0..200 {
        sources.tick(&mut world.ctx());
    }
    let source = sources.get(id).unwrap();
    assert_eq!(source.failed_spawn_attempts, 2);
    assert!(source.is_saturated);
    assert_eq!(source.children_spawned, 0);
    assert_eq!(sources.len(), 1, "placed sources outlive saturation");
}

#[test]
fn test_child_spawn_cooldown_scales_with_speed() {
    let mut world = World::soil();
    world.config.speed = 2.0;
    world.config.sources.initial_radius = 3;
    world.config.sources.metastasis_threshold = 1;
    world.config.sources.saturation_threshold = 0.0;
    world.config.sources.child_spawn_delay_seconds = 30.0;
    let mut sources = SourceGrowthEngine::new();
    let id = sources
        .place(Placement::new(BlockPos::new(0, 64, 0), 3, 2.0), &world.config, &world.sender)
        .unwrap();

    world.now = 0.0;
    sources.tick(&mut world.ctx());
    let parent = sources.get(id).unwrap();
    assert_eq!(parent.children_spawned, 1);
    assert_eq!(parent.last_child_spawn_time, Some(0.0));

    // 30 seconds at double speed is a 15 second cooldown.
    world.now = 14.9;
    sources.tick(&mut world.ctx());
    assert_eq!(sources.get(id).unwrap().children_spawned, 1);

    world.now = 15.0;
    sources.tick(&mut world.ctx());
    let parent = sources.get(id).unwrap();
    assert_eq!(parent.children_spawned, 2);
    assert_eq!(parent.last_child_spawn_time, Some(15.0));
}
