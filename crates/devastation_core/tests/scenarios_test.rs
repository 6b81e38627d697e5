//! # End-to-End Scenarios
//!
//! One engine at a time on the reference grid, driven tick by tick.

mod common;

use std::time::Duration;

use common::World;
use devastation_core::{
    ChunkFrontierEngine, DevastationEvent, Placement, RiftWardEngine, ScanMode,
    SourceGrowthEngine, StaticWardHost, TrackCause, WardStructure,
};
use devastation_world::{names, BlockPos, ChunkCoord, VoxelGrid};

#[test]
fn test_source_reaches_range_and_metastasizes() {
    let mut world = World::soil();
    world.config.sources.metastasis_threshold = 200;
    world.config.sources.saturation_threshold = 0.3;
    let mut engine = SourceGrowthEngine::new();
    let id = engine
        .place(Placement::new(BlockPos::new(0, 64, 0), 8, 1.0), &world.config, &world.sender)
        .unwrap();

    let mut reached_range = false;
    for tick in 0..1000 {
        world.now = f64::from(tick) * 0.05;
        engine.tick(&mut world.ctx());
        if engine.get(id).is_some_and(|s| s.current_radius == 8) {
            reached_range = true;
        }
    }
    assert!(reached_range);
    let source = engine.get(id).unwrap();
    assert!(source.blocks_devastated_total > 0);

    for tick in 1000..20_000 {
        if source_children(&world) > 0 {
            break;
        }
        world.now = f64::from(tick) * 0.05;
        engine.tick(&mut world.ctx());
    }
    let parent = engine.get(id).unwrap();
    assert!(parent.children_spawned >= 1);
    let child = engine.sources().iter().find(|s| s.parent_id == Some(id)).unwrap();
    assert_eq!(child.generation_level, 1);
    assert!(world.is_devastated(child.pos));
}

#[test]
fn test_source_metastasizes_with_default_settings() {
    let mut world = World::soil();
    let mut engine = SourceGrowthEngine::new();
    let id = engine
        .place(Placement::new(BlockPos::new(0, 64, 0), 8, 1.0), &world.config, &world.sender)
        .unwrap();

    let mut children = 0;
    for tick in 0..50_000 {
        world.now = f64::from(tick) * 0.05;
        engine.tick(&mut world.ctx());
        children += source_children(&world);
        if children > 0 {
            break;
        }
    }
    assert!(children > 0, "no child within the tick limit");
    let parent = engine.get(id).unwrap();
    assert_eq!(parent.current_radius, 8);
    assert_eq!(parent.children_spawned, 1);
    assert_eq!(parent.blocks_since_last_metastasis, 0);
    let child = engine.sources().iter().find(|s| s.parent_id == Some(id)).unwrap();
    assert!(!child.is_protected);
    assert!(child.pos.distance(parent.pos) >= 0.5 * f64::from(parent.range));
}

fn source_children(world: &World) -> usize {
    world
        .receiver
        .drain()
        .into_iter()
        .filter(|event| {
            matches!(event, DevastationEvent::SourceSpawned { parent: Some(_), .. })
        })
        .count()
}

#[test]
fn test_dense_chunk_becomes_fully_devastated() {
    let mut world = World::soil();
    world.config.chunks.max_depth_below_surface = Some(4);
    world.config.chunks.edge_bleed_chance = 0.0;
    world.config.chunks.spread_chance = 0.0;
    world.config.chunks.frontier_prune_threshold = 100_000;
    world.config.chunks.frontier_prune_target = 50_000;
    let corrupted = world.id(names::SOIL_CORRUPTED);
    world.grid.set(BlockPos::new(16, 64, 16), corrupted).unwrap();

    let origin = ChunkCoord::new(0, 0);
    let mut engine = ChunkFrontierEngine::new();
    engine.track(origin, TrackCause::Manual, &world.sender);
    for _ in 0..20_000 {
        if engine.get(origin).unwrap().is_terminal() {
            break;
        }
        engine.tick(&mut world.ctx());
    }

    let chunk = engine.get(origin).unwrap();
    assert!(chunk.is_fully_devastated);
    assert!(chunk.blocks_devastated >= 1000);
    assert!(chunk.frontier.is_empty());
    assert!(world
        .receiver
        .drain()
        .contains(&DevastationEvent::ChunkFullyDevastated {
            chunk: origin,
            blocks: chunk.blocks_devastated,
        }));
    // Nothing below the depth clamp was touched.
    assert!(world
        .devastated_in(BlockPos::new(0, 50, 0), BlockPos::new(31, 59, 31))
        .is_empty());
}

#[test]
fn test_chunk_fills_with_default_settings() {
    let mut world = World::soil();
    let origin = ChunkCoord::new(0, 0);
    let mut engine = ChunkFrontierEngine::new();
    engine.track(origin, TrackCause::Manual, &world.sender);

    let mut announced = false;
    for _ in 0..40_000 {
        if engine.get(origin).unwrap().is_terminal() {
            break;
        }
        engine.tick(&mut world.ctx());
        announced |= world.receiver.drain().iter().any(|event| {
            matches!(event, DevastationEvent::ChunkFullyDevastated { chunk, .. } if *chunk == origin)
        });
    }

    let chunk = engine.get(origin).unwrap();
    assert!(chunk.is_fully_devastated);
    assert!(chunk.blocks_devastated >= 1000);
    assert!(chunk.frontier.is_empty());
    assert!(announced);
    assert!(engine.len() > 1, "neighbours were spread into on the way");
}

#[test]
fn test_sparse_chunk_is_stuck_not_terminal() {
    let mut world = World::sparse();
    let origin = ChunkCoord::new(0, 0);
    let mut engine = ChunkFrontierEngine::new();
    engine.track(origin, TrackCause::Manual, &world.sender);
    for _ in 0..500 {
        engine.tick(&mut world.ctx());
    }

    let chunk = engine.get(origin).unwrap();
    assert_eq!(chunk.blocks_devastated, 100);
    assert!(chunk.is_stuck());
    assert!(!chunk.is_terminal());
    assert_eq!(chunk.repair_attempts, 1, "simulated time never advanced past the cooldown");
}

#[test]
fn test_raster_ward_cleans_its_radius() {
    let mut world = World::soil();
    let corrupted = world.id(names::SOIL_CORRUPTED);
    for x in -20..=20 {
        for y in 44..=64 {
            for z in -20..=20 {
                world.grid.set(BlockPos::new(x, y, z), corrupted).unwrap();
            }
        }
    }

    let ward_pos = BlockPos::new(0, 64, 0);
    let mut host = StaticWardHost::new();
    host.place(ward_pos, WardStructure::running());
    assert_eq!(world.config.wards.mode, ScanMode::Raster);
    assert_eq!(world.config.wards.protection_radius, 16);
    let mut wards = RiftWardEngine::new(&world.config.wards);
    wards.add(ward_pos, 0.0);
    wards.poll(&host, Duration::ZERO, &world.config.wards, &world.sender, true);

    for _ in 0..10_000 {
        if wards.get(ward_pos).unwrap().progress.raster_scan_complete {
            break;
        }
        wards.tick(&mut world.ctx(), 1.0);
    }

    let ward = wards.get(ward_pos).unwrap();
    assert!(ward.progress.raster_scan_complete);
    assert_eq!(ward.progress.max_clean_radius_reached, 16);
    let limit = 16 * 16;
    let left = world.devastated_in(BlockPos::new(-16, 48, -16), BlockPos::new(16, 64, 16));
    assert!(left.iter().all(|pos| pos.distance_squared(ward_pos) > limit));
    // Outside the radius nothing was healed.
    assert!(world.is_devastated(BlockPos::new(20, 64, 0)));
    assert_eq!(
        world.grid.get(BlockPos::new(3, 60, -4)),
        Ok(world.id(names::SOIL_GRASS))
    );
}

#[test]
fn test_spread_seeds_only_next_to_the_edge_block() {
    let mut world = World::soil();
    world.config.chunks.spread_chance = 1.0;
    let corrupted = world.id(names::SOIL_CORRUPTED);
    world.grid.set(BlockPos::new(31, 64, 5), corrupted).unwrap();

    let origin = ChunkCoord::new(0, 0);
    let east = ChunkCoord::new(1, 0);
    let mut engine = ChunkFrontierEngine::new();
    engine.track(origin, TrackCause::Manual, &world.sender);
    for _ in 0..64 {
        if engine.is_tracked(east) {
            break;
        }
        engine.spread_check(&mut world.ctx());
    }

    let chunk = engine.get(east).unwrap();
    assert_eq!(chunk.frontier.iter().collect::<Vec<_>>(), vec![BlockPos::new(32, 64, 5)]);
    assert!(world.is_devastated(BlockPos::new(32, 64, 5)));
    assert!(!engine.is_tracked(ChunkCoord::new(-1, 0)));
    assert!(world.receiver.drain().contains(&DevastationEvent::ChunkTracked {
        chunk: east,
        cause: TrackCause::Spread,
    }));
}
