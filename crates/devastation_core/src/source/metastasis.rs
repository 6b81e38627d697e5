//! Child placement for metastasis.
//!
//! Pillar search probes random bearings just beyond the parent's radius and
//! scans a vertical pillar at each for the topmost viable anchor. When that
//! finds nothing, the jump search probes rings at 2x, 4x, 6x and 8x the
//! range near the column surface, demanding denser surroundings.

use std::f64::consts::TAU;

use devastation_world::{BlockPos, FACE_OFFSETS};
use rand::Rng;

use super::DevastationSource;
use crate::context::TickContext;
use crate::rng::{point_in_sphere, unit_direction};

/// Radius of the neighbourhood counted around a candidate anchor.
const NEIGHBOR_RADIUS: i32 = 4;

/// Vertical band below the surface probed by the jump search.
const JUMP_SURFACE_DEPTH: i32 = 3;

const JUMP_RING_MULTIPLIERS: [i32; 4] = [2, 4, 6, 8];

/// Fraction of devastated blocks among devastated and convertible ones in
/// the sphere of the source's current radius (1.0 if nothing is either).
pub(super) fn local_saturation(source: &DevastationSource, ctx: &mut TickContext<'_>) -> f64 {
    let samples = ctx.config.sources.saturation_samples.max(1);
    let mut devastated = 0_u32;
    let mut convertible = 0_u32;
    for _ in 0..samples {
        let pos = point_in_sphere(ctx.rng, source.pos, source.current_radius);
        let block = ctx.grid.get_or_air(pos);
        if ctx.oracle.is_devastated(block) {
            devastated += 1;
        } else if ctx.oracle.is_convertible(block) {
            convertible += 1;
        }
    }
    let seen = devastated + convertible;
    if seen == 0 {
        1.0
    } else {
        f64::from(devastated) / f64::from(seen)
    }
}

/// Finds an anchor for a child of `parent`, keeping clear of `existing`
/// source positions.
pub(super) fn find_spawn_position(
    parent: &DevastationSource,
    existing: &[BlockPos],
    ctx: &mut TickContext<'_>,
) -> Option<BlockPos> {
    pillar_search(parent, existing, ctx).or_else(|| jump_search(parent, existing, ctx))
}

fn pillar_search(
    parent: &DevastationSource,
    existing: &[BlockPos],
    ctx: &mut TickContext<'_>,
) -> Option<BlockPos> {
    let cfg = &ctx.config.sources;
    let bearings = cfg.pillar_bearings;
    let height = cfg.pillar_search_height;
    let min_neighbors = cfg.pillar_min_neighbors;

    let max_dist = 2.0 * f64::from(parent.range);
    let min_dist = (1.2 * f64::from(parent.current_radius)).min(max_dist);
    if max_dist < 1.0 {
        return None;
    }

    let mut best: Option<(u32, BlockPos)> = None;
    for _ in 0..bearings {
        let angle = ctx.rng.gen_range(0.0..TAU);
        let dist = if max_dist > min_dist {
            ctx.rng.gen_range(min_dist..=max_dist)
        } else {
            max_dist
        };
        let x = parent.pos.x + (angle.cos() * dist).round() as i32;
        let z = parent.pos.z + (angle.sin() * dist).round() as i32;

        let top = parent.pos.y + height;
        let bottom = (parent.pos.y - height).max(ctx.config.min_y_level);
        let Some(candidate) = (bottom..=top)
            .rev()
            .map(|y| BlockPos::new(x, y, z))
            .find(|pos| is_anchor_candidate(ctx, *pos))
        else {
            continue;
        };

        if !far_enough(candidate, existing, parent.range) {
            continue;
        }
        let count = convertible_neighbors(ctx, candidate);
        if count > min_neighbors && best.map_or(true, |(c, _)| count > c) {
            best = Some((count, candidate));
        }
    }
    best.map(|(_, pos)| pos)
}

fn jump_search(
    parent: &DevastationSource,
    existing: &[BlockPos],
    ctx: &mut TickContext<'_>,
) -> Option<BlockPos> {
    let cfg = &ctx.config.sources;
    let bearings = cfg.jump_bearings;
    let cap = cfg.jump_max_distance;
    let min_neighbors = cfg.jump_min_neighbors;

    let mut last_ring = 0;
    for multiplier in JUMP_RING_MULTIPLIERS {
        let ring = (parent.range * multiplier).min(cap);
        if ring <= last_ring {
            continue;
        }
        last_ring = ring;

        let mut best: Option<(u32, BlockPos)> = None;
        for _ in 0..bearings {
            let [dx, _, dz] = unit_direction(ctx.rng);
            let horizontal = dx.hypot(dz);
            if horizontal < f64::EPSILON {
                continue;
            }
            let x = parent.pos.x + (dx / horizontal * f64::from(ring)).round() as i32;
            let z = parent.pos.z + (dz / horizontal * f64::from(ring)).round() as i32;

            // Flatter cone: stay near the surface and within half the ring
            // distance of the parent's height.
            let surface = ctx.grid.surface_height(x, z);
            let Some(candidate) = (surface - JUMP_SURFACE_DEPTH..=surface)
                .rev()
                .map(|y| BlockPos::new(x, y, z))
                .filter(|pos| (pos.y - parent.pos.y).abs() <= ring / 2)
                .find(|pos| is_anchor_candidate(ctx, *pos))
            else {
                continue;
            };

            if !far_enough(candidate, existing, parent.range) {
                continue;
            }
            let count = convertible_neighbors(ctx, candidate);
            if count > min_neighbors && best.map_or(true, |(c, _)| count > c) {
                best = Some((count, candidate));
            }
        }
        if let Some((_, pos)) = best {
            return Some(pos);
        }
    }
    None
}

/// Solid, convertible, unprotected, above the minimum height and, when
/// required, touching air.
fn is_anchor_candidate(ctx: &TickContext<'_>, pos: BlockPos) -> bool {
    if !ctx.is_convertible_at(pos) {
        return false;
    }
    !ctx.config.sources.require_air_adjacent
        || FACE_OFFSETS
            .iter()
            .any(|offset| ctx.grid.get_or_air(pos.step(*offset)).is_air())
}

/// Convertible blocks within [`NEIGHBOR_RADIUS`] of `pos`.
fn convertible_neighbors(ctx: &TickContext<'_>, pos: BlockPos) -> u32 {
    let r = NEIGHBOR_RADIUS;
    let limit = i64::from(r * r);
    let mut count = 0;
    for dx in -r..=r {
        for dy in -r..=r {
            for dz in -r..=r {
                let neighbor = pos.offset(dx, dy, dz);
                if neighbor != pos
                    && neighbor.distance_squared(pos) <= limit
                    && ctx.oracle.is_convertible(ctx.grid.get_or_air(neighbor))
                {
                    count += 1;
                }
            }
        }
    }
    count
}

/// At least half a range away from every existing source.
fn far_enough(candidate: BlockPos, existing: &[BlockPos], range: i32) -> bool {
    let min = 0.5 * f64::from(range);
    existing
        .iter()
        .all(|pos| candidate.distance_squared(*pos) as f64 >= min * min)
}
