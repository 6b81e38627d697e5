//! Per-chunk frontier growth, edge bleed, fill-in and pruning.

use devastation_world::{
    BlockPos, ChunkCoord, Offset, ALL_OFFSETS, CHUNK_SIZE, FACE_OFFSETS, HORIZONTAL_OFFSETS,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{trace, warn};

use super::{repair, BleedEntry, DevastatedChunk};
use crate::context::TickContext;
use crate::error::DevastationResult;
use crate::rng::roll_budget;

/// Conversions made while stepping one chunk.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct StepCounts {
    pub converted: u64,
    pub bleed_converted: u64,
}

/// Neighbour offsets tried around a frontier block.
pub(super) fn neighbor_offsets(diagonal: bool) -> &'static [Offset] {
    if diagonal {
        &ALL_OFFSETS
    } else {
        &FACE_OFFSETS
    }
}

/// Above the minimum height and within the optional depth clamp.
fn in_depth_band(pos: BlockPos, ctx: &TickContext<'_>) -> bool {
    if pos.y < ctx.config.min_y_level {
        return false;
    }
    match ctx.config.chunks.max_depth_below_surface {
        Some(depth) => pos.y >= ctx.grid.surface_height(pos.x, pos.z) - depth,
        None => true,
    }
}

/// Inside the chunk's X/Z span and the depth band.
pub(super) fn in_column(coord: ChunkCoord, pos: BlockPos, ctx: &TickContext<'_>) -> bool {
    coord.contains(pos) && in_depth_band(pos, ctx)
}

/// A corrupted block at `pos` could still grow inside `coord`.
pub(super) fn can_grow_from(coord: ChunkCoord, pos: BlockPos, ctx: &TickContext<'_>) -> bool {
    ctx.is_devastated_at(pos)
        && neighbor_offsets(ctx.config.chunks.diagonal_spreading)
            .iter()
            .map(|offset| pos.step(*offset))
            .any(|n| in_column(coord, n, ctx) && ctx.is_convertible_at(n))
}

/// Runs one tick for a non-terminal chunk.
///
/// `is_tracked` answers for every chunk except the one being stepped.
pub(super) fn step_chunk(
    chunk: &mut DevastatedChunk,
    ctx: &mut TickContext<'_>,
    is_tracked: &dyn Fn(ChunkCoord) -> bool,
    counts: &mut StepCounts,
) -> DevastationResult<()> {
    if chunk.is_terminal() {
        return Ok(());
    }
    if !chunk.frontier_initialized {
        counts.converted += repair::initialize(chunk, ctx)?;
    }

    grow(chunk, ctx, is_tracked, counts)?;
    advance_bleed(chunk, ctx, is_tracked, counts);

    let config = ctx.config;
    chunk.fill_in_tick_counter += 1;
    if chunk.fill_in_tick_counter >= config.chunks.fill_in_interval_ticks {
        chunk.fill_in_tick_counter = 0;
        fill_in(chunk, ctx, counts)?;
    }

    if chunk.frontier.len() > config.chunks.frontier_prune_threshold {
        trace!(chunk = %chunk.coord, size = chunk.frontier.len(), "frontier pruned");
        chunk.frontier.prune(ctx.rng, config.chunks.frontier_prune_target);
    }
    Ok(())
}

fn grow(
    chunk: &mut DevastatedChunk,
    ctx: &mut TickContext<'_>,
    is_tracked: &dyn Fn(ChunkCoord) -> bool,
    counts: &mut StepCounts,
) -> DevastationResult<()> {
    let config = ctx.config;
    let budget = roll_budget(ctx.rng, f64::from(config.chunks.base_budget) * ctx.speed());
    let bleed_chance = config.chunks.edge_bleed_chance.clamp(0.0, 1.0);
    let mut offsets = neighbor_offsets(config.chunks.diagonal_spreading).to_vec();

    let mut converted = 0;
    let mut picks_left = budget.saturating_mul(4).saturating_add(16);
    while converted < budget && picks_left > 0 {
        picks_left -= 1;
        let Some(pos) = chunk.frontier.pick(ctx.rng) else {
            break;
        };
        if !ctx.is_devastated_at(pos) {
            chunk.frontier.remove(pos);
            continue;
        }

        offsets.shuffle(ctx.rng);
        let mut grown = None;
        for offset in &offsets {
            let candidate = pos.step(*offset);
            if in_column(chunk.coord, candidate, ctx) && ctx.try_convert(candidate)? {
                grown = Some(candidate);
                break;
            }
        }

        let Some(grown) = grown else {
            chunk.frontier.remove(pos);
            continue;
        };
        chunk.frontier.insert(grown);
        chunk.blocks_devastated += 1;
        counts.converted += 1;
        converted += 1;

        if chunk.coord.is_edge(grown) && ctx.rng.gen_bool(bleed_chance) {
            bleed_across(chunk, grown, ctx, is_tracked, counts)?;
        }
    }
    Ok(())
}

/// Bleed may land inside the depth band of a chunk other than the owner
/// that is neither tracked nor protected.
fn may_bleed_into(
    owner: ChunkCoord,
    pos: BlockPos,
    ctx: &TickContext<'_>,
    is_tracked: &dyn Fn(ChunkCoord) -> bool,
) -> bool {
    let target = pos.chunk();
    target != owner
        && !is_tracked(target)
        && !ctx.protection.is_chunk_protected(target)
        && in_depth_band(pos, ctx)
}

fn bleed_across(
    chunk: &mut DevastatedChunk,
    from: BlockPos,
    ctx: &mut TickContext<'_>,
    is_tracked: &dyn Fn(ChunkCoord) -> bool,
    counts: &mut StepCounts,
) -> DevastationResult<()> {
    let mut outward: Vec<BlockPos> = HORIZONTAL_OFFSETS
        .iter()
        .map(|[dx, dz]| from.offset(*dx, 0, *dz))
        .filter(|pos| !chunk.coord.contains(*pos))
        .collect();
    outward.shuffle(ctx.rng);

    for target in outward {
        if !may_bleed_into(chunk.coord, target, ctx, is_tracked) {
            continue;
        }
        if ctx.try_convert(target)? {
            trace!(chunk = %chunk.coord, pos = %target, "edge bleed");
            chunk.bleed_blocks += 1;
            counts.bleed_converted += 1;
            chunk.bleed_frontier.push(BleedEntry {
                pos: target,
                remaining: ctx.config.chunks.bleed_spread_budget,
            });
            break;
        }
    }
    Ok(())
}

/// Each pending bleed entry makes one hop attempt and is consumed; a hop
/// that lands leaves an entry with one hop fewer.
fn advance_bleed(
    chunk: &mut DevastatedChunk,
    ctx: &mut TickContext<'_>,
    is_tracked: &dyn Fn(ChunkCoord) -> bool,
    counts: &mut StepCounts,
) {
    if chunk.bleed_frontier.is_empty() {
        return;
    }
    let pending = std::mem::take(&mut chunk.bleed_frontier);
    let mut offsets = FACE_OFFSETS.to_vec();

    for entry in pending {
        if entry.remaining == 0 {
            continue;
        }
        offsets.shuffle(ctx.rng);
        for offset in &offsets {
            let target = entry.pos.step(*offset);
            if !may_bleed_into(chunk.coord, target, ctx, is_tracked) {
                continue;
            }
            match ctx.try_convert(target) {
                Ok(true) => {
                    chunk.bleed_blocks += 1;
                    counts.bleed_converted += 1;
                    if entry.remaining > 1 {
                        chunk.bleed_frontier.push(BleedEntry {
                            pos: target,
                            remaining: entry.remaining - 1,
                        });
                    }
                    break;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(chunk = %chunk.coord, pos = %target, %err, "bleed hop failed");
                    break;
                }
            }
        }
    }
}

/// Converts sampled blocks next to corruption the frontier missed.
fn fill_in(
    chunk: &mut DevastatedChunk,
    ctx: &mut TickContext<'_>,
    counts: &mut StepCounts,
) -> DevastationResult<()> {
    let config = ctx.config;
    let depth = config.chunks.surface_scan_depth.max(0);
    let offsets = neighbor_offsets(config.chunks.diagonal_spreading);

    for _ in 0..config.chunks.fill_in_samples {
        let x = chunk.coord.world_x() + ctx.rng.gen_range(0..CHUNK_SIZE);
        let z = chunk.coord.world_z() + ctx.rng.gen_range(0..CHUNK_SIZE);
        let surface = ctx.grid.surface_height(x, z);
        if surface < 0 {
            continue;
        }
        let pos = BlockPos::new(x, ctx.rng.gen_range(surface - depth..=surface), z);
        if !in_column(chunk.coord, pos, ctx)
            || !offsets.iter().any(|offset| ctx.is_devastated_at(pos.step(*offset)))
        {
            continue;
        }
        if ctx.try_convert(pos)? {
            chunk.frontier.insert(pos);
            chunk.blocks_devastated += 1;
            counts.converted += 1;
        }
    }
    Ok(())
}
