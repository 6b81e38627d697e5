//! Frontier seeding: lazy initialization and stuck-chunk repair.

use devastation_world::{BlockPos, CHUNK_SIZE, HORIZONTAL_OFFSETS};
use rand::Rng;

use super::frontier::{can_grow_from, in_column};
use super::DevastatedChunk;
use crate::context::TickContext;
use crate::error::DevastationResult;

/// Seeds the frontier of a chunk processed for the first time.
///
/// Samples surface columns for existing corruption that can still grow;
/// when none is found, force-converts the centre column (or one next to
/// it). Returns the number of blocks converted.
pub(super) fn initialize(
    chunk: &mut DevastatedChunk,
    ctx: &mut TickContext<'_>,
) -> DevastationResult<u64> {
    chunk.frontier_initialized = true;
    if !chunk.frontier.is_empty() {
        return Ok(0);
    }

    for _ in 0..ctx.config.chunks.init_samples {
        let x = chunk.coord.world_x() + ctx.rng.gen_range(0..CHUNK_SIZE);
        let z = chunk.coord.world_z() + ctx.rng.gen_range(0..CHUNK_SIZE);
        collect_column(chunk, x, z, ctx);
    }
    if !chunk.frontier.is_empty() {
        return Ok(0);
    }

    let (cx, cz) = (chunk.coord.center_x(), chunk.coord.center_z());
    let columns = std::iter::once((cx, cz))
        .chain(HORIZONTAL_OFFSETS.iter().map(|[dx, dz]| (cx + dx, cz + dz)));
    for (x, z) in columns {
        if seed_column(chunk, x, z, ctx)? {
            return Ok(1);
        }
    }
    Ok(0)
}

/// Rescans every surface column of a stuck chunk, falling back to
/// force-seeding any convertible surface block.
///
/// Returns the number of blocks converted, or `None` if nothing could be
/// found.
pub(super) fn repair(
    chunk: &mut DevastatedChunk,
    ctx: &mut TickContext<'_>,
) -> DevastationResult<Option<u64>> {
    let columns = || {
        (0..CHUNK_SIZE).flat_map(move |lx| (0..CHUNK_SIZE).map(move |lz| (lx, lz)))
    };
    let (ox, oz) = (chunk.coord.world_x(), chunk.coord.world_z());

    for (lx, lz) in columns() {
        collect_column(chunk, ox + lx, oz + lz, ctx);
    }
    if !chunk.frontier.is_empty() {
        return Ok(Some(0));
    }
    for (lx, lz) in columns() {
        if seed_column(chunk, ox + lx, oz + lz, ctx)? {
            return Ok(Some(1));
        }
    }
    Ok(None)
}

/// Vertical band scanned below a column's surface.
fn column_band(ctx: &TickContext<'_>, x: i32, z: i32) -> Option<(i32, i32)> {
    let surface = ctx.grid.surface_height(x, z);
    (surface >= 0).then(|| (surface - ctx.config.chunks.surface_scan_depth.max(0), surface))
}

/// Adds corrupted blocks of one column that can still grow.
fn collect_column(chunk: &mut DevastatedChunk, x: i32, z: i32, ctx: &TickContext<'_>) {
    let Some((bottom, top)) = column_band(ctx, x, z) else {
        return;
    };
    for y in bottom..=top {
        let pos = BlockPos::new(x, y, z);
        if can_grow_from(chunk.coord, pos, ctx) {
            chunk.frontier.insert(pos);
        }
    }
}

/// Converts the topmost convertible block of one column.
fn seed_column(
    chunk: &mut DevastatedChunk,
    x: i32,
    z: i32,
    ctx: &mut TickContext<'_>,
) -> DevastationResult<bool> {
    let Some((bottom, top)) = column_band(ctx, x, z) else {
        return Ok(false);
    };
    for y in (bottom..=top).rev() {
        let pos = BlockPos::new(x, y, z);
        if !in_column(chunk.coord, pos, ctx) {
            continue;
        }
        if ctx.try_convert(pos)? {
            chunk.frontier.insert(pos);
            chunk.blocks_devastated += 1;
            return Ok(true);
        }
    }
    Ok(false)
}
