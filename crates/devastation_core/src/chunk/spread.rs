//! Chunk-to-chunk spreading across a shared border.

use devastation_world::{BlockPos, ChunkCoord, CHUNK_SIZE};

use super::frontier::in_column;
use crate::context::TickContext;
use crate::error::DevastationResult;

/// Border columns on `from`'s side of the edge it shares with `to`, as
/// world `(x, z)`. Empty unless the chunks are cardinal neighbours.
fn border_columns(from: ChunkCoord, to: ChunkCoord) -> Vec<(i32, i32)> {
    let (ox, oz) = (from.world_x(), from.world_z());
    let last = CHUNK_SIZE - 1;
    let along = 0..CHUNK_SIZE;
    match (to.x - from.x, to.z - from.z) {
        (1, 0) => along.map(|i| (ox + last, oz + i)).collect(),
        (-1, 0) => along.map(|i| (ox, oz + i)).collect(),
        (0, 1) => along.map(|i| (ox + i, oz + last)).collect(),
        (0, -1) => along.map(|i| (ox + i, oz)).collect(),
        _ => Vec::new(),
    }
}

/// Converts the block across the border from every corrupted block on
/// `from`'s edge and returns the converted seeds, all inside `to`.
pub(super) fn seed_across(
    from: ChunkCoord,
    to: ChunkCoord,
    ctx: &mut TickContext<'_>,
) -> DevastationResult<Vec<BlockPos>> {
    let (dx, dz) = (to.x - from.x, to.z - from.z);
    let depth = ctx.config.chunks.surface_scan_depth.max(0);
    let mut seeds = Vec::new();

    for (x, z) in border_columns(from, to) {
        let surface = ctx.grid.surface_height(x, z);
        if surface < 0 {
            continue;
        }
        for y in (surface - depth..=surface).rev() {
            let edge = BlockPos::new(x, y, z);
            if !ctx.is_devastated_at(edge) {
                continue;
            }
            let across = edge.offset(dx, 0, dz);
            if in_column(to, across, ctx) && ctx.try_convert(across)? {
                seeds.push(across);
            }
        }
    }
    Ok(seeds)
}
