//! # Reference Voxel World
//!
//! A sparse map of loaded column chunks implementing [`VoxelGrid`].
//!
//! Reads from unloaded chunks or outside `0..256` return air. Writes there
//! fail with a [`GridFault`], the way a host refuses to edit storage it does
//! not hold.

use std::collections::HashMap;

use crate::block::BlockId;
use crate::chunk::{ColumnChunk, CHUNK_HEIGHT, EMPTY_COLUMN};
use crate::coord::{BlockPos, ChunkCoord, CHUNK_SIZE};
use crate::grid::{GridFault, VoxelGrid};
use crate::terrain::FlatTerrain;

/// Sparse in-memory voxel world.
#[derive(Clone, Default)]
pub struct VoxelWorld {
    chunks: HashMap<ChunkCoord, ColumnChunk>,
    terrain: Option<FlatTerrain>,
}

impl VoxelWorld {
    /// Creates an empty world; loaded chunks start as air.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a world whose chunks are filled from `terrain` when loaded.
    #[must_use]
    pub fn with_terrain(terrain: FlatTerrain) -> Self {
        Self {
            chunks: HashMap::new(),
            terrain: Some(terrain),
        }
    }

    /// Loads a chunk (filling it from the terrain on first load).
    pub fn load_chunk(&mut self, coord: ChunkCoord) -> &mut ColumnChunk {
        let terrain = self.terrain.as_ref();
        self.chunks.entry(coord).or_insert_with(|| {
            let mut chunk = ColumnChunk::new(coord);
            if let Some(terrain) = terrain {
                terrain.fill(&mut chunk);
            }
            chunk
        })
    }

    /// Loads every chunk within `radius` chunks of `center` (square area).
    pub fn ensure_loaded_around(&mut self, center: ChunkCoord, radius: i32) {
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                self.load_chunk(ChunkCoord::new(center.x + dx, center.z + dz));
            }
        }
    }

    /// Drops a chunk from memory.
    pub fn unload_chunk(&mut self, coord: ChunkCoord) -> bool {
        self.chunks.remove(&coord).is_some()
    }

    /// Returns true if the chunk is loaded.
    #[must_use]
    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Number of loaded chunks.
    #[must_use]
    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Borrows a loaded chunk.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&ColumnChunk> {
        self.chunks.get(&coord)
    }

    /// Counts blocks matching a predicate across one loaded chunk.
    #[must_use]
    pub fn count_in_chunk(&self, coord: ChunkCoord, predicate: impl FnMut(BlockId) -> bool) -> usize {
        self.chunks
            .get(&coord)
            .map_or(0, |chunk| chunk.count_blocks(predicate))
    }
}

impl VoxelGrid for VoxelWorld {
    fn get(&self, pos: BlockPos) -> Result<BlockId, GridFault> {
        if !(0..CHUNK_HEIGHT).contains(&pos.y) {
            return Ok(BlockId::AIR);
        }
        Ok(self
            .chunks
            .get(&pos.chunk())
            .map_or(BlockId::AIR, |chunk| chunk.get_block(pos.local_x(), pos.y, pos.local_z())))
    }

    fn set(&mut self, pos: BlockPos, block: BlockId) -> Result<(), GridFault> {
        if !(0..CHUNK_HEIGHT).contains(&pos.y) {
            return Err(GridFault::OutOfBounds { pos });
        }
        let coord = pos.chunk();
        let chunk = self
            .chunks
            .get_mut(&coord)
            .ok_or(GridFault::Unloaded { pos, chunk: coord })?;
        chunk.set_block(pos.local_x(), pos.y, pos.local_z(), block);
        Ok(())
    }

    fn surface_height(&self, x: i32, z: i32) -> i32 {
        let coord = ChunkCoord::from_block_pos(x, z);
        self.chunks.get(&coord).map_or(EMPTY_COLUMN, |chunk| {
            chunk.get_height(x.rem_euclid(CHUNK_SIZE), z.rem_euclid(CHUNK_SIZE))
        })
    }
}
