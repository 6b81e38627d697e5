//! # Column Chunk Storage
//!
//! Block storage for the reference grid.
//!
//! ## Chunk Format
//!
//! Chunks are 32x32x256 blocks (width x depth x height).
//! Each block is stored as a `u16` block id in a flat boxed slice indexed as
//! `[y][z][x]`, with a per-column height map kept in sync on every write.

use crate::block::BlockId;
use crate::coord::{ChunkCoord, CHUNK_SIZE};

/// Chunk height in blocks.
pub const CHUNK_HEIGHT: i32 = 256;

/// Total blocks per chunk.
pub const BLOCKS_PER_CHUNK: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_HEIGHT) as usize;

/// Height-map value for a column with no solid block.
pub const EMPTY_COLUMN: i32 = -1;

const SIZE: usize = CHUNK_SIZE as usize;

/// A chunk of world data.
#[derive(Clone)]
pub struct ColumnChunk {
    /// Chunk position in the world.
    pub coord: ChunkCoord,
    /// Block data (indexed as [y][z][x]).
    blocks: Box<[BlockId]>,
    /// Height map (highest solid block in each column, indexed as [z][x]).
    height_map: [[i32; SIZE]; SIZE],
    /// Whether this chunk has been modified since it was filled.
    pub modified: bool,
}

impl ColumnChunk {
    /// Creates a new empty chunk at the given coordinates.
    #[must_use]
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks: vec![BlockId::AIR; BLOCKS_PER_CHUNK].into_boxed_slice(),
            height_map: [[EMPTY_COLUMN; SIZE]; SIZE],
            modified: false,
        }
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        (y * SIZE + z) * SIZE + x
    }

    #[inline]
    fn in_bounds(x: i32, y: i32, z: i32) -> bool {
        (0..CHUNK_SIZE).contains(&x) && (0..CHUNK_HEIGHT).contains(&y) && (0..CHUNK_SIZE).contains(&z)
    }

    /// Gets a block at local coordinates (air when out of range).
    #[inline]
    #[must_use]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        if Self::in_bounds(x, y, z) {
            self.blocks[Self::index(x as usize, y as usize, z as usize)]
        } else {
            BlockId::AIR
        }
    }

    /// Sets a block at local coordinates.
    ///
    /// Returns false if the coordinates are out of range.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockId) -> bool {
        if !Self::in_bounds(x, y, z) {
            return false;
        }
        let (ux, uy, uz) = (x as usize, y as usize, z as usize);
        self.blocks[Self::index(ux, uy, uz)] = block;
        self.modified = true;

        let height = &mut self.height_map[uz][ux];
        if !block.is_air() && y > *height {
            *height = y;
        } else if block.is_air() && y == *height {
            // Column top was removed; walk down to the next solid block.
            let mut new_height = EMPTY_COLUMN;
            for below in (0..y).rev() {
                if !self.blocks[Self::index(ux, below as usize, uz)].is_air() {
                    new_height = below;
                    break;
                }
            }
            self.height_map[uz][ux] = new_height;
        }
        true
    }

    /// Gets the height at a local column.
    #[inline]
    #[must_use]
    pub fn get_height(&self, x: i32, z: i32) -> i32 {
        if (0..CHUNK_SIZE).contains(&x) && (0..CHUNK_SIZE).contains(&z) {
            self.height_map[z as usize][x as usize]
        } else {
            EMPTY_COLUMN
        }
    }

    /// Counts blocks matching a predicate.
    #[must_use]
    pub fn count_blocks(&self, mut predicate: impl FnMut(BlockId) -> bool) -> usize {
        self.blocks.iter().filter(|b| predicate(**b)).count()
    }
}
