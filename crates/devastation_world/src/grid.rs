//! # Grid Contract
//!
//! The narrow interface the simulation uses to read and mutate the host's
//! block storage. Hosts may change any block at any time between calls; the
//! simulation never assumes a block it wrote is still there.

use thiserror::Error;

use crate::block::BlockId;
use crate::coord::{BlockPos, ChunkCoord};

/// Faults a grid may report for a single read or write.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFault {
    /// The position is outside the grid's height range.
    #[error("position {pos} is outside the world height range")]
    OutOfBounds {
        /// Offending position.
        pos: BlockPos,
    },

    /// The chunk holding the position is not loaded.
    #[error("chunk {chunk} holding {pos} is not loaded")]
    Unloaded {
        /// Offending position.
        pos: BlockPos,
        /// The chunk that would hold it.
        chunk: ChunkCoord,
    },
}

/// Read/write access to a voxel world.
pub trait VoxelGrid {
    /// Reads the block at a position.
    ///
    /// # Errors
    ///
    /// Returns a [`GridFault`] if the host cannot serve the position.
    fn get(&self, pos: BlockPos) -> Result<BlockId, GridFault>;

    /// Writes the block at a position.
    ///
    /// # Errors
    ///
    /// Returns a [`GridFault`] if the host cannot store the position.
    fn set(&mut self, pos: BlockPos, block: BlockId) -> Result<(), GridFault>;

    /// Y of the highest non-air block in a column (below the grid's floor if
    /// the column is empty or unknown).
    fn surface_height(&self, x: i32, z: i32) -> i32;

    /// Reads a block, treating faults as air.
    fn get_or_air(&self, pos: BlockPos) -> BlockId {
        self.get(pos).unwrap_or(BlockId::AIR)
    }
}

impl<G: VoxelGrid + ?Sized> VoxelGrid for &mut G {
    fn get(&self, pos: BlockPos) -> Result<BlockId, GridFault> {
        (**self).get(pos)
    }

    fn set(&mut self, pos: BlockPos, block: BlockId) -> Result<(), GridFault> {
        (**self).set(pos, block)
    }

    fn surface_height(&self, x: i32, z: i32) -> i32 {
        (**self).surface_height(x, z)
    }
}
