//! # Protection Queries
//!
//! Spreading engines ask this before every conversion. The rift ward engine
//! is the real implementation; [`NoProtection`] stands in where no ward
//! applies.

use devastation_world::{BlockPos, ChunkCoord};

/// Answers "may corruption touch this?".
pub trait ProtectionQuery {
    /// Returns true if `pos` lies inside an active ward's radius.
    fn is_protected(&self, pos: BlockPos) -> bool;

    /// Returns true if any active ward's radius overlaps the chunk.
    fn is_chunk_protected(&self, chunk: ChunkCoord) -> bool;
}

/// Protects nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProtection;

impl ProtectionQuery for NoProtection {
    fn is_protected(&self, _pos: BlockPos) -> bool {
        false
    }

    fn is_chunk_protected(&self, _chunk: ChunkCoord) -> bool {
        false
    }
}
