//! # Coordinates
//!
//! Block positions and chunk coordinates.
//!
//! ## Chunk Layout
//!
//! The world is split into 32x32 vertical columns ("chunks") with unbounded
//! height from the simulation's point of view. A chunk is identified by its
//! `(x, z)` column index; the packed `u64` form is the key used by every
//! chunk-indexed map in the simulation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chunk width/depth in blocks.
pub const CHUNK_SIZE: i32 = 32;

/// A neighbour offset `[dx, dy, dz]`.
pub type Offset = [i32; 3];

/// The six face-adjacent offsets.
pub const FACE_OFFSETS: [Offset; 6] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];

/// All 26 offsets of the surrounding 3x3x3 cube (faces, edges and corners).
pub const ALL_OFFSETS: [Offset; 26] = build_all_offsets();

/// The four horizontal face offsets, as `[dx, dz]`.
pub const HORIZONTAL_OFFSETS: [[i32; 2]; 4] = [[1, 0], [-1, 0], [0, 1], [0, -1]];

const fn build_all_offsets() -> [Offset; 26] {
    let mut out = [[0; 3]; 26];
    let mut i = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                if dx != 0 || dy != 0 || dz != 0 {
                    out[i] = [dx, dy, dz];
                    i += 1;
                }
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    out
}

/// Integer world position of a single block.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate (height).
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Creates a new block position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns this position moved by the given deltas.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Returns this position moved by a neighbour offset.
    #[inline]
    #[must_use]
    pub const fn step(self, offset: Offset) -> Self {
        self.offset(offset[0], offset[1], offset[2])
    }

    /// Squared euclidean distance to another position.
    #[inline]
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance to another position.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    /// Squared distance ignoring the Y axis.
    #[inline]
    #[must_use]
    pub const fn horizontal_distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }

    /// Chunk column containing this position.
    #[inline]
    #[must_use]
    pub const fn chunk(self) -> ChunkCoord {
        ChunkCoord::from_block_pos(self.x, self.z)
    }

    /// X offset inside the owning chunk (0..32).
    #[inline]
    #[must_use]
    pub const fn local_x(self) -> i32 {
        self.x.rem_euclid(CHUNK_SIZE)
    }

    /// Z offset inside the owning chunk (0..32).
    #[inline]
    #[must_use]
    pub const fn local_z(self) -> i32 {
        self.z.rem_euclid(CHUNK_SIZE)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk coordinate (identifies a 32x32 column in the world grid).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Z coordinate (in chunks, not blocks).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Converts world block coordinates to chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_SIZE),
            z: block_z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Returns the world X coordinate of the chunk's origin (corner).
    #[inline]
    #[must_use]
    pub const fn world_x(self) -> i32 {
        self.x * CHUNK_SIZE
    }

    /// Returns the world Z coordinate of the chunk's origin.
    #[inline]
    #[must_use]
    pub const fn world_z(self) -> i32 {
        self.z * CHUNK_SIZE
    }

    /// World X of the chunk's central column.
    #[inline]
    #[must_use]
    pub const fn center_x(self) -> i32 {
        self.world_x() + CHUNK_SIZE / 2
    }

    /// World Z of the chunk's central column.
    #[inline]
    #[must_use]
    pub const fn center_z(self) -> i32 {
        self.world_z() + CHUNK_SIZE / 2
    }

    /// Returns true if the position lies inside this chunk's X/Z span.
    #[inline]
    #[must_use]
    pub const fn contains(self, pos: BlockPos) -> bool {
        pos.x.div_euclid(CHUNK_SIZE) == self.x && pos.z.div_euclid(CHUNK_SIZE) == self.z
    }

    /// Returns true if the position sits on this chunk's horizontal boundary.
    #[inline]
    #[must_use]
    pub const fn is_edge(self, pos: BlockPos) -> bool {
        if !self.contains(pos) {
            return false;
        }
        let lx = pos.local_x();
        let lz = pos.local_z();
        lx == 0 || lx == CHUNK_SIZE - 1 || lz == 0 || lz == CHUNK_SIZE - 1
    }

    /// Packs the coordinate into a single map key.
    #[inline]
    #[must_use]
    pub const fn pack(self) -> u64 {
        ((self.x as u32 as u64) << 32) | (self.z as u32 as u64)
    }

    /// Inverse of [`ChunkCoord::pack`].
    #[inline]
    #[must_use]
    pub const fn unpack(key: u64) -> Self {
        Self {
            x: (key >> 32) as u32 as i32,
            z: key as u32 as i32,
        }
    }

    /// The four cardinal neighbours.
    #[must_use]
    pub const fn neighbors(self) -> [Self; 4] {
        [
            Self::new(self.x + 1, self.z),
            Self::new(self.x - 1, self.z),
            Self::new(self.x, self.z + 1),
            Self::new(self.x, self.z - 1),
        ]
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_coord_from_block() {
        assert_eq!(ChunkCoord::from_block_pos(0, 0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block_pos(31, 31), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block_pos(32, 32), ChunkCoord::new(1, 1));
        assert_eq!(ChunkCoord::from_block_pos(-1, -1), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-32, -32), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-33, -33), ChunkCoord::new(-2, -2));
    }

    #[test]
    fn test_pack_roundtrip_negative() {
        for coord in [
            ChunkCoord::new(0, 0),
            ChunkCoord::new(-1, 5),
            ChunkCoord::new(i32::MIN, i32::MAX),
        ] {
            assert_eq!(ChunkCoord::unpack(coord.pack()), coord);
        }
        assert_ne!(ChunkCoord::new(1, 0).pack(), ChunkCoord::new(0, 1).pack());
    }

    #[test]
    fn test_all_offsets_are_unique_and_nonzero() {
        let mut seen = std::collections::HashSet::new();
        for offset in ALL_OFFSETS {
            assert_ne!(offset, [0, 0, 0]);
            assert!(seen.insert(offset));
        }
        assert_eq!(seen.len(), 26);
        for face in FACE_OFFSETS {
            assert!(seen.contains(&face));
        }
    }

    #[test]
    fn test_edge_detection() {
        let chunk = ChunkCoord::new(0, 0);
        assert!(chunk.is_edge(BlockPos::new(0, 10, 5)));
        assert!(chunk.is_edge(BlockPos::new(31, 10, 5)));
        assert!(chunk.is_edge(BlockPos::new(5, 10, 31)));
        assert!(!chunk.is_edge(BlockPos::new(5, 10, 5)));
        assert!(!chunk.is_edge(BlockPos::new(32, 10, 5)));
    }

    #[test]
    fn test_local_coordinates_wrap_negative() {
        let pos = BlockPos::new(-1, 0, -33);
        assert_eq!(pos.local_x(), 31);
        assert_eq!(pos.local_z(), 31);
        assert_eq!(pos.chunk(), ChunkCoord::new(-1, -2));
    }
}
