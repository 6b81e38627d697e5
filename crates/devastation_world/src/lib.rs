//! # Devastation World
//!
//! The voxel side of the devastation simulation: coordinates, block
//! identities, and the grid contract the simulation mutates through.
//!
//! ## Core Components
//!
//! - `BlockPos` / `ChunkCoord`: integer world positions and 32x32 columns
//! - `BlockRegistry`: name to `BlockId` interning
//! - `VoxelGrid`: the host-owned grid the engines read and write
//! - `VoxelWorld`: a sparse in-memory grid for tests and headless hosts
//!
//! ## Example
//!
//! ```rust
//! use devastation_world::{BlockPos, BlockRegistry, ChunkCoord, FlatTerrain, VoxelGrid, VoxelWorld};
//!
//! let registry = BlockRegistry::with_default_catalog();
//! let mut world = VoxelWorld::with_terrain(FlatTerrain::all_soil(&registry, 64));
//! world.ensure_loaded_around(ChunkCoord::new(0, 0), 1);
//!
//! assert_eq!(world.surface_height(0, 0), 64);
//! assert_eq!(world.get(BlockPos::new(0, 64, 0)).ok(), registry.id("soil-grass"));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod block;
pub mod chunk;
pub mod coord;
pub mod grid;
pub mod terrain;
pub mod world;

pub use block::{names, BlockId, BlockRegistry, RegistryError, DEFAULT_CATALOG};
pub use chunk::{ColumnChunk, CHUNK_HEIGHT};
pub use coord::{
    BlockPos, ChunkCoord, Offset, ALL_OFFSETS, CHUNK_SIZE, FACE_OFFSETS, HORIZONTAL_OFFSETS,
};
pub use grid::{GridFault, VoxelGrid};
pub use terrain::{FlatTerrain, TerrainLayer};
pub use world::VoxelWorld;
