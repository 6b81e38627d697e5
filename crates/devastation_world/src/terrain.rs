//! # Flat Terrain
//!
//! Layered column fill for reference worlds. Every column of a chunk filled
//! from a [`FlatTerrain`] is identical: a stack of horizontal bands from
//! bedrock upward.

use crate::block::{names, BlockId, BlockRegistry};
use crate::chunk::{ColumnChunk, CHUNK_HEIGHT};
use crate::coord::CHUNK_SIZE;

/// One horizontal band of identical blocks (inclusive Y range).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainLayer {
    /// Block filling the band.
    pub block: BlockId,
    /// Lowest Y of the band.
    pub from_y: i32,
    /// Highest Y of the band.
    pub to_y: i32,
}

/// A stack of terrain layers. Later layers overwrite earlier ones where they
/// overlap.
#[derive(Clone, Debug, Default)]
pub struct FlatTerrain {
    layers: Vec<TerrainLayer>,
}

impl FlatTerrain {
    /// Creates terrain with no layers (all air).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a band of blocks.
    #[must_use]
    pub fn with_layer(mut self, block: BlockId, from_y: i32, to_y: i32) -> Self {
        self.layers.push(TerrainLayer { block, from_y, to_y });
        self
    }

    /// Bedrock at y=0 and grass-covered soil from y=1 to `surface_y`.
    ///
    /// Names missing from the registry fill as air.
    #[must_use]
    pub fn all_soil(registry: &BlockRegistry, surface_y: i32) -> Self {
        let id = |name| registry.id(name).unwrap_or_default();
        Self::new()
            .with_layer(id(names::BEDROCK), 0, 0)
            .with_layer(id(names::SOIL_GRASS), 1, surface_y)
    }

    /// Bedrock, stone, three bands of dirt and a grass surface at `surface_y`.
    #[must_use]
    pub fn layered(registry: &BlockRegistry, surface_y: i32) -> Self {
        let id = |name| registry.id(name).unwrap_or_default();
        Self::new()
            .with_layer(id(names::BEDROCK), 0, 0)
            .with_layer(id(names::ROCK_STONE), 1, surface_y - 4)
            .with_layer(id(names::SOIL_DIRT), surface_y - 3, surface_y - 1)
            .with_layer(id(names::SOIL_GRASS), surface_y, surface_y)
    }

    /// Adds a band of water directly above `from_y`.
    #[must_use]
    pub fn with_water(self, registry: &BlockRegistry, from_y: i32, to_y: i32) -> Self {
        let water = registry.id(names::WATER).unwrap_or_default();
        self.with_layer(water, from_y, to_y)
    }

    /// The block this terrain places at height `y`.
    #[must_use]
    pub fn block_at(&self, y: i32) -> BlockId {
        self.layers
            .iter()
            .rev()
            .find(|layer| (layer.from_y..=layer.to_y).contains(&y))
            .map_or(BlockId::AIR, |layer| layer.block)
    }

    /// Highest non-air Y produced by this terrain (-1 if none).
    #[must_use]
    pub fn surface_y(&self) -> i32 {
        (0..CHUNK_HEIGHT)
            .rev()
            .find(|y| !self.block_at(*y).is_air())
            .unwrap_or(-1)
    }

    /// Fills every column of a chunk.
    pub fn fill(&self, chunk: &mut ColumnChunk) {
        let top = self.surface_y();
        for y in 0..=top {
            let block = self.block_at(y);
            if block.is_air() {
                continue;
            }
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    chunk.set_block(x, y, z, block);
                }
            }
        }
        chunk.modified = false;
    }
}
