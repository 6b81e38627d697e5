//! Shared world fixture for the integration tests.

#![allow(dead_code)]

use devastation_core::{
    seeded_rng, BlockOracle, DevastationConfig, EventBus, EventReceiver, EventSender,
    NoProtection, ProtectionQuery, RegenerationTracker, SimRng, TickContext,
};
use devastation_world::{
    names, BlockId, BlockPos, BlockRegistry, ChunkCoord, FlatTerrain, VoxelGrid, VoxelWorld,
};

/// Owned pieces a tick context borrows from.
pub struct World {
    pub registry: BlockRegistry,
    pub grid: VoxelWorld,
    pub oracle: BlockOracle,
    pub rng: SimRng,
    pub sender: EventSender,
    pub receiver: EventReceiver,
    pub regen: RegenerationTracker,
    pub config: DevastationConfig,
    pub now: f64,
}

impl World {
    /// Grass-covered soil up to y=64, chunks -3..=3 loaded.
    pub fn soil() -> Self {
        let registry = BlockRegistry::with_default_catalog();
        let mut grid = VoxelWorld::with_terrain(FlatTerrain::all_soil(&registry, 64));
        grid.ensure_loaded_around(ChunkCoord::new(0, 0), 3);
        Self::with_grid(registry, grid)
    }

    /// Bedrock up to y=64, chunks -1..=1 loaded. Nothing converts.
    pub fn bedrock() -> Self {
        let registry = BlockRegistry::with_default_catalog();
        let bedrock = registry.id(names::BEDROCK).unwrap();
        let mut grid = VoxelWorld::with_terrain(FlatTerrain::new().with_layer(bedrock, 0, 64));
        grid.ensure_loaded_around(ChunkCoord::new(0, 0), 1);
        Self::with_grid(registry, grid)
    }

    /// Bedrock up to y=64 with a 10x10 grass patch on top of chunk (0,0).
    pub fn sparse() -> Self {
        let registry = BlockRegistry::with_default_catalog();
        let bedrock = registry.id(names::BEDROCK).unwrap();
        let grass = registry.id(names::SOIL_GRASS).unwrap();
        let terrain = FlatTerrain::new().with_layer(bedrock, 0, 64);
        let mut grid = VoxelWorld::with_terrain(terrain);
        grid.ensure_loaded_around(ChunkCoord::new(0, 0), 1);
        for x in 11..21 {
            for z in 11..21 {
                grid.set(BlockPos::new(x, 64, z), grass).unwrap();
            }
        }
        Self::with_grid(registry, grid)
    }

    pub fn with_grid(registry: BlockRegistry, grid: VoxelWorld) -> Self {
        let oracle = BlockOracle::with_default_rules(&registry).unwrap();
        let (sender, receiver) = EventBus::create_pair(1 << 18);
        Self {
            registry,
            grid,
            oracle,
            rng: seeded_rng(Some(42)),
            sender,
            receiver,
            regen: RegenerationTracker::new(),
            config: DevastationConfig::default(),
            now: 0.0,
        }
    }

    pub fn ctx(&mut self) -> TickContext<'_> {
        self.ctx_with(&NoProtection)
    }

    pub fn ctx_with<'a>(&'a mut self, protection: &'a dyn ProtectionQuery) -> TickContext<'a> {
        TickContext {
            grid: &mut self.grid,
            oracle: &self.oracle,
            protection,
            rng: &mut self.rng,
            events: &self.sender,
            regen: &mut self.regen,
            config: &self.config,
            now: self.now,
        }
    }

    pub fn id(&self, name: &str) -> BlockId {
        self.registry.id(name).unwrap()
    }

    pub fn is_devastated(&self, pos: BlockPos) -> bool {
        self.oracle.is_devastated(self.grid.get_or_air(pos))
    }

    /// Every devastated block in an inclusive box.
    pub fn devastated_in(&self, min: BlockPos, max: BlockPos) -> Vec<BlockPos> {
        let mut found = Vec::new();
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    let pos = BlockPos::new(x, y, z);
                    if self.is_devastated(pos) {
                        found.push(pos);
                    }
                }
            }
        }
        found
    }
}
