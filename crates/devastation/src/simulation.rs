//! # Simulation Driver
//!
//! Owns the three engines, the regeneration tracker, the shared random
//! source and the event bus, and borrows the host grid into each step.
//!
//! ```text
//! tick_sources ──> touched chunks ──> ChunkFrontierEngine::track
//! tick_chunks
//! tick_wards ────> cleansed areas ──> ChunkFrontierEngine::untrack_within
//! tick_regeneration
//! ```
//!
//! Rift wards are the protection query for every spreading step; ward
//! healing itself runs unprotected.

use std::sync::Arc;

use devastation_core::persistence::BlobStore;
use devastation_core::{
    seeded_rng, AggregateStatus, BlockOracle, ChunkFrontierEngine, ChunkStatus, ChunkTickReport,
    Clock, DevastationConfig, DevastationResult, EventBus, EventReceiver, EventSender,
    NoProtection, Placement, ProtectionQuery, RegenReport, RegenerationTracker, RiftWardEngine,
    SavedState, SimRng, SimTime, SourceGrowthEngine, SourceStatus, SourceTickReport, TickContext,
    TrackCause, WardHost, WardStatus, WardTickReport,
};
use devastation_world::{BlockPos, BlockRegistry, ChunkCoord, VoxelGrid};
use tracing::{debug, info};

/// The whole simulation around one host grid.
pub struct Simulation<G: VoxelGrid, H: WardHost> {
    grid: G,
    host: H,
    registry: BlockRegistry,
    oracle: BlockOracle,
    config: DevastationConfig,
    sources: SourceGrowthEngine,
    chunks: ChunkFrontierEngine,
    wards: RiftWardEngine,
    regen: RegenerationTracker,
    rng: SimRng,
    bus: EventBus,
    sender: EventSender,
    clock: Arc<dyn Clock>,
    sim_time: SimTime,
}

impl<G: VoxelGrid, H: WardHost> Simulation<G, H> {
    /// Creates a simulation with empty engines.
    ///
    /// The oracle is resolved from `config.rules`, or from the built-in rule
    /// table when that list is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails validation or a rule names a
    /// block the registry does not know.
    pub fn new(
        grid: G,
        host: H,
        registry: BlockRegistry,
        config: DevastationConfig,
        clock: Arc<dyn Clock>,
    ) -> DevastationResult<Self> {
        config.validate()?;
        let oracle = build_oracle(&registry, &config)?;
        let bus = EventBus::new(config.schedule.event_capacity);
        let sender = bus.sender();
        info!(
            speed = config.speed,
            max_sources = config.sources.max_sources,
            ward_radius = config.wards.protection_radius,
            ward_mode = ?config.wards.mode,
            seeded = config.rng_seed.is_some(),
            "simulation created"
        );

        Ok(Self {
            grid,
            host,
            registry,
            oracle,
            sources: SourceGrowthEngine::new(),
            chunks: ChunkFrontierEngine::new(),
            wards: RiftWardEngine::new(&config.wards),
            regen: RegenerationTracker::new(),
            rng: seeded_rng(config.rng_seed),
            bus,
            sender,
            clock,
            sim_time: SimTime::default(),
            config,
        })
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Monotonic simulated seconds; a clock moving backward reads as no time
    /// elapsed.
    pub fn now(&mut self) -> f64 {
        self.sim_time.observe(self.clock.sim_seconds())
    }

    /// The clock driving this simulation.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // =========================================================================
    // Operator commands
    // =========================================================================

    /// Places a source. Returns its id, or `None` if the population is full
    /// of sources that cannot be evicted.
    pub fn add_source(&mut self, placement: Placement) -> Option<u64> {
        self.sources.place(placement, &self.config, &self.sender)
    }

    /// Places a devastating source with the configured range and amount.
    pub fn add_source_at(&mut self, pos: BlockPos) -> Option<u64> {
        self.add_source(Placement::with_defaults(pos, &self.config.sources))
    }

    /// Removes a source.
    pub fn remove_source(&mut self, id: u64) -> bool {
        self.sources.remove(id, &self.sender)
    }

    /// Starts tracking a chunk. Chunks overlapping an active ward are
    /// refused.
    pub fn mark_chunk(&mut self, coord: ChunkCoord) -> bool {
        if self.wards.is_chunk_protected(coord) {
            debug!(chunk = %coord, "mark refused, chunk is protected");
            return false;
        }
        self.chunks.track(coord, TrackCause::Manual, &self.sender)
    }

    /// Stops tracking a chunk. Blocks already converted stay as they are.
    pub fn clear_chunk(&mut self, coord: ChunkCoord) -> bool {
        let cleared = self.chunks.untrack(coord).is_some();
        if cleared {
            debug!(chunk = %coord, "chunk cleared");
        }
        cleared
    }

    /// Registers a ward and polls its structure right away.
    pub fn add_ward(&mut self, pos: BlockPos) -> bool {
        let now = self.now();
        if !self.wards.add(pos, now) {
            return false;
        }
        let real_now = self.clock.real_elapsed();
        self.wards
            .poll(&self.host, real_now, &self.config.wards, &self.sender, true);
        true
    }

    /// Forgets a ward.
    pub fn remove_ward(&mut self, pos: BlockPos) -> bool {
        self.wards.remove(pos)
    }

    /// Replaces the configuration. Oracle rules are re-resolved when they
    /// change; a new ward mode or radius resets healing progress.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the old config in place, if the new one
    /// fails validation or its rules cannot be resolved.
    pub fn set_config(&mut self, config: DevastationConfig) -> DevastationResult<()> {
        config.validate()?;
        if config.rules != self.config.rules {
            self.oracle = build_oracle(&self.registry, &config)?;
        }
        self.wards.apply_config(&config.wards);
        self.config = config;
        info!("configuration replaced");
        Ok(())
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Grows every source, then marks the untracked, unprotected chunks it
    /// converted blocks in when source chunk seeding is on.
    pub fn tick_sources(&mut self) -> SourceTickReport {
        let now = self.now();
        let mut ctx = TickContext {
            grid: &mut self.grid,
            oracle: &self.oracle,
            protection: &self.wards,
            rng: &mut self.rng,
            events: &self.sender,
            regen: &mut self.regen,
            config: &self.config,
            now,
        };
        let report = self.sources.tick(&mut ctx);

        if self.config.sources.seed_chunks {
            for coord in &report.touched_chunks {
                if !self.chunks.is_tracked(*coord) && !self.wards.is_chunk_protected(*coord) {
                    self.chunks.track(*coord, TrackCause::Source, &self.sender);
                }
            }
        }
        report
    }

    /// Steps every tracked chunk.
    pub fn tick_chunks(&mut self) -> ChunkTickReport {
        let now = self.now();
        let mut ctx = TickContext {
            grid: &mut self.grid,
            oracle: &self.oracle,
            protection: &self.wards,
            rng: &mut self.rng,
            events: &self.sender,
            regen: &mut self.regen,
            config: &self.config,
            now,
        };
        self.chunks.tick(&mut ctx)
    }

    /// Polls ward structures, heals `dt` seconds worth of blocks and stops
    /// tracking chunks inside each cleansed area.
    pub fn tick_wards(&mut self, dt: f64) -> WardTickReport {
        let real_now = self.clock.real_elapsed();
        self.wards
            .poll(&self.host, real_now, &self.config.wards, &self.sender, false);

        let now = self.now();
        let mut ctx = TickContext {
            grid: &mut self.grid,
            oracle: &self.oracle,
            protection: &NoProtection,
            rng: &mut self.rng,
            events: &self.sender,
            regen: &mut self.regen,
            config: &self.config,
            now,
        };
        let report = self.wards.tick(&mut ctx, dt);

        for area in &report.cleansed {
            self.chunks.untrack_within(area.ward, area.radius, &self.sender);
        }
        report
    }

    /// Settles devastated blocks whose delay has passed.
    pub fn tick_regeneration(&mut self) -> RegenReport {
        let now = self.now();
        self.regen.tick(
            &mut self.grid,
            now,
            self.config.regen.max_per_tick,
            &self.sender,
        )
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns true if an active ward protects `pos`.
    #[must_use]
    pub fn is_protected(&self, pos: BlockPos) -> bool {
        self.wards.is_protected(pos)
    }

    /// Returns true if the block at `pos` is devastated or settled.
    #[must_use]
    pub fn is_devastated(&self, pos: BlockPos) -> bool {
        self.oracle.is_devastated(self.grid.get_or_air(pos))
    }

    /// One status per source.
    #[must_use]
    pub fn source_status(&self) -> Vec<SourceStatus> {
        self.sources.sources().iter().map(SourceStatus::from).collect()
    }

    /// One status per tracked chunk, ordered by coordinate.
    #[must_use]
    pub fn chunk_status(&self) -> Vec<ChunkStatus> {
        let nominal = self.config.chunks.min_blocks_for_full;
        let mut status: Vec<ChunkStatus> = self
            .chunks
            .iter()
            .map(|chunk| ChunkStatus::of(chunk, nominal))
            .collect();
        status.sort_by_key(|s| s.coord);
        status
    }

    /// Status of one chunk, if tracked.
    #[must_use]
    pub fn chunk_status_at(&self, coord: ChunkCoord) -> Option<ChunkStatus> {
        self.chunks
            .get(coord)
            .map(|chunk| ChunkStatus::of(chunk, self.config.chunks.min_blocks_for_full))
    }

    /// One status per ward.
    #[must_use]
    pub fn ward_status(&self) -> Vec<WardStatus> {
        let mode = self.config.wards.mode;
        self.wards
            .wards()
            .iter()
            .map(|ward| WardStatus::of(ward, mode))
            .collect()
    }

    /// Counts across every engine.
    #[must_use]
    pub fn aggregate_status(&self) -> AggregateStatus {
        AggregateStatus::collect(
            &self.sources,
            &self.chunks,
            &self.wards,
            self.regen.len(),
            self.sender.dropped_count(),
        )
    }

    /// A receiver on the event bus.
    #[must_use]
    pub fn events(&self) -> EventReceiver {
        self.bus.receiver()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Current state of every engine.
    #[must_use]
    pub fn snapshot(&self) -> SavedState {
        SavedState {
            sources: self.sources.snapshot(),
            chunks: self.chunks.snapshot(),
            wards: self.wards.snapshot(),
            regen: self.regen.snapshot(),
        }
    }

    /// Saves every engine to `store`.
    ///
    /// # Errors
    ///
    /// Returns the first encoding or write failure.
    pub fn save(&self, store: &(impl BlobStore + ?Sized)) -> DevastationResult<()> {
        self.snapshot().save(store)
    }

    /// Replaces every engine's state with what `store` holds. Missing or
    /// corrupt blobs leave that engine empty.
    pub fn load(&mut self, store: &(impl BlobStore + ?Sized)) {
        let SavedState {
            sources,
            chunks,
            wards,
            regen,
        } = SavedState::load(store);
        self.sources.restore(sources);
        self.chunks.restore(chunks, &self.sender);
        self.wards.restore(wards);
        self.regen.restore(regen);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &DevastationConfig {
        &self.config
    }

    /// The host grid.
    #[must_use]
    pub fn grid(&self) -> &G {
        &self.grid
    }

    /// Mutable access to the host grid.
    pub fn grid_mut(&mut self) -> &mut G {
        &mut self.grid
    }

    /// The ward host.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the ward host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Block classification in use.
    #[must_use]
    pub fn oracle(&self) -> &BlockOracle {
        &self.oracle
    }

    /// Source engine.
    #[must_use]
    pub fn sources(&self) -> &SourceGrowthEngine {
        &self.sources
    }

    /// Chunk engine.
    #[must_use]
    pub fn chunks(&self) -> &ChunkFrontierEngine {
        &self.chunks
    }

    /// Ward engine.
    #[must_use]
    pub fn wards(&self) -> &RiftWardEngine {
        &self.wards
    }

    /// Pending regenerations.
    #[must_use]
    pub fn regeneration(&self) -> &RegenerationTracker {
        &self.regen
    }
}

fn build_oracle(
    registry: &BlockRegistry,
    config: &DevastationConfig,
) -> DevastationResult<BlockOracle> {
    if config.rules.is_empty() {
        BlockOracle::with_default_rules(registry)
    } else {
        BlockOracle::new(registry, &config.rules)
    }
}
