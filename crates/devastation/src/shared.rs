//! # Shared Simulation Handle
//!
//! A cloneable, thread-safe handle around one [`Simulation`]. Operator
//! commands and status queries from other threads take the same lock as the
//! loop thread, so each runs between two engine steps, never inside one.

use std::sync::Arc;

use devastation_core::{AggregateStatus, ChunkStatus, Placement, SourceStatus, WardHost, WardStatus};
use devastation_world::{BlockPos, ChunkCoord, VoxelGrid};
use parking_lot::{Mutex, MutexGuard};

use crate::scheduler::{SimulationLoop, TickStats};
use crate::simulation::Simulation;

/// Thread-safe handle to a simulation.
pub struct SharedSimulation<G: VoxelGrid, H: WardHost> {
    inner: Arc<Mutex<Simulation<G, H>>>,
}

impl<G: VoxelGrid, H: WardHost> Clone for SharedSimulation<G, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: VoxelGrid, H: WardHost> SharedSimulation<G, H> {
    /// Wraps a simulation.
    #[must_use]
    pub fn new(sim: Simulation<G, H>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sim)),
        }
    }

    /// Runs `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut Simulation<G, H>) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// Locks the simulation until the guard is dropped.
    pub fn lock(&self) -> MutexGuard<'_, Simulation<G, H>> {
        self.inner.lock()
    }

    /// Runs one loop update under the lock.
    pub fn step(&self, sim_loop: &mut SimulationLoop) -> TickStats {
        sim_loop.update(&mut *self.inner.lock())
    }

    /// Places a source.
    pub fn add_source(&self, placement: Placement) -> Option<u64> {
        self.inner.lock().add_source(placement)
    }

    /// Removes a source.
    pub fn remove_source(&self, id: u64) -> bool {
        self.inner.lock().remove_source(id)
    }

    /// Starts tracking a chunk.
    pub fn mark_chunk(&self, coord: ChunkCoord) -> bool {
        self.inner.lock().mark_chunk(coord)
    }

    /// Stops tracking a chunk.
    pub fn clear_chunk(&self, coord: ChunkCoord) -> bool {
        self.inner.lock().clear_chunk(coord)
    }

    /// Registers a ward.
    pub fn add_ward(&self, pos: BlockPos) -> bool {
        self.inner.lock().add_ward(pos)
    }

    /// Forgets a ward.
    pub fn remove_ward(&self, pos: BlockPos) -> bool {
        self.inner.lock().remove_ward(pos)
    }

    /// Returns true if an active ward protects `pos`.
    #[must_use]
    pub fn is_protected(&self, pos: BlockPos) -> bool {
        self.inner.lock().is_protected(pos)
    }

    /// One status per source.
    #[must_use]
    pub fn source_status(&self) -> Vec<SourceStatus> {
        self.inner.lock().source_status()
    }

    /// One status per tracked chunk.
    #[must_use]
    pub fn chunk_status(&self) -> Vec<ChunkStatus> {
        self.inner.lock().chunk_status()
    }

    /// One status per ward.
    #[must_use]
    pub fn ward_status(&self) -> Vec<WardStatus> {
        self.inner.lock().ward_status()
    }

    /// Counts across every engine.
    #[must_use]
    pub fn aggregate_status(&self) -> AggregateStatus {
        self.inner.lock().aggregate_status()
    }
}
