//! # Devastation
//!
//! The host-facing side of the devastation simulation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SharedSimulation (mutex)                    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  SimulationLoop ──> Simulation                                   │
//! │  (intervals,        ├─ SourceGrowthEngine ── touched chunks ─┐   │
//! │   catch-up,         ├─ ChunkFrontierEngine <─────────────────┘   │
//! │   tick stats)       ├─ RiftWardEngine ────── cleansed areas ──>  │
//! │                     ├─ RegenerationTracker     untrack chunks    │
//! │                     └─ EventBus ──> host                         │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `simulation`: engine ownership, operator commands, status, persistence
//! - `scheduler`: fixed-interval stepping and timing statistics
//! - `shared`: a cloneable handle for threaded hosts
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use devastation::core::{DevastationConfig, ManualClock, StaticWardHost};
//! use devastation::world::{BlockPos, BlockRegistry, ChunkCoord, FlatTerrain, VoxelWorld};
//! use devastation::{Simulation, SimulationLoop};
//!
//! let registry = BlockRegistry::with_default_catalog();
//! let mut world = VoxelWorld::with_terrain(FlatTerrain::all_soil(&registry, 64));
//! world.ensure_loaded_around(ChunkCoord::new(0, 0), 1);
//!
//! let clock = Arc::new(ManualClock::new());
//! let mut sim = Simulation::new(
//!     world,
//!     StaticWardHost::new(),
//!     registry,
//!     DevastationConfig::default(),
//!     clock,
//! )
//! .unwrap();
//! sim.add_source_at(BlockPos::new(0, 64, 0));
//!
//! let mut sim_loop = SimulationLoop::new();
//! let stats = sim_loop.advance(&mut sim, Duration::from_millis(50));
//! assert_eq!(stats.source_steps, 5);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod scheduler;
pub mod shared;
pub mod simulation;

pub use devastation_core as core;
pub use devastation_world as world;

pub use scheduler::{SimulationLoop, TickStats, TickStatsAccumulator};
pub use shared::SharedSimulation;
pub use simulation::Simulation;
