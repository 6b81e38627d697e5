//! # Devastation Core
//!
//! The spread and heal simulation. Three engines share one voxel grid:
//!
//! - `SourceGrowthEngine`: point sources growing radially, adapting their
//!   radius and spawning children by metastasis
//! - `ChunkFrontierEngine`: flood frontiers filling whole 32x32 columns,
//!   bleeding over edges and spreading to neighbouring columns
//! - `RiftWardEngine`: protective structures that veto corruption inside a
//!   radius and heal what is already there
//!
//! ## Tick Model
//!
//! ```text
//! ┌──────────┐   TickContext    ┌──────────────┐
//! │  Driver  │ ───────────────> │    Engine    │ ──> DevastationEvent
//! │ (host)   │  grid, oracle,   │  (budgeted)  │
//! └──────────┘  protection, rng └──────────────┘
//! ```
//!
//! Every engine step borrows a [`TickContext`]; faults inside a step are
//! logged per entity and never escape the tick.
//!
//! ## Example
//!
//! ```rust
//! use devastation_core::{
//!     seeded_rng, BlockOracle, DevastationConfig, EventBus, NoProtection, Placement,
//!     RegenerationTracker, SourceGrowthEngine, TickContext,
//! };
//! use devastation_world::{BlockPos, BlockRegistry, ChunkCoord, FlatTerrain, VoxelWorld};
//!
//! let registry = BlockRegistry::with_default_catalog();
//! let oracle = BlockOracle::with_default_rules(&registry).unwrap();
//! let mut world = VoxelWorld::with_terrain(FlatTerrain::all_soil(&registry, 64));
//! world.ensure_loaded_around(ChunkCoord::new(0, 0), 1);
//!
//! let config = DevastationConfig::default();
//! let (events, _receiver) = EventBus::create_pair(1024);
//! let mut sources = SourceGrowthEngine::new();
//! sources.place(Placement::new(BlockPos::new(0, 64, 0), 8, 4.0), &config, &events);
//!
//! let mut rng = seeded_rng(Some(7));
//! let mut regen = RegenerationTracker::new();
//! let mut ctx = TickContext {
//!     grid: &mut world,
//!     oracle: &oracle,
//!     protection: &NoProtection,
//!     rng: &mut rng,
//!     events: &events,
//!     regen: &mut regen,
//!     config: &config,
//!     now: 0.0,
//! };
//! let report = sources.tick(&mut ctx);
//! assert!(report.blocks_converted <= 5);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod chunk;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod oracle;
pub mod persistence;
pub mod protection;
pub mod regen;
pub mod rng;
pub mod source;
pub mod status;
pub mod ward;

pub use chunk::{
    ChunkFrontierEngine, ChunkSnapshot, ChunkTickReport, DevastatedChunk, FrontierSet,
};
pub use clock::{Clock, ManualClock, SimTime, SystemClock};
pub use config::{
    ChunkConfig, DevastationConfig, RegenConfig, ScanMode, ScheduleConfig, SourceConfig,
    WardConfig,
};
pub use context::TickContext;
pub use error::{DevastationError, DevastationResult};
pub use events::{
    DevastationEvent, EventBus, EventReceiver, EventSender, RemovalReason, TrackCause,
};
pub use oracle::{BlockOracle, Conversion, FamilyRule};
pub use persistence::{BlobStore, FileBlobStore, MemoryBlobStore, SavedState};
pub use protection::{NoProtection, ProtectionQuery};
pub use regen::{RegenEntry, RegenReport, RegenerationTracker};
pub use rng::{seeded_rng, SimRng};
pub use source::{DevastationSource, Placement, SourceGrowthEngine, SourceSnapshot, SourceTickReport};
pub use status::{AggregateStatus, ChunkStatus, SourceStatus, WardStatus};
pub use ward::{
    RiftWard, RiftWardEngine, StaticWardHost, WardHost, WardHostState, WardSnapshot,
    WardStructure, WardTickReport,
};
