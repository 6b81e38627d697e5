//! # Rift Wards
//!
//! Protective structures that block corruption inside a radius and heal
//! what is already there.
//!
//! ## Healing Modes
//!
//! | Mode   | Progress                               | Cleansed radius          |
//! |--------|----------------------------------------|--------------------------|
//! | Raster | exact integer shells, persisted cursor | current shell, full once |
//! |        |                                        | a pass completes         |
//! | Radial | one growing radius, random shell hits  | largest radius cleaned   |
//! | Random | none                                   | full radius              |
//!
//! Ward liveness (switched on, fuelled) belongs to the host; the engine
//! polls it through [`WardHost`] at a bounded rate.

mod engine;
pub mod shell;

use std::collections::HashMap;
use std::time::Duration;

use devastation_world::BlockPos;
use serde::{Deserialize, Serialize};

pub use engine::{CleansedArea, RiftWardEngine, WardSnapshot, WardTickReport};

/// Live state of a host-owned ward structure.
pub trait WardHostState {
    /// The structure is switched on.
    fn is_on(&self) -> bool;

    /// The structure has fuel left.
    fn has_fuel(&self) -> bool;
}

/// Looks up ward structures in the host world.
pub trait WardHost {
    /// The structure at `pos`, or `None` if it is gone.
    fn structure_at(&self, pos: BlockPos) -> Option<&dyn WardHostState>;
}

/// A plain on/fuel pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WardStructure {
    /// Switched on.
    pub on: bool,
    /// Has fuel.
    pub fuel: bool,
}

impl WardStructure {
    /// A structure that is on and fuelled.
    #[must_use]
    pub const fn running() -> Self {
        Self { on: true, fuel: true }
    }
}

impl WardHostState for WardStructure {
    fn is_on(&self) -> bool {
        self.on
    }

    fn has_fuel(&self) -> bool {
        self.fuel
    }
}

/// Ward structures held in a map, for headless hosts and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticWardHost {
    structures: HashMap<BlockPos, WardStructure>,
}

impl StaticWardHost {
    /// Creates a host with no structures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places (or replaces) a structure.
    pub fn place(&mut self, pos: BlockPos, structure: WardStructure) {
        self.structures.insert(pos, structure);
    }

    /// Removes a structure.
    pub fn remove(&mut self, pos: BlockPos) -> bool {
        self.structures.remove(&pos).is_some()
    }

    /// Mutable access to a structure.
    pub fn get_mut(&mut self, pos: BlockPos) -> Option<&mut WardStructure> {
        self.structures.get_mut(&pos)
    }
}

impl WardHost for StaticWardHost {
    fn structure_at(&self, pos: BlockPos) -> Option<&dyn WardHostState> {
        self.structures
            .get(&pos)
            .map(|structure| structure as &dyn WardHostState)
    }
}

/// Healing progress of one ward. Reset when the scan mode or the
/// protection radius changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealProgress {
    /// Radius currently being cleaned.
    pub current_clean_radius: i32,
    /// Next raster offset to examine in the current shell.
    pub raster_cursor: Option<[i32; 3]>,
    /// A full raster pass has finished.
    pub raster_scan_complete: bool,
    /// Consecutive clean radial samples at the current radius.
    pub radial_clean_failures: u32,
    /// Largest radius fully cleaned.
    pub max_clean_radius_reached: i32,
    /// Blocks healed since the last reset.
    pub blocks_healed: u64,
    /// Fractional heal budget carried to the next tick.
    #[serde(default)]
    pub budget_carry: f64,
}

/// A protective structure known to the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiftWard {
    /// Structure position.
    pub pos: BlockPos,
    /// Simulated time it was first seen.
    pub discovered_at: f64,
    /// Cached on-and-fuelled state.
    pub active: bool,
    /// Real time of the last host poll.
    #[serde(skip)]
    pub last_poll: Option<Duration>,
    /// Healing progress.
    pub progress: HealProgress,
}

impl RiftWard {
    /// A newly discovered, not yet polled ward.
    #[must_use]
    pub fn new(pos: BlockPos, discovered_at: f64) -> Self {
        Self {
            pos,
            discovered_at,
            active: false,
            last_poll: None,
            progress: HealProgress::default(),
        }
    }
}
