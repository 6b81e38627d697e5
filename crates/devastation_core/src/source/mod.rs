//! # Devastation Sources
//!
//! Point sources that grow (or heal) outward from an anchor block.
//!
//! ## Growth Cycle
//!
//! ```text
//! radial attempt ──> success window full? ──> adaptive radius / stall count
//!        │                                            │
//!        └────────── blocks since last child ≥ threshold, radius at range
//!                                   │
//!                                   v
//!                   pillar search ──> jump search ──> child source
//! ```

mod engine;
mod metastasis;
mod population;

use devastation_world::BlockPos;
use serde::{Deserialize, Serialize};

use crate::config::SourceConfig;

pub use engine::{SourceEngineState, SourceGrowthEngine, SourceSnapshot, SourceTickReport};

/// How a new source is placed by the operator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Anchor position.
    pub pos: BlockPos,
    /// Target maximum radius.
    pub range: i32,
    /// Conversions per tick at speed 1.
    pub amount: f64,
    /// Heal instead of devastate.
    pub healing: bool,
}

impl Placement {
    /// A devastating source with explicit range and amount.
    #[must_use]
    pub const fn new(pos: BlockPos, range: i32, amount: f64) -> Self {
        Self {
            pos,
            range,
            amount,
            healing: false,
        }
    }

    /// A devastating source with the configured defaults.
    #[must_use]
    pub fn with_defaults(pos: BlockPos, config: &SourceConfig) -> Self {
        Self::new(pos, config.default_range, config.default_amount)
    }

    /// Turns the placement into a healing source.
    #[must_use]
    pub const fn healing(mut self) -> Self {
        self.healing = true;
        self
    }
}

/// A growing or healing point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DevastationSource {
    /// Unique id.
    pub id: u64,
    /// Anchor block position.
    pub pos: BlockPos,
    /// Target maximum radius.
    pub range: i32,
    /// Conversions per tick at speed 1.
    pub amount: f64,
    /// Radius currently sampled.
    pub current_radius: i32,
    /// Successful attempts in the current window.
    pub window_successes: u32,
    /// Attempts in the current window.
    pub window_attempts: u32,
    /// Heals instead of devastating.
    pub is_healing: bool,
    /// Spawned by another source.
    pub is_metastasis: bool,
    /// Metastasis depth (0 for placed sources).
    pub generation_level: u32,
    /// Source that spawned this one.
    pub parent_id: Option<u64>,
    /// Blocks devastated over the source's life.
    pub blocks_devastated_total: u64,
    /// Blocks devastated since the last metastasis attempt.
    pub blocks_since_last_metastasis: u64,
    /// Conversions between metastasis attempts.
    pub metastasis_threshold: u64,
    /// Stopped growing; eligible for cleanup.
    pub is_saturated: bool,
    /// Placed by the operator; never removed automatically.
    pub is_protected: bool,
    /// Consecutive stalled windows at full radius.
    pub stall_counter: u32,
    /// Children spawned so far.
    pub children_spawned: u32,
    /// Simulated time of the last child.
    pub last_child_spawn_time: Option<f64>,
    /// Consecutive spawn searches that found nothing.
    pub failed_spawn_attempts: u32,
    /// A metastasis attempt is due regardless of the threshold.
    #[serde(default)]
    pub forced_metastasis: bool,
}

impl DevastationSource {
    /// A source placed by the operator.
    #[must_use]
    pub fn placed(id: u64, placement: Placement, config: &SourceConfig) -> Self {
        Self {
            id,
            pos: placement.pos,
            range: placement.range.max(0),
            amount: placement.amount.max(0.0),
            current_radius: config.initial_radius.min(placement.range).max(0),
            window_successes: 0,
            window_attempts: 0,
            is_healing: placement.healing,
            is_metastasis: false,
            generation_level: 0,
            parent_id: None,
            blocks_devastated_total: 0,
            blocks_since_last_metastasis: 0,
            metastasis_threshold: config.metastasis_threshold,
            is_saturated: false,
            is_protected: true,
            stall_counter: 0,
            children_spawned: 0,
            last_child_spawn_time: None,
            failed_spawn_attempts: 0,
            forced_metastasis: false,
        }
    }

    /// A child spawned by metastasis: inherits range and amount, one
    /// generation deeper, unprotected.
    #[must_use]
    pub fn child_of(parent: &Self, id: u64, pos: BlockPos, config: &SourceConfig) -> Self {
        let mut child = Self::placed(id, Placement::new(pos, parent.range, parent.amount), config);
        child.is_metastasis = true;
        child.is_protected = false;
        child.generation_level = parent.generation_level + 1;
        child.parent_id = Some(parent.id);
        child
    }

    /// Success rate of the current window (1.0 before any attempt).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.window_attempts == 0 {
            1.0
        } else {
            f64::from(self.window_successes) / f64::from(self.window_attempts)
        }
    }

    /// Returns true once the radius has grown to the range.
    #[inline]
    #[must_use]
    pub fn at_full_radius(&self) -> bool {
        self.current_radius >= self.range
    }
}
