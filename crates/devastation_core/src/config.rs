//! # Simulation Configuration
//!
//! One immutable [`DevastationConfig`] snapshot is passed into every tick.
//! It loads from TOML; every field has a default, so a partial file only
//! overrides what it names.
//!
//! ```toml
//! speed = 2.0
//! rng_seed = 42
//!
//! [sources]
//! max_sources = 32
//!
//! [wards]
//! protection_radius = 24
//! mode = "radial"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DevastationError, DevastationResult};
use crate::oracle::FamilyRule;

/// How an active rift ward chooses which blocks to heal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Resumable sweep of concentric integer shells.
    #[default]
    Raster,
    /// Random samples on a single growing shell.
    Radial,
    /// Uniform samples across the whole protection sphere.
    Random,
}

/// Source growth settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Range given to sources placed without an explicit range.
    pub default_range: i32,
    /// Blocks per tick given to sources placed without an explicit amount.
    pub default_amount: f64,
    /// Radius a new source starts searching at.
    pub initial_radius: i32,
    /// Population cap.
    pub max_sources: usize,
    /// Whether sources may spawn children at all.
    pub metastasis_enabled: bool,
    /// Conversions between metastasis attempts.
    pub metastasis_threshold: u64,
    /// Local saturation needed before a child is spawned.
    pub saturation_threshold: f64,
    /// Random probes used to estimate local saturation.
    pub saturation_samples: u32,
    /// Attempts per adaptive-radius window.
    pub success_window: u32,
    /// Success rate under which the radius expands.
    pub low_success_threshold: f64,
    /// Success rate under which a max-radius window counts as stalled.
    pub very_low_success_threshold: f64,
    /// Consecutive stalled windows that force a metastasis attempt.
    pub max_stall_windows: u32,
    /// Random target samples per desired conversion.
    pub attempts_per_conversion: u32,
    /// Children after which a source saturates.
    pub max_children: u32,
    /// Seconds between two children of the same parent (divided by speed).
    pub child_spawn_delay_seconds: f64,
    /// Failed spawn searches after which a source saturates.
    pub max_failed_spawn_attempts: u32,
    /// Half height of the vertical pillar probed at each bearing.
    pub pillar_search_height: i32,
    /// Bearings probed by the pillar search.
    pub pillar_bearings: u32,
    /// Candidate must have more than this many convertible neighbours.
    pub pillar_min_neighbors: u32,
    /// Bearings probed on each ring of the long-range jump search.
    pub jump_bearings: u32,
    /// Jump-search candidate must have more than this many convertible neighbours.
    pub jump_min_neighbors: u32,
    /// Upper bound for jump-search ring distances.
    pub jump_max_distance: i32,
    /// Child anchors must touch air.
    pub require_air_adjacent: bool,
    /// Ticks between sweeps of saturated sources.
    pub cleanup_interval_ticks: u32,
    /// Mark chunks touched by source conversions for frontier processing.
    pub seed_chunks: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            default_range: 8,
            default_amount: 1.0,
            initial_radius: 2,
            max_sources: 64,
            metastasis_enabled: true,
            metastasis_threshold: 500,
            saturation_threshold: 0.6,
            saturation_samples: 64,
            success_window: 100,
            low_success_threshold: 0.3,
            very_low_success_threshold: 0.05,
            max_stall_windows: 10,
            attempts_per_conversion: 5,
            max_children: 3,
            child_spawn_delay_seconds: 30.0,
            max_failed_spawn_attempts: 5,
            pillar_search_height: 16,
            pillar_bearings: 32,
            pillar_min_neighbors: 5,
            jump_bearings: 16,
            jump_min_neighbors: 10,
            jump_max_distance: 128,
            require_air_adjacent: true,
            cleanup_interval_ticks: 100,
            seed_chunks: true,
        }
    }
}

/// Chunk frontier settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Conversions per chunk per tick at speed 1.
    pub base_budget: u32,
    /// Spread through all 26 neighbours instead of the 6 faces.
    pub diagonal_spreading: bool,
    /// Chance that a new edge block bleeds into a neighbour chunk.
    pub edge_bleed_chance: f64,
    /// Further hops a bleed seed may take.
    pub bleed_spread_budget: u32,
    /// Ticks between fill-in passes.
    pub fill_in_interval_ticks: u32,
    /// Positions sampled by one fill-in pass.
    pub fill_in_samples: u32,
    /// Frontier size that triggers pruning.
    pub frontier_prune_threshold: usize,
    /// Frontier size kept after pruning.
    pub frontier_prune_target: usize,
    /// Conversions needed before an empty frontier counts as fully devastated.
    pub min_blocks_for_full: u64,
    /// Conversions limited to this many blocks below the column surface.
    pub max_depth_below_surface: Option<i32>,
    /// Surface columns sampled when a frontier is initialised.
    pub init_samples: u32,
    /// Depth below the surface scanned for existing corruption.
    pub surface_scan_depth: i32,
    /// Ticks between chunk-to-chunk spread checks at speed 1.
    pub spread_interval_ticks: u32,
    /// Chance per tracked chunk per check to spread.
    pub spread_chance: f64,
    /// Maximum stuck chunks waiting for repair.
    pub repair_queue_capacity: usize,
    /// Seconds between repairs of one chunk.
    pub repair_cooldown_seconds: f64,
    /// Empty repairs before a chunk is given up on.
    pub max_repair_attempts: u32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            base_budget: 10,
            diagonal_spreading: false,
            edge_bleed_chance: 0.15,
            bleed_spread_budget: 3,
            fill_in_interval_ticks: 20,
            fill_in_samples: 64,
            frontier_prune_threshold: 500,
            frontier_prune_target: 300,
            min_blocks_for_full: 1000,
            max_depth_below_surface: None,
            init_samples: 32,
            surface_scan_depth: 8,
            spread_interval_ticks: 20,
            spread_chance: 0.1,
            repair_queue_capacity: 64,
            repair_cooldown_seconds: 30.0,
            max_repair_attempts: 5,
        }
    }
}

/// Rift ward settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardConfig {
    /// Protection and healing radius.
    pub protection_radius: i32,
    /// Healing algorithm.
    pub mode: ScanMode,
    /// Blocks healed per second per ward at speed 1.
    pub heal_rate: f64,
    /// Minimum milliseconds between two polls of a ward's structure.
    pub poll_interval_ms: u64,
    /// Positions examined per ward per tick.
    pub scan_limit_per_tick: u32,
    /// Consecutive clean samples before the radial scan advances.
    pub radial_max_failures: u32,
}

impl Default for WardConfig {
    fn default() -> Self {
        Self {
            protection_radius: 16,
            mode: ScanMode::Raster,
            heal_rate: 200.0,
            poll_interval_ms: 1000,
            scan_limit_per_tick: 4096,
            radial_max_failures: 32,
        }
    }
}

/// Regeneration settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenConfig {
    /// Track converted blocks for settling at all.
    pub enabled: bool,
    /// Simulated seconds before a devastated form settles.
    pub delay_seconds: f64,
    /// Settled blocks per regeneration step.
    pub max_per_tick: usize,
}

impl Default for RegenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_seconds: 300.0,
            max_per_tick: 256,
        }
    }
}

/// Step intervals used by the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Milliseconds between source growth steps.
    pub source_interval_ms: u64,
    /// Milliseconds between chunk frontier steps.
    pub chunk_interval_ms: u64,
    /// Milliseconds between rift ward steps.
    pub ward_interval_ms: u64,
    /// Milliseconds between regeneration steps.
    pub regen_interval_ms: u64,
    /// Events buffered before new ones are dropped.
    pub event_capacity: usize,
    /// Steps of one kind run per advance before the backlog is discarded.
    pub max_catch_up_steps: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            source_interval_ms: 10,
            chunk_interval_ms: 500,
            ward_interval_ms: 500,
            regen_interval_ms: 1000,
            event_capacity: 4096,
            max_catch_up_steps: 8,
        }
    }
}

/// Complete simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevastationConfig {
    /// Global speed multiplier applied to every budget.
    pub speed: f64,
    /// No conversion happens below this height.
    pub min_y_level: i32,
    /// Seed for the shared random source (entropy when absent).
    pub rng_seed: Option<u64>,
    /// Source growth.
    pub sources: SourceConfig,
    /// Chunk frontiers.
    pub chunks: ChunkConfig,
    /// Rift wards.
    pub wards: WardConfig,
    /// Regeneration.
    pub regen: RegenConfig,
    /// Scheduling.
    pub schedule: ScheduleConfig,
    /// Family rules replacing the built-in table when non-empty.
    pub rules: Vec<FamilyRule>,
}

impl Default for DevastationConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            min_y_level: 0,
            rng_seed: None,
            sources: SourceConfig::default(),
            chunks: ChunkConfig::default(),
            wards: WardConfig::default(),
            regen: RegenConfig::default(),
            schedule: ScheduleConfig::default(),
            rules: Vec::new(),
        }
    }
}

impl DevastationConfig {
    /// Production config: a larger population and faster healing for busy
    /// servers.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.sources.max_sources = 256;
        config.chunks.repair_queue_capacity = 256;
        config.wards.heal_rate = 400.0;
        config.schedule.event_capacity = 16_384;
        config
    }

    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_toml_str(text: &str) -> DevastationResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> DevastationResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Speed multiplier used by every budget.
    #[inline]
    #[must_use]
    pub fn effective_speed(&self) -> f64 {
        self.speed
    }

    /// Rejects values the engines cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`DevastationError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> DevastationResult<()> {
        fn check(ok: bool, message: &str) -> DevastationResult<()> {
            if ok {
                Ok(())
            } else {
                Err(DevastationError::InvalidConfig(message.to_owned()))
            }
        }

        check(self.speed.is_finite() && self.speed > 0.0, "speed must be positive")?;

        let s = &self.sources;
        check(s.default_range >= 0, "sources.default_range must not be negative")?;
        check(s.initial_radius >= 0, "sources.initial_radius must not be negative")?;
        check(s.default_amount >= 0.0, "sources.default_amount must not be negative")?;
        check(s.max_sources > 0, "sources.max_sources must be at least 1")?;
        check(s.success_window > 0, "sources.success_window must be at least 1")?;
        check(s.attempts_per_conversion > 0, "sources.attempts_per_conversion must be at least 1")?;
        check(s.pillar_search_height >= 0, "sources.pillar_search_height must not be negative")?;
        check(s.jump_max_distance >= 0, "sources.jump_max_distance must not be negative")?;
        check(
            (0.0..=1.0).contains(&s.saturation_threshold),
            "sources.saturation_threshold must be within 0..=1",
        )?;
        check(
            s.very_low_success_threshold <= s.low_success_threshold,
            "sources.very_low_success_threshold must not exceed low_success_threshold",
        )?;

        let c = &self.chunks;
        check(
            c.frontier_prune_target < c.frontier_prune_threshold,
            "chunks.frontier_prune_target must be below frontier_prune_threshold",
        )?;
        check(
            (0.0..=1.0).contains(&c.edge_bleed_chance),
            "chunks.edge_bleed_chance must be within 0..=1",
        )?;
        check(
            (0.0..=1.0).contains(&c.spread_chance),
            "chunks.spread_chance must be within 0..=1",
        )?;
        check(c.surface_scan_depth >= 0, "chunks.surface_scan_depth must not be negative")?;
        check(
            c.max_depth_below_surface.map_or(true, |d| d >= 0),
            "chunks.max_depth_below_surface must not be negative",
        )?;
        check(c.repair_queue_capacity > 0, "chunks.repair_queue_capacity must be at least 1")?;

        let w = &self.wards;
        check(w.protection_radius >= 0, "wards.protection_radius must not be negative")?;
        check(w.heal_rate >= 0.0, "wards.heal_rate must not be negative")?;
        check(w.scan_limit_per_tick > 0, "wards.scan_limit_per_tick must be at least 1")?;

        check(self.regen.delay_seconds >= 0.0, "regen.delay_seconds must not be negative")?;
        check(self.schedule.event_capacity > 0, "schedule.event_capacity must be at least 1")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        DevastationConfig::default().validate().unwrap();
        DevastationConfig::production().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DevastationConfig::from_toml_str(
            r#"
            speed = 2.0
            rng_seed = 7

            [wards]
            mode = "radial"
            protection_radius = 24

            [chunks]
            min_blocks_for_full = 500
            "#,
        )
        .unwrap();

        assert!((config.speed - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.wards.mode, ScanMode::Radial);
        assert_eq!(config.wards.protection_radius, 24);
        assert_eq!(config.chunks.min_blocks_for_full, 500);
        assert_eq!(config.sources, SourceConfig::default());
    }

    #[test]
    fn test_rules_section() {
        let config = DevastationConfig::from_toml_str(
            r#"
            [[rules]]
            prefix = "soil-"
            devastated = "soil-corrupted-0"
            regen = "barren-soil"
            healed = "soil-grass"
            "#,
        )
        .unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].regen.as_deref(), Some("barren-soil"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = DevastationConfig::default();
        config.speed = 0.0;
        assert!(matches!(config.validate(), Err(DevastationError::InvalidConfig(_))));

        let mut config = DevastationConfig::default();
        config.chunks.frontier_prune_target = 600;
        assert!(config.validate().is_err());

        let mut config = DevastationConfig::default();
        config.sources.max_sources = 0;
        assert!(config.validate().is_err());

        let mut config = DevastationConfig::default();
        config.wards.protection_radius = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_a_serialization_error() {
        let err = DevastationConfig::from_toml_str("speed = \"fast\"").unwrap_err();
        assert!(matches!(err, DevastationError::Serialization(_)));
    }
}
