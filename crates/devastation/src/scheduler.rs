//! # Simulation Loop
//!
//! Runs each engine at its own fixed interval against one real-time clock:
//!
//! ```text
//! elapsed ─┬─> sources  every schedule.source_interval_ms
//!          ├─> chunks   every schedule.chunk_interval_ms
//!          ├─> wards    every schedule.ward_interval_ms   (dt = interval)
//!          └─> regen    every schedule.regen_interval_ms
//! ```
//!
//! A stalled host catches up at most `max_catch_up_steps` steps per engine
//! per advance; anything beyond that is dropped rather than replayed.

use std::time::{Duration, Instant};

use devastation_core::WardHost;
use devastation_world::VoxelGrid;
use tracing::{debug, info, warn};

use crate::simulation::Simulation;

/// Wall time one advance may take before it counts as over budget.
pub const ADVANCE_BUDGET: Duration = Duration::from_millis(5);

/// Advances slower than this are logged.
pub const SLOW_ADVANCE: Duration = Duration::from_millis(50);

/// Timing and work done by one advance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Advance number.
    pub tick: u64,
    /// Wall time of the whole advance (microseconds).
    pub total_us: u64,
    /// Wall time spent in source steps (microseconds).
    pub source_us: u64,
    /// Wall time spent in chunk steps (microseconds).
    pub chunk_us: u64,
    /// Wall time spent in ward steps (microseconds).
    pub ward_us: u64,
    /// Wall time spent in regeneration steps (microseconds).
    pub regen_us: u64,
    /// Source steps run.
    pub source_steps: u32,
    /// Chunk steps run.
    pub chunk_steps: u32,
    /// Ward steps run.
    pub ward_steps: u32,
    /// Regeneration steps run.
    pub regen_steps: u32,
    /// Blocks devastated by sources, frontiers and bleed.
    pub blocks_converted: u64,
    /// Blocks healed by healing sources and wards.
    pub blocks_healed: u64,
    /// Blocks settled into their regenerated form.
    pub blocks_regenerated: u64,
}

/// Pending time for one engine.
#[derive(Clone, Copy, Debug, Default)]
struct Cadence {
    pending: Duration,
}

impl Cadence {
    /// Adds `elapsed` and returns how many steps are due, discarding any
    /// backlog beyond `max_steps`.
    fn due(&mut self, elapsed: Duration, interval: Duration, max_steps: u32, name: &str) -> u32 {
        self.pending = self.pending.saturating_add(elapsed);
        let mut steps = 0;
        while self.pending >= interval && steps < max_steps {
            self.pending -= interval;
            steps += 1;
        }
        if self.pending >= interval {
            debug!(engine = name, backlog_ms = self.pending.as_millis() as u64, "dropping backlog");
            self.pending = Duration::ZERO;
        }
        steps
    }
}

fn interval(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

fn micros(since: Instant) -> u64 {
    since.elapsed().as_micros() as u64
}

/// Fixed-interval driver for a [`Simulation`].
#[derive(Debug, Default)]
pub struct SimulationLoop {
    sources: Cadence,
    chunks: Cadence,
    wards: Cadence,
    regen: Cadence,
    last_real: Option<Duration>,
    tick: u64,
    stats: TickStatsAccumulator,
}

impl SimulationLoop {
    /// Creates a loop with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the simulation's clock and advances by the real time passed
    /// since the previous call. The first call only anchors the clock.
    pub fn update<G: VoxelGrid, H: WardHost>(&mut self, sim: &mut Simulation<G, H>) -> TickStats {
        let now = sim.clock().real_elapsed();
        let elapsed = self
            .last_real
            .map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_real = Some(now);
        self.advance(sim, elapsed)
    }

    /// Runs every engine step that `elapsed` makes due.
    pub fn advance<G: VoxelGrid, H: WardHost>(
        &mut self,
        sim: &mut Simulation<G, H>,
        elapsed: Duration,
    ) -> TickStats {
        let start = Instant::now();
        let schedule = sim.config().schedule.clone();
        let max_steps = schedule.max_catch_up_steps.max(1);
        self.tick += 1;
        let mut stats = TickStats {
            tick: self.tick,
            ..TickStats::default()
        };

        let phase = Instant::now();
        stats.source_steps = self.sources.due(
            elapsed,
            interval(schedule.source_interval_ms),
            max_steps,
            "sources",
        );
        for _ in 0..stats.source_steps {
            let report = sim.tick_sources();
            stats.blocks_converted += report.blocks_converted;
            stats.blocks_healed += report.blocks_healed;
        }
        stats.source_us = micros(phase);

        let phase = Instant::now();
        stats.chunk_steps = self.chunks.due(
            elapsed,
            interval(schedule.chunk_interval_ms),
            max_steps,
            "chunks",
        );
        for _ in 0..stats.chunk_steps {
            let report = sim.tick_chunks();
            stats.blocks_converted += report.blocks_converted + report.bleed_converted;
        }
        stats.chunk_us = micros(phase);

        let phase = Instant::now();
        let ward_interval = interval(schedule.ward_interval_ms);
        stats.ward_steps = self.wards.due(elapsed, ward_interval, max_steps, "wards");
        for _ in 0..stats.ward_steps {
            let report = sim.tick_wards(ward_interval.as_secs_f64());
            stats.blocks_healed += report.blocks_healed;
        }
        stats.ward_us = micros(phase);

        let phase = Instant::now();
        stats.regen_steps = self.regen.due(
            elapsed,
            interval(schedule.regen_interval_ms),
            max_steps,
            "regen",
        );
        for _ in 0..stats.regen_steps {
            let report = sim.tick_regeneration();
            stats.blocks_regenerated += report.regenerated as u64;
        }
        stats.regen_us = micros(phase);

        stats.total_us = micros(start);
        if stats.total_us > SLOW_ADVANCE.as_micros() as u64 {
            warn!(
                tick = stats.tick,
                total_ms = stats.total_us as f64 / 1000.0,
                "slow advance"
            );
        }
        self.stats.record(stats);
        stats
    }

    /// Advances run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &TickStatsAccumulator {
        &self.stats
    }

    /// Clears accumulated statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStatsAccumulator::new();
    }
}

/// Accumulates statistics across advances.
#[derive(Clone, Debug)]
pub struct TickStatsAccumulator {
    /// Advances recorded.
    pub ticks_recorded: u64,
    /// Sum of total advance times.
    pub total_us_sum: u64,
    /// Sum of source step times.
    pub source_us_sum: u64,
    /// Sum of chunk step times.
    pub chunk_us_sum: u64,
    /// Sum of ward step times.
    pub ward_us_sum: u64,
    /// Sum of regeneration step times.
    pub regen_us_sum: u64,
    /// Fastest advance.
    pub min_tick_us: u64,
    /// Slowest advance.
    pub max_tick_us: u64,
    /// Advances that exceeded [`ADVANCE_BUDGET`].
    pub ticks_over_budget: u64,
    /// Blocks devastated.
    pub blocks_converted: u64,
    /// Blocks healed.
    pub blocks_healed: u64,
    /// Blocks regenerated.
    pub blocks_regenerated: u64,
}

impl TickStatsAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticks_recorded: 0,
            total_us_sum: 0,
            source_us_sum: 0,
            chunk_us_sum: 0,
            ward_us_sum: 0,
            regen_us_sum: 0,
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            ticks_over_budget: 0,
            blocks_converted: 0,
            blocks_healed: 0,
            blocks_regenerated: 0,
        }
    }

    /// Records one advance.
    pub fn record(&mut self, stats: TickStats) {
        self.ticks_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.source_us_sum += stats.source_us;
        self.chunk_us_sum += stats.chunk_us;
        self.ward_us_sum += stats.ward_us;
        self.regen_us_sum += stats.regen_us;
        self.min_tick_us = self.min_tick_us.min(stats.total_us);
        self.max_tick_us = self.max_tick_us.max(stats.total_us);
        self.blocks_converted += stats.blocks_converted;
        self.blocks_healed += stats.blocks_healed;
        self.blocks_regenerated += stats.blocks_regenerated;

        if stats.total_us > ADVANCE_BUDGET.as_micros() as u64 {
            self.ticks_over_budget += 1;
        }
    }

    /// Average advance time in milliseconds.
    #[must_use]
    pub fn avg_tick_ms(&self) -> f64 {
        self.avg_ms(self.total_us_sum)
    }

    /// Share of advances over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        self.ticks_over_budget as f64 / self.ticks_recorded as f64
    }

    fn avg_ms(&self, sum_us: u64) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        (sum_us as f64 / self.ticks_recorded as f64) / 1000.0
    }

    /// Logs a summary at info level.
    pub fn log_summary(&self) {
        if self.ticks_recorded == 0 {
            info!("no advances recorded");
            return;
        }
        info!(
            ticks = self.ticks_recorded,
            avg_ms = self.avg_tick_ms(),
            min_ms = self.min_tick_us as f64 / 1000.0,
            max_ms = self.max_tick_us as f64 / 1000.0,
            over_budget_pct = self.over_budget_ratio() * 100.0,
            "advance timing"
        );
        info!(
            sources_ms = self.avg_ms(self.source_us_sum),
            chunks_ms = self.avg_ms(self.chunk_us_sum),
            wards_ms = self.avg_ms(self.ward_us_sum),
            regen_ms = self.avg_ms(self.regen_us_sum),
            "average breakdown"
        );
        info!(
            converted = self.blocks_converted,
            healed = self.blocks_healed,
            regenerated = self.blocks_regenerated,
            "blocks"
        );
    }
}

impl Default for TickStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
