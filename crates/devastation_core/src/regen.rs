//! # Regeneration Tracker
//!
//! Converted blocks whose rule names a settled form are remembered here and
//! rewritten to that form once their simulated due time passes. An entry is
//! dropped without effect when the block no longer holds the devastated form
//! it was tracked with (healed, mined, or replaced by the host).

use std::collections::HashMap;

use devastation_world::{BlockId, BlockPos, VoxelGrid};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::events::{DevastationEvent, EventSender};

/// A block waiting to settle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegenEntry {
    /// World position.
    pub pos: BlockPos,
    /// Devastated form written at conversion.
    pub devastated: BlockId,
    /// Block it settles into.
    pub target: BlockId,
    /// Simulated time at which it settles.
    pub due: f64,
}

/// Outcome of one regeneration step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegenReport {
    /// Blocks rewritten to their settled form.
    pub regenerated: usize,
    /// Entries dropped because the block changed underneath them.
    pub discarded: usize,
}

/// Pending regenerations keyed by position.
#[derive(Clone, Debug, Default)]
pub struct RegenerationTracker {
    pending: HashMap<BlockPos, RegenEntry>,
}

impl RegenerationTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) tracking a converted block.
    pub fn track(&mut self, entry: RegenEntry) {
        self.pending.insert(entry.pos, entry);
    }

    /// Stops tracking a position (it was healed).
    pub fn forget(&mut self, pos: BlockPos) -> bool {
        self.pending.remove(&pos).is_some()
    }

    /// Returns true if a position is waiting to settle.
    #[must_use]
    pub fn is_tracked(&self, pos: BlockPos) -> bool {
        self.pending.contains_key(&pos)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Settles up to `max` due entries.
    pub fn tick(
        &mut self,
        grid: &mut dyn VoxelGrid,
        now: f64,
        max: usize,
        events: &EventSender,
    ) -> RegenReport {
        let mut due: Vec<RegenEntry> = self
            .pending
            .values()
            .filter(|entry| entry.due <= now)
            .copied()
            .collect();
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.pos.cmp(&b.pos)));
        due.truncate(max);

        let mut report = RegenReport::default();
        for entry in due {
            self.pending.remove(&entry.pos);
            match grid.get(entry.pos) {
                Ok(block) if block == entry.devastated => {
                    if let Err(fault) = grid.set(entry.pos, entry.target) {
                        warn!(pos = %entry.pos, %fault, "regeneration write failed");
                        continue;
                    }
                    trace!(pos = %entry.pos, "block regenerated");
                    events.send(DevastationEvent::BlockRegenerated {
                        pos: entry.pos,
                        block: entry.target,
                    });
                    report.regenerated += 1;
                }
                Ok(_) => report.discarded += 1,
                Err(fault) => {
                    warn!(pos = %entry.pos, %fault, "regeneration read failed");
                    report.discarded += 1;
                }
            }
        }
        report
    }

    /// Pending entries, for persistence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RegenEntry> {
        let mut entries: Vec<RegenEntry> = self.pending.values().copied().collect();
        entries.sort_by(|a, b| a.pos.cmp(&b.pos));
        entries
    }

    /// Replaces pending entries with persisted ones.
    pub fn restore(&mut self, entries: Vec<RegenEntry>) {
        self.pending = entries.into_iter().map(|entry| (entry.pos, entry)).collect();
    }
}
