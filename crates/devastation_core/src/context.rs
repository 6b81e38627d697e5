//! # Tick Context
//!
//! Everything one engine step borrows: the grid, the oracle, protection,
//! the shared random source, the event sender, the regeneration tracker and
//! the config snapshot. The conversion and healing helpers here are the only
//! places blocks are devastated or healed.

use devastation_world::{BlockPos, VoxelGrid};
use tracing::trace;

use crate::config::DevastationConfig;
use crate::error::DevastationResult;
use crate::events::{DevastationEvent, EventSender};
use crate::oracle::BlockOracle;
use crate::protection::ProtectionQuery;
use crate::regen::{RegenEntry, RegenerationTracker};
use crate::rng::SimRng;

/// Borrowed state for one engine step.
pub struct TickContext<'a> {
    /// Host grid.
    pub grid: &'a mut dyn VoxelGrid,
    /// Block classification.
    pub oracle: &'a BlockOracle,
    /// Ward protection.
    pub protection: &'a dyn ProtectionQuery,
    /// Shared random source.
    pub rng: &'a mut SimRng,
    /// Event output.
    pub events: &'a EventSender,
    /// Blocks waiting to settle.
    pub regen: &'a mut RegenerationTracker,
    /// Config snapshot.
    pub config: &'a DevastationConfig,
    /// Monotonic simulated seconds.
    pub now: f64,
}

impl TickContext<'_> {
    /// Devastates the block at `pos` if it is convertible, above the minimum
    /// height and unprotected.
    ///
    /// Returns `Ok(false)` for rejected candidates.
    ///
    /// # Errors
    ///
    /// Propagates grid faults.
    pub fn try_convert(&mut self, pos: BlockPos) -> DevastationResult<bool> {
        if pos.y < self.config.min_y_level {
            return Ok(false);
        }
        let original = self.grid.get(pos)?;
        let Some(conversion) = self.oracle.classify(original) else {
            return Ok(false);
        };
        if self.protection.is_protected(pos) {
            return Ok(false);
        }

        self.grid.set(pos, conversion.devastated)?;
        trace!(%pos, "block converted");
        self.events
            .send(DevastationEvent::BlockConverted { pos, original });

        match conversion.regen_target {
            Some(target) if self.config.regen.enabled => self.regen.track(RegenEntry {
                pos,
                devastated: conversion.devastated,
                target,
                due: self.now + self.config.regen.delay_seconds,
            }),
            _ => {
                self.regen.forget(pos);
            }
        }
        Ok(true)
    }

    /// Heals the block at `pos` if it is devastated. Healing anything else
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates grid faults.
    pub fn try_heal(&mut self, pos: BlockPos) -> DevastationResult<bool> {
        let block = self.grid.get(pos)?;
        let Some(healed) = self.oracle.healed_form(block) else {
            return Ok(false);
        };
        self.grid.set(pos, healed)?;
        self.regen.forget(pos);
        trace!(%pos, "block healed");
        self.events.send(DevastationEvent::BlockHealed { pos });
        Ok(true)
    }

    /// Returns true if the block at `pos` is devastated. Faults read as
    /// not devastated.
    #[must_use]
    pub fn is_devastated_at(&self, pos: BlockPos) -> bool {
        self.oracle.is_devastated(self.grid.get_or_air(pos))
    }

    /// Returns true if the block at `pos` could be converted right now.
    #[must_use]
    pub fn is_convertible_at(&self, pos: BlockPos) -> bool {
        pos.y >= self.config.min_y_level
            && self.oracle.is_convertible(self.grid.get_or_air(pos))
            && !self.protection.is_protected(pos)
    }

    /// Global speed multiplier.
    #[inline]
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.config.effective_speed()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use crate::events::DevastationEvent;
    use devastation_world::{names, BlockPos, ChunkCoord, VoxelGrid};

    struct Everything;

    impl crate::protection::ProtectionQuery for Everything {
        fn is_protected(&self, _pos: BlockPos) -> bool {
            true
        }
        fn is_chunk_protected(&self, _chunk: ChunkCoord) -> bool {
            true
        }
    }

    #[test]
    fn test_convert_then_heal() {
        let mut h = Harness::soil();
        let pos = BlockPos::new(3, 64, 3);

        assert!(h.ctx().try_convert(pos).unwrap());
        assert_eq!(h.world.get(pos), Ok(h.id(names::SOIL_CORRUPTED)));
        assert!(h.regen.is_tracked(pos));
        assert!(!h.ctx().try_convert(pos).unwrap());

        assert!(h.ctx().try_heal(pos).unwrap());
        assert_eq!(h.world.get(pos), Ok(h.id(names::SOIL_GRASS)));
        assert!(!h.regen.is_tracked(pos));

        let events = h.receiver.drain();
        assert!(matches!(events[0], DevastationEvent::BlockConverted { .. }));
        assert!(matches!(events[1], DevastationEvent::BlockHealed { .. }));
    }

    #[test]
    fn test_healing_is_idempotent() {
        let mut h = Harness::soil();
        let pos = BlockPos::new(1, 64, 1);
        let before = h.world.get(pos);
        assert!(!h.ctx().try_heal(pos).unwrap());
        assert!(!h.ctx().try_heal(BlockPos::new(1, 100, 1)).unwrap());
        assert_eq!(h.world.get(pos), before);
        assert!(h.receiver.drain().is_empty());
    }

    #[test]
    fn test_rejected_candidates() {
        let mut h = Harness::soil();
        assert!(!h.ctx().try_convert(BlockPos::new(0, 70, 0)).unwrap());
        assert!(!h.ctx_with(&Everything).try_convert(BlockPos::new(0, 64, 0)).unwrap());

        h.config.min_y_level = 60;
        assert!(!h.ctx().try_convert(BlockPos::new(0, 59, 0)).unwrap());
        assert!(h.ctx().try_convert(BlockPos::new(0, 60, 0)).unwrap());
    }

    #[test]
    fn test_unloaded_positions_are_rejected() {
        let mut h = Harness::soil();
        assert!(!h.ctx().try_convert(BlockPos::new(500, 64, 0)).unwrap());
    }
}
