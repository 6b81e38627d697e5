//! # Simulation Events
//!
//! Notifications for particle, sound, statistics and UI layers.
//!
//! ```text
//! ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//! │   Engines   │─────>│   Bounded   │─────>│    Host     │
//! │   (ticks)   │      │   Channel   │      │  consumers  │
//! └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! Sending never blocks a tick: a full channel drops the event and counts
//! the drop. Nothing in the simulation depends on events being consumed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use devastation_world::{BlockId, BlockPos, ChunkCoord};

/// Why a source left the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalReason {
    /// Its anchor block reads as air.
    AnchorLost,
    /// Removed by the operator.
    Manual,
    /// Evicted under the population cap.
    Evicted,
    /// Swept by the periodic saturated-source cleanup.
    Saturated,
}

/// How a chunk came to be tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackCause {
    /// Marked by the operator.
    Manual,
    /// A source converted blocks inside it.
    Source,
    /// Corruption spread across a border from a tracked neighbour.
    Spread,
    /// Restored from persisted state.
    Restored,
}

/// Events emitted by the engines.
#[derive(Clone, Debug, PartialEq)]
pub enum DevastationEvent {
    // =========================================================================
    // Block Events
    // =========================================================================
    /// A block was devastated.
    BlockConverted {
        /// World position.
        pos: BlockPos,
        /// Block that was there before.
        original: BlockId,
    },

    /// A devastated block was healed.
    BlockHealed {
        /// World position.
        pos: BlockPos,
    },

    /// A devastated form settled into its regeneration target.
    BlockRegenerated {
        /// World position.
        pos: BlockPos,
        /// Block written.
        block: BlockId,
    },

    // =========================================================================
    // Source Events
    // =========================================================================
    /// A source was placed or spawned by metastasis.
    SourceSpawned {
        /// Source id.
        id: u64,
        /// Anchor position.
        pos: BlockPos,
        /// Parent source for metastasis children.
        parent: Option<u64>,
        /// Metastasis depth (0 for placed sources).
        generation: u32,
    },

    /// A source was removed.
    SourceRemoved {
        /// Source id.
        id: u64,
        /// Anchor position.
        pos: BlockPos,
        /// Why it was removed.
        reason: RemovalReason,
    },

    // =========================================================================
    // Chunk Events
    // =========================================================================
    /// A chunk started being tracked.
    ChunkTracked {
        /// Chunk coordinate.
        chunk: ChunkCoord,
        /// What marked it.
        cause: TrackCause,
    },

    /// A ward's cleansed radius reached a tracked chunk.
    ChunkCleansed {
        /// Chunk coordinate.
        chunk: ChunkCoord,
        /// Ward that cleansed it.
        ward: BlockPos,
    },

    /// A chunk's frontier emptied after enough conversions.
    ChunkFullyDevastated {
        /// Chunk coordinate.
        chunk: ChunkCoord,
        /// Blocks converted inside the chunk.
        blocks: u64,
    },

    // =========================================================================
    // Ward Events
    // =========================================================================
    /// A ward became active (on and fuelled).
    WardActivated {
        /// Ward position.
        pos: BlockPos,
    },
}

/// Event bus for engine-to-host notifications.
///
/// Pre-allocates a bounded channel to prevent memory growth in the hot path.
pub struct EventBus {
    sender: Sender<DevastationEvent>,
    receiver: Receiver<DevastationEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum events in flight before new ones are dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Creates a receiver handle (clone for multiple consumers).
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Creates a new pair of sender and receiver.
    #[must_use]
    pub fn create_pair(capacity: usize) -> (EventSender, EventReceiver) {
        let bus = Self::new(capacity);
        (bus.sender(), bus.receiver())
    }
}

/// Handle for sending events.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<DevastationEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Sends an event (non-blocking).
    ///
    /// Returns `false` if the event was dropped.
    #[inline]
    pub fn send(&self, event: DevastationEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Events dropped so far by every sender of this bus.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle for receiving events.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<DevastationEvent>,
}

impl EventReceiver {
    /// Receives all pending events (non-blocking).
    #[inline]
    pub fn drain(&self) -> Vec<DevastationEvent> {
        let mut events = Vec::with_capacity(64);
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Receives one event (non-blocking).
    #[inline]
    pub fn try_recv(&self) -> Option<DevastationEvent> {
        self.receiver.try_recv().ok()
    }

    /// Returns the number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Checks if there are pending events.
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_roundtrip() {
        let (sender, receiver) = EventBus::create_pair(16);
        assert!(sender.send(DevastationEvent::BlockHealed {
            pos: BlockPos::new(1, 2, 3)
        }));
        assert!(receiver.has_events());
        assert_eq!(
            receiver.try_recv(),
            Some(DevastationEvent::BlockHealed {
                pos: BlockPos::new(1, 2, 3)
            })
        );
        assert!(!receiver.has_events());
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (sender, receiver) = EventBus::create_pair(2);
        for i in 0..5 {
            sender.send(DevastationEvent::WardActivated {
                pos: BlockPos::new(i, 0, 0),
            });
        }
        assert_eq!(receiver.pending_count(), 2);
        assert_eq!(sender.dropped_count(), 3);
        assert_eq!(receiver.drain().len(), 2);
    }
}
