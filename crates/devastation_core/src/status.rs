//! # Status Snapshots
//!
//! Read-only views for hosts, UIs and operators. Every snapshot is plain
//! data and serializes to JSON.

use devastation_world::{BlockPos, ChunkCoord};
use serde::Serialize;

use crate::chunk::{ChunkFrontierEngine, DevastatedChunk};
use crate::config::ScanMode;
use crate::source::{DevastationSource, SourceGrowthEngine};
use crate::ward::{RiftWard, RiftWardEngine};

/// One source.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceStatus {
    /// Source id.
    pub id: u64,
    /// Anchor position.
    pub pos: BlockPos,
    /// Target radius.
    pub range: i32,
    /// Radius currently sampled.
    pub current_radius: i32,
    /// Metastasis depth.
    pub generation: u32,
    /// Parent source.
    pub parent: Option<u64>,
    /// Heals instead of devastating.
    pub healing: bool,
    /// Stopped growing.
    pub saturated: bool,
    /// Never removed automatically.
    pub protected: bool,
    /// Blocks devastated over the source's life.
    pub blocks_devastated: u64,
    /// Children spawned.
    pub children: u32,
    /// Success rate of the current window.
    pub success_rate: f64,
}

impl From<&DevastationSource> for SourceStatus {
    fn from(source: &DevastationSource) -> Self {
        Self {
            id: source.id,
            pos: source.pos,
            range: source.range,
            current_radius: source.current_radius,
            generation: source.generation_level,
            parent: source.parent_id,
            healing: source.is_healing,
            saturated: source.is_saturated,
            protected: source.is_protected,
            blocks_devastated: source.blocks_devastated_total,
            children: source.children_spawned,
            success_rate: source.success_rate(),
        }
    }
}

/// One tracked chunk.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChunkStatus {
    /// Column coordinate.
    pub coord: ChunkCoord,
    /// Converted blocks relative to the full-devastation threshold.
    pub devastation_level: f64,
    /// Blocks converted inside the column.
    pub blocks_devastated: u64,
    /// Blocks converted across the edge.
    pub bleed_blocks: u64,
    /// Frontier size.
    pub frontier: usize,
    /// Terminal: fully devastated.
    pub fully_devastated: bool,
    /// Terminal: repair gave up.
    pub unrepairable: bool,
    /// Empty frontier with too few blocks.
    pub stuck: bool,
    /// Repairs that found nothing.
    pub repair_attempts: u32,
}

impl ChunkStatus {
    /// Status of `chunk` against the full-devastation threshold.
    #[must_use]
    pub fn of(chunk: &DevastatedChunk, min_blocks_for_full: u64) -> Self {
        Self {
            coord: chunk.coord,
            devastation_level: chunk.devastation_level(min_blocks_for_full),
            blocks_devastated: chunk.blocks_devastated,
            bleed_blocks: chunk.bleed_blocks,
            frontier: chunk.frontier.len(),
            fully_devastated: chunk.is_fully_devastated,
            unrepairable: chunk.is_unrepairable,
            stuck: chunk.is_stuck(),
            repair_attempts: chunk.repair_attempts,
        }
    }
}

/// One ward.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WardStatus {
    /// Structure position.
    pub pos: BlockPos,
    /// On and fuelled.
    pub active: bool,
    /// Healing mode in effect.
    pub mode: ScanMode,
    /// Radius currently being cleaned.
    pub current_clean_radius: i32,
    /// Largest radius fully cleaned.
    pub max_clean_radius_reached: i32,
    /// A raster pass has finished.
    pub raster_scan_complete: bool,
    /// Blocks healed since the last progress reset.
    pub blocks_healed: u64,
}

impl WardStatus {
    /// Status of `ward` under `mode`.
    #[must_use]
    pub fn of(ward: &RiftWard, mode: ScanMode) -> Self {
        Self {
            pos: ward.pos,
            active: ward.active,
            mode,
            current_clean_radius: ward.progress.current_clean_radius,
            max_clean_radius_reached: ward.progress.max_clean_radius_reached,
            raster_scan_complete: ward.progress.raster_scan_complete,
            blocks_healed: ward.progress.blocks_healed,
        }
    }
}

/// Counts across the whole simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStatus {
    /// Sources.
    pub sources: usize,
    /// Saturated sources.
    pub saturated_sources: usize,
    /// Operator-placed sources.
    pub protected_sources: usize,
    /// Healing sources.
    pub healing_sources: usize,
    /// Tracked chunks.
    pub chunks: usize,
    /// Fully devastated chunks.
    pub fully_devastated_chunks: usize,
    /// Unrepairable chunks.
    pub unrepairable_chunks: usize,
    /// Stuck chunks.
    pub stuck_chunks: usize,
    /// Known wards.
    pub wards: usize,
    /// Active wards.
    pub active_wards: usize,
    /// Blocks waiting to settle.
    pub pending_regen: usize,
    /// Events dropped on a full channel.
    pub events_dropped: u64,
}

impl AggregateStatus {
    /// Counts every engine.
    #[must_use]
    pub fn collect(
        sources: &SourceGrowthEngine,
        chunks: &ChunkFrontierEngine,
        wards: &RiftWardEngine,
        pending_regen: usize,
        events_dropped: u64,
    ) -> Self {
        let all = sources.sources();
        Self {
            sources: all.len(),
            saturated_sources: all.iter().filter(|s| s.is_saturated).count(),
            protected_sources: all.iter().filter(|s| s.is_protected).count(),
            healing_sources: all.iter().filter(|s| s.is_healing).count(),
            chunks: chunks.len(),
            fully_devastated_chunks: chunks.iter().filter(|c| c.is_fully_devastated).count(),
            unrepairable_chunks: chunks.iter().filter(|c| c.is_unrepairable).count(),
            stuck_chunks: chunks.iter().filter(|c| c.is_stuck()).count(),
            wards: wards.len(),
            active_wards: wards.active_count(),
            pending_regen,
            events_dropped,
        }
    }
}
