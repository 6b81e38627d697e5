//! Population control under the source cap.

use super::DevastationSource;

/// Index of the source to evict first, skipping protected and healing
/// sources and any id `exclude` rejects.
///
/// Eviction order: saturated first, then deeper generations, then sources
/// that have devastated more.
pub(super) fn eviction_candidate(
    sources: &[DevastationSource],
    exclude: impl Fn(u64) -> bool,
) -> Option<usize> {
    sources
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_protected && !s.is_healing && !exclude(s.id))
        .max_by_key(|(_, s)| (s.is_saturated, s.generation_level, s.blocks_devastated_total))
        .map(|(index, _)| index)
}
