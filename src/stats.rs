/// A snapshot of what an [`crate::ArenaCollection`] currently holds.
///
/// Obtained by calling [`crate::ArenaCollection::stats`]. All values are
/// taken at the same instant, so they are consistent with each other.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MemoryStats {
    /// Bytes handed out and not yet reclaimed. Block sizes only, the
    /// page headers and unusable page tails are not counted.
    pub total_memory_used: usize,

    /// The largest value `total_memory_used` ever reached.
    pub peak_memory_used: usize,

    /// Number of arenas currently held, counting exhausted ones that still
    /// have live blocks inside.
    pub arena_count: usize,

    /// Number of chunks ever requested from the chunk source.
    pub arenas_allocated: u64,

    /// Number of chunks handed back to the chunk source.
    pub arenas_released: u64,

    /// Number of completed collection passes.
    pub sweeps: u64,
}
