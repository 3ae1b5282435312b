use crate::constants::WORD;
use crate::page::PAGE_HEADER_SIZE;

/// Geometry of an [`crate::ArenaCollection`], fixed at construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// The number of bytes requested from the chunk source per arena.
    /// Up to one page of it can be lost to alignment at the front.
    pub arena_size: usize,
    /// The number of bytes in a page. Must be a multiple of the word size
    /// and large enough to hold a page header plus one block of the
    /// largest size class.
    pub page_size: usize,
    /// The largest request `alloc` accepts, in bytes. Must be a nonzero
    /// multiple of the word size. There is one size class per word
    /// multiple up to this limit.
    pub small_request_threshold: usize,
}

pub const ARENA_CONFIG_DEFAULT_ARENA_SIZE: usize = 65536 * WORD;
pub const ARENA_CONFIG_DEFAULT_PAGE_SIZE: usize = 4096;
pub const ARENA_CONFIG_DEFAULT_SMALL_REQUEST_THRESHOLD: usize = 256 - WORD;

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            arena_size: ARENA_CONFIG_DEFAULT_ARENA_SIZE,
            page_size: ARENA_CONFIG_DEFAULT_PAGE_SIZE,
            small_request_threshold: ARENA_CONFIG_DEFAULT_SMALL_REQUEST_THRESHOLD,
        }
    }
}

impl ArenaConfig {
    pub(crate) fn validate(&self) {
        assert!(
            self.page_size % WORD == 0,
            "page_size must be a multiple of the word size"
        );
        assert!(
            self.small_request_threshold >= WORD
                && self.small_request_threshold % WORD == 0,
            "small_request_threshold must be a nonzero multiple of the word size"
        );
        assert!(
            self.page_size >= PAGE_HEADER_SIZE + self.small_request_threshold,
            "page_size too small: a page must fit its header plus one block of every size class"
        );
        // alignment of the first page can waste almost a full page at the
        // front of the chunk, so demand room for at least one more
        assert!(
            self.arena_size >= 2 * self.page_size,
            "arena_size must be at least two pages"
        );
    }

    /// An upper bound on the number of pages an arena can hold. Arenas whose
    /// chunk happens to come back page aligned reach it exactly.
    pub(crate) fn max_pages_per_arena(&self) -> usize {
        self.arena_size / self.page_size
    }
}
