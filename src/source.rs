use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::constants::WORD;
use crate::error::ChunkError;

/// Where arena chunks come from.
///
/// An [`crate::ArenaCollection`] asks its source for one large chunk at a
/// time and hands it back only when every page inside became free again (or
/// when the collection is dropped). Chunks are raw memory: the source must
/// return at least word aligned storage and must not touch it until it is
/// freed.
///
/// The two `mark_*` hooks are observation points for debugging and tests.
/// They fire when individual blocks and page headers inside a chunk are
/// handed out or reclaimed. The default implementations do nothing, so a
/// production source only has to supply the two chunk calls.
pub trait ChunkSource {
    /// Allocates a chunk of exactly `size` bytes, word aligned.
    fn allocate_chunk(&mut self, size: usize) -> Result<NonNull<u8>, ChunkError>;

    /// Frees a chunk previously returned by `allocate_chunk`. `size` is the
    /// same value that was passed when allocating it.
    fn free_chunk(&mut self, base: NonNull<u8>, size: usize);

    /// A range inside a live chunk is about to be handed out.
    fn mark_reserved(&mut self, _addr: NonNull<u8>, _size: usize) {}

    /// A range inside a live chunk was reclaimed and may be handed out again.
    fn mark_free(&mut self, _addr: NonNull<u8>, _size: usize) {}
}

/// The default source: chunks come straight from the global allocator.
pub struct SysSource;

fn chunk_layout(size: usize) -> Layout {
    Layout::from_size_align(size, WORD).unwrap()
}

impl ChunkSource for SysSource {
    fn allocate_chunk(&mut self, size: usize) -> Result<NonNull<u8>, ChunkError> {
        debug_assert!(size > 0);

        let ptr = unsafe { alloc::alloc(chunk_layout(size)) };

        NonNull::new(ptr).ok_or(ChunkError::Exhausted)
    }

    fn free_chunk(&mut self, base: NonNull<u8>, size: usize) {
        unsafe { alloc::dealloc(base.as_ptr(), chunk_layout(size)) }
    }
}
