use std::mem::size_of;

use crate::arena::Arena;
use crate::constants::WORD;

/// The header written at the start of every initialized page.
///
/// A page is a `page_size` aligned slice of an arena chunk. Its header is
/// followed by equal sized blocks of a single size class, so a page never
/// mixes sizes. Everything after the last block that could fit stays unused.
///
/// `freeblock` is the head of the page's intrusive free list, chained
/// through [`crate::freelist`] links in strictly increasing address order.
/// Exactly `nfree` links can be followed; the address reached after the last
/// one is the boundary where the never yet allocated part of the page
/// begins. A fresh page has `nfree == 0` and `freeblock` right after the
/// header, so the whole body is "never yet allocated" and gets carved off by
/// bumping `freeblock`.
#[repr(C)]
pub(crate) struct PageHeader {
    /// Next page in the same chain (per size class partial or full chain
    /// while live, a sweep's unprocessed tail while being swept).
    pub(crate) next: *mut PageHeader,
    /// The arena this page belongs to. The arena outlives the page, but the
    /// page does not own it.
    pub(crate) arena: *mut Arena,
    /// Number of free blocks chained behind `freeblock`.
    pub(crate) nfree: usize,
    /// First free block, or the start of the uninitialized tail when
    /// `nfree` is zero.
    pub(crate) freeblock: *mut u8,
}

/// Bytes taken by [`PageHeader`] at the front of each page. Four words.
pub(crate) const PAGE_HEADER_SIZE: usize = size_of::<PageHeader>();

// blocks start right after the header, so it has to keep them word aligned
const _: () = assert!(PAGE_HEADER_SIZE % WORD == 0);
