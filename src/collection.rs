use std::ptr::{self, NonNull};

use log::{debug, trace};

use crate::arena::Arena;
use crate::config::ArenaConfig;
use crate::constants::WORD;
use crate::error::AllocError;
use crate::freelist;
use crate::page::{PageHeader, PAGE_HEADER_SIZE};
use crate::size_class::SizeClassTable;
use crate::source::{ChunkSource, SysSource};
use crate::stats::MemoryStats;

/// A small object allocator that a garbage collector sweeps in bulk.
///
/// Memory is organized in three tiers. The collection obtains large chunks
/// ("arenas") from its [`ChunkSource`], cuts them into fixed size pages, and
/// cuts each page into equal sized blocks of a single size class. [`alloc`]
/// hands out blocks; there is no call to free a single block. Instead the
/// collector periodically runs [`mass_free`] with a callback deciding, block
/// by block, what survives. Pages whose blocks all die go back to their
/// arena, and arenas whose pages are all free go back to the source.
///
/// Geometry is fixed up front by [`ArenaConfig`]. Requests above the
/// configured threshold must be served elsewhere; handing one to [`alloc`]
/// is a caller bug and panics.
///
/// [`alloc`]: ArenaCollection::alloc
/// [`mass_free`]: ArenaCollection::mass_free
///
/// # Examples
///
/// ```
/// use quarry::{ArenaCollection, ArenaConfig, WORD};
///
/// let mut blocks = ArenaCollection::new(ArenaConfig::default());
///
/// let a = blocks.alloc(3 * WORD).unwrap();
/// let b = blocks.alloc(3 * WORD).unwrap();
/// assert_ne!(a, b);
/// assert_eq!(blocks.total_memory_used(), 6 * WORD);
/// ```
pub struct ArenaCollection<S: ChunkSource = SysSource> {
    pub(crate) source: S,
    pub(crate) arena_size: usize,
    pub(crate) page_size: usize,
    pub(crate) small_request_threshold: usize,
    pub(crate) classes: SizeClassTable,

    /// Heads of the per size class chains of pages with room left.
    pub(crate) page_for_size: Vec<*mut PageHeader>,
    /// Heads of the per size class chains of full pages.
    pub(crate) full_page_for_size: Vec<*mut PageHeader>,
    /// During a sweep, the not yet swept parts of the two chains above.
    pub(crate) old_page_for_size: Vec<*mut PageHeader>,
    pub(crate) old_full_page_for_size: Vec<*mut PageHeader>,
    /// The size class the next incremental sweep step starts at, or `None`
    /// when no sweep is in progress. Classes are swept downwards.
    pub(crate) sweep_class: Option<usize>,

    /// `arenas_lists[i]` chains arenas that had `i` free pages when last
    /// rehashed. Index 0 collects exhausted arenas. Free pages added by a
    /// sweep leave an arena in a stale bucket until the next rehash.
    pub(crate) arenas_lists: Vec<*mut Arena>,
    /// Scratch buffer the buckets are swapped into while rehashing.
    pub(crate) old_arenas_lists: Vec<*mut Arena>,
    pub(crate) max_pages_per_arena: usize,
    /// Every `arenas_lists[i]` with `0 < i < min_empty_nfreepages` is known
    /// to be empty, so arena picking starts its scan there.
    pub(crate) min_empty_nfreepages: usize,
    /// The arena new pages are carved from. Not on any bucket. Null until
    /// the first allocation and whenever the last one got exhausted.
    pub(crate) current_arena: *mut Arena,
    /// Pages at the end of the current arena that were never handed out.
    /// They are not chained anywhere; the tail of `current_arena.freepages`
    /// reaches the first of them.
    pub(crate) num_uninitialized_pages: usize,

    pub(crate) total_memory_used: usize,
    pub(crate) peak_memory_used: usize,
    pub(crate) arena_count: usize,
    pub(crate) arenas_allocated: u64,
    pub(crate) arenas_released: u64,
    pub(crate) sweeps: u64,
}

impl ArenaCollection<SysSource> {
    /// Creates a collection backed by the global allocator.
    ///
    /// Panics if the config is inconsistent, see [`ArenaConfig`].
    pub fn new(config: ArenaConfig) -> ArenaCollection<SysSource> {
        ArenaCollection::with_source(config, SysSource)
    }
}

impl<S: ChunkSource> ArenaCollection<S> {
    /// Creates a collection that obtains its chunks from `source`.
    pub fn with_source(config: ArenaConfig, source: S) -> ArenaCollection<S> {
        config.validate();

        let length = config.small_request_threshold / WORD + 1;
        let max_pages_per_arena = config.max_pages_per_arena();

        ArenaCollection {
            source,
            arena_size: config.arena_size,
            page_size: config.page_size,
            small_request_threshold: config.small_request_threshold,
            classes: SizeClassTable::new(config.page_size, config.small_request_threshold),
            page_for_size: vec![ptr::null_mut(); length],
            full_page_for_size: vec![ptr::null_mut(); length],
            old_page_for_size: vec![ptr::null_mut(); length],
            old_full_page_for_size: vec![ptr::null_mut(); length],
            sweep_class: None,
            arenas_lists: vec![ptr::null_mut(); max_pages_per_arena],
            old_arenas_lists: vec![ptr::null_mut(); max_pages_per_arena],
            max_pages_per_arena,
            min_empty_nfreepages: max_pages_per_arena,
            current_arena: ptr::null_mut(),
            num_uninitialized_pages: 0,
            total_memory_used: 0,
            peak_memory_used: 0,
            arena_count: 0,
            arenas_allocated: 0,
            arenas_released: 0,
            sweeps: 0,
        }
    }

    /// Hands out one block of exactly `nbytes` bytes.
    ///
    /// `nbytes` must be a nonzero word multiple no larger than the
    /// configured `small_request_threshold`, otherwise this panics. The
    /// block is not zeroed. It stays valid until a [`mass_free`] pass whose
    /// callback declines it, or until the collection is dropped.
    ///
    /// [`mass_free`]: ArenaCollection::mass_free
    pub fn alloc(&mut self, nbytes: usize) -> Result<NonNull<u8>, AllocError> {
        let size_class = self.classes.class_for_size(nbytes);

        let mut page = self.page_for_size[size_class];
        if page.is_null() {
            page = self.allocate_new_page(size_class)?;
            unsafe {
                (*page).next = self.page_for_size[size_class];
            }
            self.page_for_size[size_class] = page;
        }

        unsafe {
            let result = (*page).freeblock;
            let freeblock = if (*page).nfree > 0 {
                // pop the first chained free block
                (*page).nfree -= 1;
                freelist::load_link(result)
            } else {
                // bump into the uninitialized part of the page
                result.add(nbytes)
            };
            (*page).freeblock = freeblock;

            if freeblock as usize - page as usize > self.page_size - nbytes {
                // no room for another block: retire the page to the full
                // chain until a sweep frees something in it
                self.page_for_size[size_class] = (*page).next;
                (*page).next = self.full_page_for_size[size_class];
                self.full_page_for_size[size_class] = page;
            }

            self.total_memory_used += nbytes;
            if self.total_memory_used > self.peak_memory_used {
                self.peak_memory_used = self.total_memory_used;
            }

            let result = NonNull::new_unchecked(result);
            self.source.mark_reserved(result, nbytes);
            Ok(result)
        }
    }

    /// Takes one page from the current arena and initializes its header for
    /// `size_class`. The page is returned unlinked; the caller chains it.
    fn allocate_new_page(&mut self, size_class: usize) -> Result<*mut PageHeader, AllocError> {
        if self.current_arena.is_null() {
            self.allocate_new_arena()?;
        }
        let arena = self.current_arena;

        unsafe {
            let result = (*arena).freepages;
            let freepages = if (*arena).nfreepages > 0 {
                // pop a page that was freed earlier
                (*arena).nfreepages -= 1;
                freelist::load_link(result)
            } else {
                // carve the next page off the uninitialized tail
                assert!(
                    self.num_uninitialized_pages > 0,
                    "fully allocated arena left as the current arena"
                );
                self.num_uninitialized_pages -= 1;
                if self.num_uninitialized_pages > 0 {
                    result.add(self.page_size)
                } else {
                    ptr::null_mut()
                }
            };
            (*arena).freepages = freepages;

            if freepages.is_null() {
                // the arena has nothing left to give until a sweep frees
                // pages in it
                (*arena).next = self.arenas_lists[0];
                self.arenas_lists[0] = arena;
                self.current_arena = ptr::null_mut();
            }

            self.source
                .mark_reserved(NonNull::new_unchecked(result), PAGE_HEADER_SIZE);
            let page = result as *mut PageHeader;
            page.write(PageHeader {
                next: ptr::null_mut(),
                arena,
                nfree: 0,
                freeblock: result.add(PAGE_HEADER_SIZE),
            });
            trace!("carved page {:p} for size class {}", page, size_class);
            Ok(page)
        }
    }

    /// Installs an arena to carve pages from: the bucketed arena with the
    /// fewest free pages if there is one, else a fresh chunk.
    fn allocate_new_arena(&mut self) -> Result<(), AllocError> {
        if self.pick_next_arena() {
            return Ok(());
        }

        // free page counts go stale between sweeps, so the buckets may be
        // hiding a usable arena; rebucket and look again
        self.rehash_arenas_lists();
        if self.pick_next_arena() {
            return Ok(());
        }

        #[cfg(debug_assertions)]
        self.assert_no_free_pages_anywhere();

        let base = self.source.allocate_chunk(self.arena_size)?.as_ptr();

        // the first page starts at the first page boundary inside the chunk
        let skip = match base as usize % self.page_size {
            0 => 0,
            misalignment => self.page_size - misalignment,
        };
        let firstpage = unsafe { base.add(skip) };
        let npages = (self.arena_size - skip) / self.page_size;
        debug_assert!(npages >= 1 && npages <= self.max_pages_per_arena);

        self.current_arena = Arena::boxed(base, firstpage, npages);
        self.num_uninitialized_pages = npages;
        self.arena_count += 1;
        self.arenas_allocated += 1;
        debug!(
            "new arena at {:p}: {} pages of {} bytes, {} bytes lost to alignment",
            base, npages, self.page_size, skip
        );
        Ok(())
    }

    /// Makes the bucketed arena with the fewest free pages current.
    /// `min_empty_nfreepages` caches how far previous scans got; buckets
    /// below it only refill on a rehash, which resets the cache.
    fn pick_next_arena(&mut self) -> bool {
        let mut i = self.min_empty_nfreepages;
        while i < self.max_pages_per_arena {
            let arena = self.arenas_lists[i];
            if !arena.is_null() {
                unsafe {
                    self.arenas_lists[i] = (*arena).next;
                }
                debug_assert!(self.num_uninitialized_pages == 0);
                self.current_arena = arena;
                return true;
            }
            i += 1;
            self.min_empty_nfreepages = i;
        }
        false
    }

    /// Rebuckets every arena by its current number of free pages and
    /// releases the ones whose pages are all free. The current arena, if
    /// any, stays where it is.
    pub(crate) fn rehash_arenas_lists(&mut self) {
        std::mem::swap(&mut self.arenas_lists, &mut self.old_arenas_lists);
        for bucket in self.arenas_lists.iter_mut() {
            *bucket = ptr::null_mut();
        }

        for i in 0..self.max_pages_per_arena {
            let mut arena = self.old_arenas_lists[i];
            self.old_arenas_lists[i] = ptr::null_mut();
            while !arena.is_null() {
                unsafe {
                    let nextarena = (*arena).next;
                    if (*arena).nfreepages == (*arena).totalpages {
                        self.release_arena(arena);
                    } else {
                        let n = (*arena).nfreepages;
                        debug_assert!(n < self.max_pages_per_arena);
                        (*arena).next = self.arenas_lists[n];
                        self.arenas_lists[n] = arena;
                    }
                    arena = nextarena;
                }
            }
        }

        self.min_empty_nfreepages = 1;
    }

    /// Returns the arena's chunk to the source and frees its record.
    fn release_arena(&mut self, arena: *mut Arena) {
        unsafe {
            let base = (*arena).base;
            debug!("releasing arena at {:p} back to the source", base);
            self.source
                .free_chunk(NonNull::new_unchecked(base), self.arena_size);
            Arena::release(arena);
        }
        self.arena_count -= 1;
        self.arenas_released += 1;
    }

    #[cfg(debug_assertions)]
    fn assert_no_free_pages_anywhere(&self) {
        // right after a rehash found nothing to pick, every remaining
        // arena must be exhausted
        for i in 0..self.max_pages_per_arena {
            let mut arena = self.arenas_lists[i];
            while !arena.is_null() {
                unsafe {
                    assert!((*arena).nfreepages == 0);
                    arena = (*arena).next;
                }
            }
        }
    }

    /// Bytes currently handed out, not counting headers or page tails.
    pub fn total_memory_used(&self) -> usize {
        self.total_memory_used
    }

    /// A consistent snapshot of the collection's counters.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_memory_used: self.total_memory_used,
            peak_memory_used: self.peak_memory_used,
            arena_count: self.arena_count,
            arenas_allocated: self.arenas_allocated,
            arenas_released: self.arenas_released,
            sweeps: self.sweeps,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn arena_size(&self) -> usize {
        self.arena_size
    }

    /// The largest request [`alloc`](ArenaCollection::alloc) accepts.
    pub fn small_request_threshold(&self) -> usize {
        self.small_request_threshold
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: ChunkSource> Drop for ArenaCollection<S> {
    fn drop(&mut self) {
        // give every chunk back to the source, live blocks included
        if !self.current_arena.is_null() {
            self.release_arena(self.current_arena);
            self.current_arena = ptr::null_mut();
        }
        for i in 0..self.max_pages_per_arena {
            let mut arena = self.arenas_lists[i];
            self.arenas_lists[i] = ptr::null_mut();
            while !arena.is_null() {
                let nextarena = unsafe { (*arena).next };
                self.release_arena(arena);
                arena = nextarena;
            }
        }
    }
}
