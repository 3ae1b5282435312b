use std::mem;
use std::ptr::{self, NonNull};

use log::{debug, trace};

use crate::collection::ArenaCollection;
use crate::constants::WORD;
use crate::freelist;
use crate::page::{PageHeader, PAGE_HEADER_SIZE};
use crate::source::ChunkSource;

impl<S: ChunkSource> ArenaCollection<S> {
    /// Sweeps the whole collection in one go.
    ///
    /// `is_alive` is called exactly once for every live block, in address
    /// order within each page, and decides whether the block survives.
    /// Blocks it declines become free memory immediately. Pages with no
    /// survivors return to their arena, and arenas with every page free
    /// return to the chunk source.
    ///
    /// Equivalent to [`mass_free_prepare`] followed by a single unbounded
    /// [`mass_free_incremental`] step.
    ///
    /// [`mass_free_prepare`]: ArenaCollection::mass_free_prepare
    /// [`mass_free_incremental`]: ArenaCollection::mass_free_incremental
    pub fn mass_free<F>(&mut self, mut is_alive: F)
    where
        F: FnMut(NonNull<u8>) -> bool,
    {
        self.mass_free_prepare();
        let finished = self.mass_free_incremental(&mut is_alive, usize::MAX);
        assert!(finished, "unbounded sweep did not finish");
    }

    /// Starts a sweep: moves every page chain out of the allocator's sight
    /// so the following [`mass_free_incremental`] steps can work through
    /// them. Panics if a sweep is already in progress.
    ///
    /// Also resets `total_memory_used`; the sweep adds back what survives,
    /// and blocks allocated before the sweep completes count as well.
    ///
    /// [`mass_free_incremental`]: ArenaCollection::mass_free_incremental
    pub fn mass_free_prepare(&mut self) {
        assert!(
            self.sweep_class.is_none(),
            "mass_free_prepare: a sweep is already in progress"
        );

        let mut size_class = self.classes.largest_class();
        self.sweep_class = Some(size_class);
        while size_class >= 1 {
            self.old_page_for_size[size_class] = self.page_for_size[size_class];
            self.old_full_page_for_size[size_class] = self.full_page_for_size[size_class];
            self.page_for_size[size_class] = ptr::null_mut();
            self.full_page_for_size[size_class] = ptr::null_mut();
            size_class -= 1;
        }
        self.total_memory_used = 0;
    }

    /// Runs one bounded step of a sweep started by [`mass_free_prepare`].
    ///
    /// At most `max_pages` pages are swept (a zero budget still sweeps
    /// one). Returns `true` once the sweep is complete: the surviving pages
    /// are back on their chains and empty arenas went back to the source.
    /// Until then the collection stays usable between steps; blocks that
    /// [`alloc`] hands out mid sweep are not visited by the remaining
    /// steps. Calling this with no sweep in progress just returns `true`.
    ///
    /// The callback may be a different closure on every step; together the
    /// steps visit each live block exactly once.
    ///
    /// [`mass_free_prepare`]: ArenaCollection::mass_free_prepare
    /// [`alloc`]: ArenaCollection::alloc
    pub fn mass_free_incremental<F>(&mut self, mut is_alive: F, max_pages: usize) -> bool
    where
        F: FnMut(NonNull<u8>) -> bool,
    {
        let Some(mut size_class) = self.sweep_class else {
            return true;
        };

        let mut budget = max_pages;
        while size_class >= 1 {
            budget = self.mass_free_in_pages(size_class, &mut is_alive, budget);
            if budget == 0 {
                self.sweep_class = Some(size_class);
                return false;
            }
            size_class -= 1;
        }

        self.sweep_class = None;
        self.rehash_arenas_lists();
        self.sweeps += 1;
        debug!(
            "sweep done: {} bytes survive in {} arenas",
            self.total_memory_used, self.arena_count
        );
        true
    }

    /// Sweeps pages of one size class until the class or the budget is
    /// used up. Returns the remaining budget, 0 meaning the class still
    /// has unswept pages parked for the next step.
    fn mass_free_in_pages<F>(&mut self, size_class: usize, is_alive: &mut F, mut budget: usize) -> usize
    where
        F: FnMut(NonNull<u8>) -> bool,
    {
        let nblocks = self.classes.blocks_per_page(size_class);
        let block_size = size_class * WORD;

        // survivors accumulate onto whatever the chains already hold:
        // pages swept by an earlier step and pages allocated in between
        let mut remaining_partial = self.page_for_size[size_class];
        let mut remaining_full = self.full_page_for_size[size_class];
        let mut parked = false;

        // the old full chain first, then the old partial one
        'steps: for step in 0..2 {
            let mut page = if step == 0 {
                mem::replace(&mut self.old_full_page_for_size[size_class], ptr::null_mut())
            } else {
                mem::replace(&mut self.old_page_for_size[size_class], ptr::null_mut())
            };

            while !page.is_null() {
                let surviving = unsafe { self.walk_page(page, block_size, is_alive) };
                let nextpage = unsafe { (*page).next };

                if surviving == nblocks {
                    debug_assert!(step == 0, "page from the partial chain had every block live");
                    unsafe {
                        (*page).next = remaining_full;
                    }
                    remaining_full = page;
                } else if surviving > 0 {
                    unsafe {
                        (*page).next = remaining_partial;
                    }
                    remaining_partial = page;
                } else {
                    unsafe { self.free_page(page) };
                }

                budget = budget.saturating_sub(1);
                if budget == 0 {
                    // out of budget: park the unwalked tail for the next step
                    if step == 0 {
                        self.old_full_page_for_size[size_class] = nextpage;
                    } else {
                        self.old_page_for_size[size_class] = nextpage;
                    }
                    parked = true;
                    break 'steps;
                }
                page = nextpage;
            }
        }

        self.page_for_size[size_class] = remaining_partial;
        self.full_page_for_size[size_class] = remaining_full;
        if parked {
            0
        } else {
            budget
        }
    }

    /// Walks every block of one page in address order, keeps the ones the
    /// callback approves and splices the rest into the page's free list.
    /// Returns how many blocks survive.
    ///
    /// # Safety
    ///
    /// `page` must be a live page of this collection holding blocks of
    /// exactly `block_size` bytes, currently unchained.
    unsafe fn walk_page<F>(&mut self, page: *mut PageHeader, block_size: usize, is_alive: &mut F) -> usize
    where
        F: FnMut(NonNull<u8>) -> bool,
    {
        // the boundary where the uninitialized part of the page begins;
        // this local stays put while the page's own freeblock field gets
        // respliced through prev_cell
        let mut freeblock = (*page).freeblock;
        let mut prev_cell = ptr::addr_of_mut!((*page).freeblock) as *mut u8;
        let mut skip_free = (*page).nfree;
        let mut obj = (page as *mut u8).add(PAGE_HEADER_SIZE);
        let mut surviving = 0;

        loop {
            if obj == freeblock {
                if skip_free == 0 {
                    // start of the uninitialized part, nothing lives beyond
                    break;
                }
                // already free, step over it along the old chain
                skip_free -= 1;
                prev_cell = obj;
                freeblock = freelist::load_link(obj);
            } else {
                // a block below the next free one, so it holds an object
                assert!(freeblock > obj, "free blocks chained out of address order");
                if is_alive(NonNull::new_unchecked(obj)) {
                    surviving += 1;
                } else {
                    // dead: splice it in right here, which keeps the free
                    // list sorted by address
                    self.source.mark_free(NonNull::new_unchecked(obj), block_size);
                    freelist::store_link(prev_cell, obj);
                    prev_cell = obj;
                    freelist::store_link(obj, freeblock);
                    (*page).nfree += 1;
                }
            }
            obj = obj.add(block_size);
        }

        self.total_memory_used += surviving * block_size;
        surviving
    }

    /// Hands a page with no survivors back to its arena.
    ///
    /// # Safety
    ///
    /// Every block in the page must already be free, and nothing may keep
    /// pointing into the page afterwards.
    unsafe fn free_page(&mut self, page: *mut PageHeader) {
        let arena = (*page).arena;
        (*arena).nfreepages += 1;

        let pageaddr = page as *mut u8;
        self.source
            .mark_free(NonNull::new_unchecked(pageaddr), self.page_size);
        freelist::store_link(pageaddr, (*arena).freepages);
        (*arena).freepages = pageaddr;
        trace!("freed page {:p}", page);
    }
}
