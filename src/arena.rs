use std::ptr;

/// Bookkeeping for one chunk obtained from the chunk source.
///
/// The record lives outside the chunk it describes, so it stays valid while
/// the chunk's pages are carved up, freed and reused. Pages reach their
/// arena through a raw back pointer; the collection owns every `Arena` and
/// frees them through [`Arena::release`].
pub(crate) struct Arena {
    /// Chunk base exactly as the source returned it. Not page aligned in
    /// general; the first page starts at the next page boundary.
    pub(crate) base: *mut u8,
    /// Number of pages currently chained off `freepages`. Pages in the
    /// uninitialized tail are not counted.
    pub(crate) nfreepages: usize,
    /// Number of pages the chunk holds in total, fixed at creation.
    pub(crate) totalpages: usize,
    /// Head of the free page list. Following `nfreepages` links leads to the
    /// first uninitialized page, or to null when the tail is used up.
    pub(crate) freepages: *mut u8,
    /// Link for whichever arena list this arena currently sits on.
    pub(crate) next: *mut Arena,
}

impl Arena {
    /// Creates the record for a fresh chunk whose pages start at
    /// `firstpage`. The caller owns the returned pointer and must hand it
    /// back to [`Arena::release`].
    pub(crate) fn boxed(base: *mut u8, firstpage: *mut u8, totalpages: usize) -> *mut Arena {
        Box::into_raw(Box::new(Arena {
            base,
            nfreepages: 0,
            totalpages,
            freepages: firstpage,
            next: ptr::null_mut(),
        }))
    }

    /// Frees an arena record. The chunk itself must already have been
    /// returned to the source.
    ///
    /// # Safety
    ///
    /// `arena` must have come from [`Arena::boxed`] and must not be used
    /// afterwards.
    pub(crate) unsafe fn release(arena: *mut Arena) {
        drop(Box::from_raw(arena));
    }
}
