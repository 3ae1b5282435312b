use crate::constants::WORD;
use crate::page::PAGE_HEADER_SIZE;

/// Size class geometry, computed once at construction.
///
/// Size class `k` serves requests of exactly `k * WORD` bytes, for `k` from
/// 1 up to `small_request_threshold / WORD`. Entry 0 exists only so the
/// tables can be indexed by class directly.
pub(crate) struct SizeClassTable {
    nblocks_for_size: Vec<usize>,
    small_request_threshold: usize,
}

impl SizeClassTable {
    pub(crate) fn new(page_size: usize, small_request_threshold: usize) -> SizeClassTable {
        let length = small_request_threshold / WORD + 1;
        let mut nblocks_for_size = vec![0; length];

        for size_class in 1..length {
            nblocks_for_size[size_class] = (page_size - PAGE_HEADER_SIZE) / (WORD * size_class);
        }

        SizeClassTable {
            nblocks_for_size,
            small_request_threshold,
        }
    }

    /// Maps a request size to its size class. The size must be a nonzero
    /// word multiple no larger than the threshold; anything else is a bug
    /// in the caller.
    pub(crate) fn class_for_size(&self, nbytes: usize) -> usize {
        assert!(nbytes > 0, "alloc: request of zero bytes");
        assert!(
            nbytes <= self.small_request_threshold,
            "alloc: request above the small request threshold"
        );
        assert!(nbytes % WORD == 0, "alloc: request not word aligned");

        nbytes / WORD
    }

    /// How many blocks of this class fit on one page.
    pub(crate) fn blocks_per_page(&self, size_class: usize) -> usize {
        self.nblocks_for_size[size_class]
    }

    pub(crate) fn largest_class(&self) -> usize {
        self.nblocks_for_size.len() - 1
    }
}
