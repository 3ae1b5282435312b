//! Intrusive singly linked lists kept inside free memory itself.
//!
//! A free block or free page stores the address of the next free one in its
//! own first word. Nothing outside that word is ever read, so the lists cost
//! no memory at all. All link cells must be word aligned.

use crate::constants::WORD;

/// Reads the link stored in the first word at `cell`.
///
/// # Safety
///
/// `cell` must be word aligned and point to memory we own that currently
/// holds a link (a free block, a free page, or a field known to contain one).
pub(crate) unsafe fn load_link(cell: *mut u8) -> *mut u8 {
    debug_assert!(cell as usize % WORD == 0);
    (cell as *mut *mut u8).read()
}

/// Stores `link` into the first word at `cell`.
///
/// # Safety
///
/// Same as [`load_link`], except the word is overwritten rather than read.
pub(crate) unsafe fn store_link(cell: *mut u8, link: *mut u8) {
    debug_assert!(cell as usize % WORD == 0);
    (cell as *mut *mut u8).write(link)
}
