use std::mem::size_of;

/// The machine word size in bytes. Block sizes and page geometry are all
/// expressed in multiples of this.
pub const WORD: usize = size_of::<usize>();
