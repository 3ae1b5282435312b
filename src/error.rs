use std::error::Error;
use std::fmt;

/// Errors returned by [`crate::ArenaCollection::alloc`].
///
/// Contract violations (zero, unaligned or oversized requests) are bugs in
/// the caller and panic instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocError {
    OutOfMemory,
}

/// Errors returned by [`crate::ChunkSource::allocate_chunk`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChunkError {
    Exhausted,
}

impl From<ChunkError> for AllocError {
    fn from(error: ChunkError) -> AllocError {
        match error {
            ChunkError::Exhausted => AllocError::OutOfMemory,
        }
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkError::Exhausted => write!(f, "chunk source exhausted"),
        }
    }
}

impl Error for AllocError {}
impl Error for ChunkError {}
