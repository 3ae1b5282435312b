//! A small object allocator meant to sit underneath a tracing garbage
//! collector.
//!
//! An [`ArenaCollection`] obtains large chunks of raw memory ("arenas") from
//! a [`ChunkSource`], slices them into pages, and slices each page into
//! equal sized blocks of a single size class. [`ArenaCollection::alloc`]
//! hands out one block; single blocks are never freed one by one. Instead
//! the collector runs a sweep over everything, passing a callback that gets
//! asked about each live block:
//! ```rust
//! use quarry::{ArenaCollection, ArenaConfig, WORD};
//!
//! let mut blocks = ArenaCollection::new(ArenaConfig::default());
//!
//! let a = blocks.alloc(2 * WORD).unwrap();
//! let b = blocks.alloc(2 * WORD).unwrap();
//! assert!(a != b);
//! assert_eq!(blocks.total_memory_used(), 4 * WORD);
//!
//! // a collection pass keeps only what the callback approves
//! blocks.mass_free(|block| block == a);
//! assert_eq!(blocks.total_memory_used(), 2 * WORD);
//! ```
//! Freed blocks are chained into free lists kept inside the free memory
//! itself, so the only per page overhead is a four word header. Pages whose
//! blocks all died return to their arena, arenas whose pages are all free
//! return to the source.
//!
//! The sweep can also run in bounded steps so a collector can spread the
//! work out, see [`ArenaCollection::mass_free_prepare`] and
//! [`ArenaCollection::mass_free_incremental`]. Allocation stays legal
//! between steps.
//!
//! The collection is single threaded by design: a concurrent collector is
//! expected to own it behind its own synchronization.

mod arena;
mod collection;
mod config;
mod constants;
mod error;
mod freelist;
mod page;
mod size_class;
mod source;
mod stats;
mod sweep;

pub use collection::ArenaCollection;
pub use config::{
    ArenaConfig, ARENA_CONFIG_DEFAULT_ARENA_SIZE, ARENA_CONFIG_DEFAULT_PAGE_SIZE,
    ARENA_CONFIG_DEFAULT_SMALL_REQUEST_THRESHOLD,
};
pub use constants::WORD;
pub use error::{AllocError, ChunkError};
pub use source::{ChunkSource, SysSource};
pub use stats::MemoryStats;
