//! Capacity-driven eviction: overwrite a region several times larger than
//! the cache.
//!
//! # Guard padding
//! Walking a flush region pulls its page-table entries into the cache, and
//! the hardware may prefetch neighbouring entries too. One cache line of
//! last-level entries covers 16 MiB of address space, so a flush region
//! sitting next to the replicas could warm the very translations the next
//! measured read needs. `guard` bytes of untouched address space on each
//! side of the flush window keep the two apart.
//!
//! # Fill value
//! Each overwrite uses the next value of a wrapping `u8` counter starting
//! at 1 (fresh memory is zeroed), so no pass stores the bytes already there.

use std::ptr;

use crate::arena::{ArenaError, ByteArena, ByteStore};

/// How the flush window is overwritten.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FillStrategy {
    /// `slice::fill`, i.e. the library `memset`. Large fills may use
    /// non-temporal stores that bypass the cache.
    Library,
    /// Volatile byte-at-a-time stores that always go through the cache.
    ByteLoop,
}

impl FillStrategy {
    /// Writes `value` to every byte of `region`.
    #[inline]
    pub fn fill(self, region: &mut [u8], value: u8) {
        match self {
            Self::Library => region.fill(value),
            Self::ByteLoop => {
                for byte in region.iter_mut() {
                    // SAFETY: byte is a valid exclusive reference.
                    unsafe { ptr::write_volatile(byte, value) };
                }
            }
        }
    }
}

/// A flush window inside some store, plus its fill counter.
///
/// The window does not own memory so it can live inside a mapping shared
/// with the replicas.
#[derive(Clone, Debug)]
pub struct FlushWindow {
    offset: usize,
    len: usize,
    next_value: u8,
    strategy: FillStrategy,
    passes: u64,
}

impl FlushWindow {
    /// Describes `len` bytes at `offset`.
    pub fn new(offset: usize, len: usize, strategy: FillStrategy) -> Self {
        Self {
            offset,
            len,
            next_value: 1,
            strategy,
            passes: 0,
        }
    }

    /// Overwrites the window in `store` with the next fill value and returns
    /// the value written.
    pub fn overwrite<S: ByteStore + ?Sized>(&mut self, store: &mut S) -> Result<u8, ArenaError> {
        let region = store.view_mut(self.offset, self.len)?;
        Ok(self.fill(region))
    }

    #[inline]
    fn fill(&mut self, region: &mut [u8]) -> u8 {
        let value = self.next_value;
        self.strategy.fill(region, value);
        self.next_value = value.wrapping_add(1);
        self.passes += 1;
        value
    }

    /// First byte of the window, which holds the last fill value once any
    /// overwrite has run.
    pub fn marker<S: ByteStore + ?Sized>(&self, store: &S) -> Result<u8, ArenaError> {
        Ok(store.view(self.offset, 1)?[0])
    }

    /// Flush window length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length window.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the window inside its store.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Completed overwrites.
    #[inline]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Strategy used by [`overwrite`](Self::overwrite).
    #[inline]
    pub fn strategy(&self) -> FillStrategy {
        self.strategy
    }
}

/// A dedicated flush arena: `guard | window | guard`.
pub struct FlushBuffer {
    arena: ByteArena,
    window: FlushWindow,
    guard: usize,
}

impl FlushBuffer {
    /// Allocates `flush_len + 2 * guard` bytes with the window in the middle.
    pub fn new(flush_len: usize, guard: usize, strategy: FillStrategy) -> Result<Self, ArenaError> {
        if flush_len == 0 {
            return Err(ArenaError::SizeZero);
        }
        let total = guard
            .checked_mul(2)
            .and_then(|g| g.checked_add(flush_len))
            .ok_or(ArenaError::InvalidLayout {
                len: flush_len,
                align: guard,
            })?;
        Ok(Self {
            arena: ByteArena::new(total)?,
            window: FlushWindow::new(guard, flush_len, strategy),
            guard,
        })
    }

    /// Overwrites the window; returns the value written.
    #[inline]
    pub fn overwrite(&mut self) -> u8 {
        let (offset, len) = (self.window.offset(), self.window.len());
        debug_assert!(offset + len <= self.arena.len());
        let region = &mut self.arena.as_mut_slice()[offset..offset + len];
        self.window.fill(region)
    }

    /// Current first byte of the window.
    #[inline]
    pub fn marker(&self) -> u8 {
        self.arena.as_slice()[self.window.offset()]
    }

    /// Total bytes allocated, guards included.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.arena.len()
    }

    /// Guard bytes on each side of the window.
    #[inline]
    pub fn guard(&self) -> usize {
        self.guard
    }

    /// The window description.
    #[inline]
    pub fn window(&self) -> &FlushWindow {
        &self.window
    }

    /// Guard regions, which overwrites never touch.
    pub fn guards(&self) -> (&[u8], &[u8]) {
        let bytes = self.arena.as_slice();
        let tail = self.window.offset() + self.window.len();
        (&bytes[..self.guard], &bytes[tail..])
    }
}
