//! Owned, aligned byte arenas with bounds-checked views.
//!
//! # Scope
//! Every benchmark buffer (replica backing store, flush buffer, scratch
//! region) is one contiguous byte allocation. `ByteArena` owns such an
//! allocation and hands out slices by `(offset, len)`, so alignment and
//! padding are expressed as index arithmetic over the arena's base address
//! instead of pointer casts.
//!
//! # Invariants
//! - The allocation is zero-initialized, so every byte is always readable.
//! - The base address is a multiple of the requested alignment.
//! - `len > 0`; zero-sized arenas are rejected at construction.
//!
//! # Failure modes
//! - Zero sizes and unrepresentable layouts are reported via `ArenaError`.
//! - Allocator failure is reported as `ArenaError::OutOfMemory`; callers in
//!   this crate treat it as fatal.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt;
use std::ptr::NonNull;

use crate::util::offset_to_alignment;

/// Default base alignment. At or below the allocator's minimum alignment
/// `alloc_zeroed` goes through `calloc`, which hands large requests
/// fresh kernel zero pages; stricter alignments zero-fill every page up
/// front. Callers that need page or large-page alignment reserve slack and
/// use [`ByteStore::aligned_offset`] instead.
pub const LAZY_ALIGN: usize = 16;

/// Errors returned by arena construction and views.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ArenaError {
    /// A zero-byte allocation was requested.
    SizeZero,
    /// The requested size/alignment pair is not a valid layout.
    InvalidLayout { len: usize, align: usize },
    /// The allocator returned null.
    OutOfMemory { len: usize },
    /// A view reached past the end of the store.
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeZero => write!(f, "zero-sized buffer requested"),
            Self::InvalidLayout { len, align } => {
                write!(f, "invalid layout: {len} bytes aligned to {align}")
            }
            Self::OutOfMemory { len } => write!(f, "allocation of {len} bytes failed"),
            Self::OutOfBounds {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "view of {len} bytes at {offset} exceeds capacity {capacity}"
            ),
        }
    }
}

impl std::error::Error for ArenaError {}

/// Uniform byte view over the different backing stores.
///
/// Implemented by heap arenas and by explicitly mapped virtual memory so the
/// replica and flush logic does not care where the bytes live.
pub trait ByteStore {
    /// The whole store as a shared slice.
    fn bytes(&self) -> &[u8];

    /// The whole store as a mutable slice.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Store length in bytes.
    #[inline]
    fn capacity(&self) -> usize {
        self.bytes().len()
    }

    /// Address of the first byte, used only for alignment arithmetic.
    #[inline]
    fn base_addr(&self) -> usize {
        self.bytes().as_ptr() as usize
    }

    /// Offset of the first byte whose address is a multiple of `align`.
    ///
    /// # Panics
    /// Panics if `align` is not a power of two.
    #[inline]
    fn aligned_offset(&self, align: usize) -> usize {
        offset_to_alignment(self.base_addr(), align)
    }

    /// Bounds-checked shared view of `len` bytes at `offset`.
    fn view(&self, offset: usize, len: usize) -> Result<&[u8], ArenaError> {
        let capacity = self.capacity();
        let end = checked_end(offset, len, capacity)?;
        Ok(&self.bytes()[offset..end])
    }

    /// Bounds-checked mutable view of `len` bytes at `offset`.
    fn view_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8], ArenaError> {
        let capacity = self.capacity();
        let end = checked_end(offset, len, capacity)?;
        Ok(&mut self.bytes_mut()[offset..end])
    }
}

#[inline]
fn checked_end(offset: usize, len: usize, capacity: usize) -> Result<usize, ArenaError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(end),
        _ => Err(ArenaError::OutOfBounds {
            offset,
            len,
            capacity,
        }),
    }
}

/// Heap-allocated, zero-initialized byte arena with a guaranteed base
/// alignment.
///
/// Arenas from [`ByteArena::new`] use [`LAZY_ALIGN`], so untouched pages of
/// a large arena are not committed until first written. That matters for
/// sparse layouts such as 16 MiB replica strides. [`ByteArena::with_align`]
/// above `LAZY_ALIGN` commits the whole arena at construction.
pub struct ByteArena {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

impl ByteArena {
    /// Allocates a lazily committed arena of `len` bytes.
    pub fn new(len: usize) -> Result<Self, ArenaError> {
        Self::with_align(len, LAZY_ALIGN)
    }

    /// Allocates an arena of `len` bytes whose base is a multiple of `align`.
    ///
    /// # Errors
    /// - `SizeZero` if `len == 0`.
    /// - `InvalidLayout` if `align` is not a power of two or the size overflows.
    /// - `OutOfMemory` if the allocator returns null.
    pub fn with_align(len: usize, align: usize) -> Result<Self, ArenaError> {
        if len == 0 {
            return Err(ArenaError::SizeZero);
        }
        let layout = Layout::from_size_align(len, align)
            .map_err(|_| ArenaError::InvalidLayout { len, align })?;

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(ArenaError::OutOfMemory { len })?;

        debug_assert!((ptr.as_ptr() as usize).is_multiple_of(align));
        Ok(Self { ptr, len, layout })
    }

    /// Allocates an arena and fills it with `value`.
    pub fn filled(len: usize, value: u8) -> Result<Self, ArenaError> {
        let mut arena = Self::new(len)?;
        arena.as_mut_slice().fill(value);
        Ok(arena)
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; zero-sized arenas cannot be constructed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base alignment guaranteed at construction.
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Shared view of the whole arena.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialized (zeroed) bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable view of the whole arena.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes and uniquely borrowed through self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl ByteStore for ByteArena {
    #[inline]
    fn bytes(&self) -> &[u8] {
        self.as_slice()
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl Drop for ByteArena {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with exactly this layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl fmt::Debug for ByteArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteArena")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}

// SAFETY: ByteArena owns its allocation exclusively, like Box<[u8]>.
unsafe impl Send for ByteArena {}
unsafe impl Sync for ByteArena {}
