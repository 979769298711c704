//! Alignment arithmetic over plain integers.
//!
//! Every aligned start index in this crate is computed here from a base
//! address and an offset, never by casting pointers back and forth at the
//! call site.

/// Smallest multiple of the power-of-two `alignment` that is `>= value`.
///
/// Used for page-granular lengths (protection changes) and, through
/// [`offset_to_alignment`], for placing replicas on page or large-page
/// boundaries inside an arena.
///
/// # Panics
/// Panics if `alignment` is zero or not a power of two, or if the rounded
/// value does not fit in `usize`.
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    match value.checked_add(mask) {
        Some(bumped) => bumped & !mask,
        None => panic!("align_up overflow"),
    }
}

/// Rounds `value` up to the next multiple of `multiple`.
///
/// Unlike [`align_up`], `multiple` may be any positive integer (slot padding
/// such as 40 KiB is not a power of two). Returns `None` on overflow or when
/// `multiple` is zero.
#[inline]
pub const fn round_up_to_multiple(value: usize, multiple: usize) -> Option<usize> {
    if multiple == 0 {
        return None;
    }
    let rem = value % multiple;
    if rem == 0 {
        return Some(value);
    }
    value.checked_add(multiple - rem)
}

/// Distance from `addr` to the next `alignment` boundary (zero if aligned).
///
/// # Panics
///
/// Panics under the same conditions as [`align_up`].
#[inline]
pub const fn offset_to_alignment(addr: usize, alignment: usize) -> usize {
    align_up(addr, alignment) - addr
}
