//! Many byte-identical copies of the source buffer in one backing store.
//!
//! Rotating through replicas means each measured iteration reads data that
//! the previous iterations did not touch. Stride and base alignment decide
//! how the replicas alias in the cache and how many page translations each
//! one needs.
//!
//! # Layout
//! ```text
//! base ── slack ── | slot 0 | slot 1 | ... | slot N-1 |
//!                  ^ aligned to base_align
//! slot = source_len rounded up to slot_multiple
//! ```

use crate::arena::{ArenaError, ByteArena, ByteStore};
use crate::util::round_up_to_multiple;

/// Replica geometry, independent of the backing store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReplicaLayout {
    /// Bytes copied from the source into each slot.
    pub source_len: usize,
    /// Number of replicas.
    pub count: usize,
    /// Slots are rounded up to a multiple of this (1 = packed).
    pub slot_multiple: usize,
    /// Power-of-two alignment of slot 0, or `None` to start at the store base.
    pub base_align: Option<usize>,
}

impl ReplicaLayout {
    /// Packed, unaligned replicas.
    pub const fn packed(source_len: usize, count: usize) -> Self {
        Self {
            source_len,
            count,
            slot_multiple: 1,
            base_align: None,
        }
    }

    /// Rounds every slot up to a multiple of `multiple`.
    pub const fn slot_multiple(mut self, multiple: usize) -> Self {
        self.slot_multiple = multiple;
        self
    }

    /// Aligns slot 0 to `align`, reserving `align` bytes of slack.
    pub const fn base_align(mut self, align: usize) -> Self {
        self.base_align = Some(align);
        self
    }

    /// Distance between consecutive slots.
    pub fn stride(&self) -> Result<usize, ArenaError> {
        round_up_to_multiple(self.source_len, self.slot_multiple).ok_or(
            ArenaError::InvalidLayout {
                len: self.source_len,
                align: self.slot_multiple,
            },
        )
    }

    /// Bytes the backing store must hold: `stride * count` plus alignment
    /// slack.
    pub fn required_len(&self) -> Result<usize, ArenaError> {
        let stride = self.stride()?;
        let slack = self.base_align.unwrap_or(0);
        stride
            .checked_mul(self.count)
            .and_then(|v| v.checked_add(slack))
            .ok_or(ArenaError::InvalidLayout {
                len: stride,
                align: slack,
            })
    }
}

/// Replicas of one source buffer inside a single store.
pub struct ReplicaSet<S: ByteStore = ByteArena> {
    store: S,
    layout: ReplicaLayout,
    start: usize,
    stride: usize,
}

impl ReplicaSet<ByteArena> {
    /// Allocates a heap arena sized for `layout` and fills it from `source`.
    pub fn in_arena(layout: ReplicaLayout, source: &[u8]) -> Result<Self, ArenaError> {
        let arena = ByteArena::new(layout.required_len()?)?;
        Self::in_store(arena, layout, source)
    }
}

impl<S: ByteStore> ReplicaSet<S> {
    /// Fills `store` with `layout.count` copies of `source`.
    ///
    /// # Errors
    /// - `SizeZero` if the layout has no replicas or an empty source.
    /// - `InvalidLayout` if `source` does not match `layout.source_len`.
    /// - `OutOfBounds` if the store is too small for the layout.
    pub fn in_store(mut store: S, layout: ReplicaLayout, source: &[u8]) -> Result<Self, ArenaError> {
        if layout.count == 0 || layout.source_len == 0 {
            return Err(ArenaError::SizeZero);
        }
        if source.len() != layout.source_len {
            return Err(ArenaError::InvalidLayout {
                len: source.len(),
                align: layout.source_len,
            });
        }
        let stride = layout.stride()?;
        let start = match layout.base_align {
            Some(align) => store.aligned_offset(align),
            None => 0,
        };
        // Checks the last slot up front so the fill loop cannot overrun.
        let last = stride
            .checked_mul(layout.count - 1)
            .and_then(|v| v.checked_add(start))
            .ok_or(ArenaError::OutOfBounds {
                offset: usize::MAX,
                len: layout.source_len,
                capacity: store.capacity(),
            })?;
        store.view(last, layout.source_len)?;

        for i in 0..layout.count {
            store
                .view_mut(start + i * stride, layout.source_len)?
                .copy_from_slice(source);
        }

        Ok(Self {
            store,
            layout,
            start,
            stride,
        })
    }

    /// Number of replicas.
    #[inline]
    pub fn count(&self) -> usize {
        self.layout.count
    }

    /// Distance between replica starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Offset of replica 0 inside the store.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Geometry this set was built with.
    #[inline]
    pub fn layout(&self) -> ReplicaLayout {
        self.layout
    }

    /// Bytes held by the backing store.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.store.capacity()
    }

    /// Replica `index`.
    ///
    /// # Panics
    /// Panics if `index >= count()`.
    #[inline]
    pub fn replica(&self, index: usize) -> &[u8] {
        assert!(index < self.layout.count);
        let offset = self.start + index * self.stride;
        &self.store.bytes()[offset..offset + self.layout.source_len]
    }

    /// Index of the first replica whose bytes differ from `source`, if any.
    pub fn first_mismatch(&self, source: &[u8]) -> Option<usize> {
        (0..self.layout.count).find(|&i| self.replica(i) != source)
    }

    /// True if every replica still matches `source`.
    #[inline]
    pub fn verify(&self, source: &[u8]) -> bool {
        self.first_mismatch(source).is_none()
    }

    /// Backing store.
    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable backing store (protection changes, flush regions sharing the
    /// same mapping).
    #[inline]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LARGE_PAGE, PAGE_SIZE, SOURCE_FILL, SOURCE_LEN};

    fn source() -> Vec<u8> {
        vec![SOURCE_FILL; SOURCE_LEN]
    }

    #[test]
    fn packed_layout_has_no_slack() {
        let layout = ReplicaLayout::packed(SOURCE_LEN, 10);
        assert_eq!(layout.stride().unwrap(), SOURCE_LEN);
        assert_eq!(layout.required_len().unwrap(), SOURCE_LEN * 10);
    }

    #[test]
    fn page_layout_matches_rounded_stride_plus_slack() {
        let layout = ReplicaLayout::packed(SOURCE_LEN, 850)
            .slot_multiple(PAGE_SIZE)
            .base_align(PAGE_SIZE);
        assert_eq!(layout.stride().unwrap(), 20480);
        assert_eq!(layout.required_len().unwrap(), 20480 * 850 + PAGE_SIZE);
    }

    #[test]
    fn every_replica_matches_source() {
        let src = source();
        let set = ReplicaSet::in_arena(
            ReplicaLayout::packed(SOURCE_LEN, 64).base_align(PAGE_SIZE),
            &src,
        )
        .unwrap();
        assert_eq!(set.first_mismatch(&src), None);
        assert_eq!(set.count(), 64);
    }

    #[test]
    fn aligned_replicas_start_on_boundary() {
        let src = source();
        let layout = ReplicaLayout::packed(SOURCE_LEN, 8)
            .slot_multiple(PAGE_SIZE)
            .base_align(LARGE_PAGE);
        let set = ReplicaSet::in_arena(layout, &src).unwrap();
        for i in 0..set.count() {
            let addr = set.replica(i).as_ptr() as usize;
            assert_eq!(addr % PAGE_SIZE, 0);
        }
        assert_eq!(set.replica(0).as_ptr() as usize % LARGE_PAGE, 0);
    }

    #[test]
    fn empty_layout_is_rejected() {
        let src = source();
        assert_eq!(
            ReplicaSet::in_arena(ReplicaLayout::packed(SOURCE_LEN, 0), &src).err(),
            Some(ArenaError::SizeZero)
        );
    }

    #[test]
    fn undersized_store_is_rejected() {
        let src = source();
        let arena = ByteArena::new(SOURCE_LEN * 2).unwrap();
        let err = ReplicaSet::in_store(arena, ReplicaLayout::packed(SOURCE_LEN, 3), &src)
            .err()
            .unwrap();
        assert!(matches!(err, ArenaError::OutOfBounds { .. }));
    }

    #[test]
    fn mismatched_source_is_rejected() {
        let short = vec![SOURCE_FILL; 10];
        assert!(ReplicaSet::in_arena(ReplicaLayout::packed(SOURCE_LEN, 2), &short).is_err());
    }

    #[test]
    fn corruption_is_detected() {
        let src = source();
        let mut set = ReplicaSet::in_arena(ReplicaLayout::packed(SOURCE_LEN, 4), &src).unwrap();
        let offset = set.start() + 2 * set.stride() + 100;
        set.store_mut().bytes_mut()[offset] ^= 0xFF;
        assert_eq!(set.first_mismatch(&src), Some(2));
    }

    #[test]
    #[should_panic]
    fn replica_index_is_bounds_checked() {
        let src = source();
        let set = ReplicaSet::in_arena(ReplicaLayout::packed(SOURCE_LEN, 2), &src).unwrap();
        let _ = set.replica(2);
    }
}
