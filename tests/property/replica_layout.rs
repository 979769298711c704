//! Replica layouts: stride, sizing and fill fidelity.

use proptest::prelude::*;

use vmemprof::arena::ByteStore;
use vmemprof::{ReplicaLayout, ReplicaSet};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(crate::cases(48)))]

    #[test]
    fn stride_is_smallest_covering_multiple(
        source_len in 1usize..=20_000,
        multiple in 1usize..=8192,
        count in 1usize..=64,
    ) {
        let layout = ReplicaLayout::packed(source_len, count).slot_multiple(multiple);
        let stride = layout.stride().unwrap();
        prop_assert_eq!(stride % multiple, 0);
        prop_assert!(stride >= source_len);
        prop_assert!(stride - source_len < multiple);
        prop_assert_eq!(layout.required_len().unwrap(), stride * count);
    }

    #[test]
    fn required_len_grows_with_padding(
        source_len in 1usize..=20_000,
        small in 1usize..=4096,
        factor in 1usize..=8,
        count in 1usize..=64,
    ) {
        let base = ReplicaLayout::packed(source_len, count).base_align(4096);
        let a = base.slot_multiple(small).required_len().unwrap();
        let b = base.slot_multiple(small * factor).required_len().unwrap();
        prop_assert!(a <= b);
    }

    #[test]
    fn every_replica_matches_source(
        source in prop::collection::vec(any::<u8>(), 1..=512),
        multiple in 1usize..=256,
        count in 1usize..=16,
        align_shift in 0u32..=12,
    ) {
        let align = 1usize << align_shift;
        let layout = ReplicaLayout::packed(source.len(), count)
            .slot_multiple(multiple)
            .base_align(align);
        let set = ReplicaSet::in_arena(layout, &source).unwrap();
        prop_assert!(set.verify(&source));
        prop_assert_eq!(set.first_mismatch(&source), None);
        prop_assert_eq!(set.store().bytes().as_ptr().wrapping_add(set.start()) as usize % align, 0);
        for i in 0..count {
            prop_assert_eq!(set.replica(i), &source[..]);
        }
    }
}
