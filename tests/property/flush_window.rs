//! Flush window fill sequence and guard isolation.

use proptest::prelude::*;

use vmemprof::arena::ByteArena;
use vmemprof::evict::{FillStrategy, FlushBuffer, FlushWindow};

fn strategy() -> impl Strategy<Value = FillStrategy> {
    prop_oneof![Just(FillStrategy::Library), Just(FillStrategy::ByteLoop)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(crate::cases(32)))]

    #[test]
    fn markers_follow_pass_count(
        len in 1usize..=4096,
        guard in 0usize..=512,
        passes in 1usize..=300,
        fill in strategy(),
    ) {
        let mut buffer = FlushBuffer::new(len, guard, fill).unwrap();
        for pass in 1..=passes {
            let value = buffer.overwrite();
            prop_assert_eq!(value, pass as u8);
            prop_assert_eq!(buffer.marker(), value);
        }
        prop_assert_eq!(buffer.window().passes(), passes as u64);
        let (head, tail) = buffer.guards();
        prop_assert_eq!(head.len(), guard);
        prop_assert_eq!(tail.len(), guard);
        prop_assert!(head.iter().chain(tail).all(|&b| b == 0));
    }

    #[test]
    fn window_in_shared_store_leaves_neighbours(
        offset in 0usize..=1024,
        len in 1usize..=1024,
        after in 0usize..=256,
        fill in strategy(),
    ) {
        let mut arena = ByteArena::filled(offset + len + after, 0x5A).unwrap();
        let mut window = FlushWindow::new(offset, len, fill);
        let value = window.overwrite(&mut arena).unwrap();
        prop_assert_eq!(window.marker(&arena).unwrap(), value);

        let bytes = arena.as_slice();
        prop_assert!(bytes[..offset].iter().all(|&b| b == 0x5A));
        prop_assert!(bytes[offset..offset + len].iter().all(|&b| b == value));
        prop_assert!(bytes[offset + len..].iter().all(|&b| b == 0x5A));
    }
}
