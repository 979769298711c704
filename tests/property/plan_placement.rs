//! Plans built from arbitrary spans: placement and copy kernels.

use proptest::prelude::*;

use vmemprof::copy::{copy_plan, copy_plan_bytewise};
use vmemprof::experiments::output_matches;
use vmemprof::geometry::{CopyPlan, CopySpan, PlanError, OUTPUT_LEN, SOURCE_LEN};

fn leak(spans: Vec<CopySpan>) -> CopyPlan {
    CopyPlan::from_spans(Box::leak(spans.into_boxed_slice()))
}

fn span_strategy() -> impl Strategy<Value = CopySpan> {
    (1usize..=700).prop_flat_map(|len| {
        (0usize..=SOURCE_LEN - len).prop_map(move |src_offset| CopySpan::new(src_offset, len))
    })
}

/// Spans that read inside the source and fit in the output together.
fn valid_plan() -> impl Strategy<Value = CopyPlan> {
    prop::collection::vec(span_strategy(), 1..=4)
        .prop_filter("fits output", |spans| {
            spans.iter().map(|s| s.len).sum::<usize>() <= OUTPUT_LEN
        })
        .prop_map(leak)
}

fn source() -> Vec<u8> {
    (0..SOURCE_LEN).map(|i| (i % 251) as u8).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(crate::cases(64)))]

    #[test]
    fn placements_are_contiguous(plan in valid_plan()) {
        prop_assert!(plan.validate(SOURCE_LEN, OUTPUT_LEN).is_ok());
        let mut expected = 0;
        for placement in plan.placements() {
            prop_assert_eq!(placement.dst_offset, expected);
            expected += placement.span.len;
        }
        prop_assert_eq!(expected, plan.footprint());
    }

    #[test]
    fn kernels_agree_and_reproduce_source(plan in valid_plan()) {
        let src = source();
        let mut library = [0u8; OUTPUT_LEN];
        let mut bytewise = [0u8; OUTPUT_LEN];
        let a = copy_plan(&plan, &src, &mut library);
        let b = copy_plan_bytewise(&plan, &src, &mut bytewise);
        prop_assert_eq!(a, plan.footprint());
        prop_assert_eq!(b, plan.footprint());
        prop_assert_eq!(&library[..], &bytewise[..]);
        prop_assert!(output_matches(&plan, &src, &library));
    }

    #[test]
    fn copy_order_does_not_move_output(
        (plan, order) in valid_plan().prop_flat_map(|plan| {
            let order: Vec<usize> = (0..plan.len()).collect();
            (Just(plan), Just(order).prop_shuffle())
        }),
    ) {
        let reordered = plan.with_copy_order(Box::leak(order.into_boxed_slice()));
        prop_assert!(reordered.validate(SOURCE_LEN, OUTPUT_LEN).is_ok());
        let src = source();
        let mut natural = [0u8; OUTPUT_LEN];
        let mut shuffled = [0u8; OUTPUT_LEN];
        copy_plan(&plan, &src, &mut natural);
        copy_plan_bytewise(&reordered, &src, &mut shuffled);
        prop_assert_eq!(&natural[..], &shuffled[..]);
    }

    #[test]
    fn overrunning_span_is_reported(
        plan in valid_plan(),
        extra in 1usize..=64,
    ) {
        let mut spans = plan.spans().to_vec();
        let last = spans.len() - 1;
        spans[last].src_offset = SOURCE_LEN - spans[last].len + extra;
        let broken = leak(spans);
        let overran = matches!(
            broken.validate(SOURCE_LEN, OUTPUT_LEN),
            Err(PlanError::SourceOverrun { index, .. }) if index == last
        );
        prop_assert!(overran);
    }

    #[test]
    fn oversized_plan_is_rejected(
        lens in prop::collection::vec(500usize..=1000, 4..=6),
    ) {
        let total: usize = lens.iter().sum();
        prop_assume!(total > OUTPUT_LEN);
        let plan = leak(lens.into_iter().map(|len| CopySpan::new(0, len)).collect());
        prop_assert_eq!(
            plan.validate(SOURCE_LEN, OUTPUT_LEN),
            Err(PlanError::OutputOverflow { footprint: total, output_len: OUTPUT_LEN })
        );
    }
}
