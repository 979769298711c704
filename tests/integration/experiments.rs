//! Variants built with small parameters and driven for a few laps.

use vmemprof::copy::CopyKernel;
use vmemprof::evict::FillStrategy;
use vmemprof::experiments::{CapacityRotation, CpuFlush, CpuFlushConfig, InlineBaseline};
use vmemprof::geometry::{CopyPlan, LARGE_PAGE, PAGE_SIZE, SOURCE_LEN};
use vmemprof::{drive, Experiment, IterClock, ReplicaLayout, Timing};

fn small_flush(
    fill: FillStrategy,
    plan: CopyPlan,
    kernel: CopyKernel,
    replicas: ReplicaLayout,
) -> CpuFlushConfig {
    CpuFlushConfig {
        name: "small_flush",
        flush_len: 256 * 1024,
        guard: 64 * 1024,
        fill,
        plan,
        kernel,
        replicas,
    }
}

#[test]
fn every_kernel_and_plan_reproduces_source_bytes() {
    for plan in [CopyPlan::STANDARD, CopyPlan::SINGLE, CopyPlan::WITH_TRAILER] {
        for kernel in [CopyKernel::Library, CopyKernel::Bytewise] {
            let layout = ReplicaLayout::packed(SOURCE_LEN, 5).base_align(PAGE_SIZE);
            let mut exp =
                CpuFlush::new(small_flush(FillStrategy::Library, plan, kernel, layout)).unwrap();
            drive(&mut exp, 11).unwrap();
            assert!(exp.verify(), "{plan:?} {kernel:?}");
        }
    }
}

#[test]
fn flush_marker_changes_at_each_wrap() {
    let layout = ReplicaLayout::packed(SOURCE_LEN, 3);
    let mut exp = CpuFlush::new(small_flush(
        FillStrategy::ByteLoop,
        CopyPlan::STANDARD,
        CopyKernel::Library,
        layout,
    ))
    .unwrap();
    let mut clock = IterClock::new(exp.timing());
    let mut previous = exp.flush().marker();
    for i in 1..=30 {
        exp.iterate(&mut clock).unwrap();
        let marker = exp.flush().marker();
        if i % 3 == 0 {
            assert_ne!(marker, previous, "iteration {i}");
        } else {
            assert_eq!(marker, previous, "iteration {i}");
        }
        previous = marker;
    }
    assert_eq!(exp.flush().window().passes(), 11);
}

#[test]
fn guards_stay_untouched_after_many_flushes() {
    let layout = ReplicaLayout::packed(SOURCE_LEN, 2);
    let mut exp = CpuFlush::new(small_flush(
        FillStrategy::ByteLoop,
        CopyPlan::STANDARD,
        CopyKernel::Library,
        layout,
    ))
    .unwrap();
    drive(&mut exp, 20).unwrap();
    let (head, tail) = exp.flush().guards();
    assert!(head.iter().chain(tail).all(|&b| b == 0));
}

#[test]
fn large_page_base_alignment_is_honored() {
    let layout = ReplicaLayout::packed(SOURCE_LEN, 4)
        .slot_multiple(4096)
        .base_align(LARGE_PAGE);
    let exp = CpuFlush::new(small_flush(
        FillStrategy::Library,
        CopyPlan::WITH_TRAILER,
        CopyKernel::Bytewise,
        layout,
    ))
    .unwrap();
    for i in 0..4 {
        let addr = exp.replicas().replica(i).as_ptr() as usize;
        assert_eq!(addr % 4096, 0);
        assert_eq!(addr - exp.replicas().replica(0).as_ptr() as usize, i * 20480);
    }
    assert_eq!(exp.replicas().replica(0).as_ptr() as usize % LARGE_PAGE, 0);
}

#[test]
fn footprint_is_deterministic_across_instances() {
    let a = CapacityRotation::tlb(16).unwrap().footprint();
    let b = CapacityRotation::tlb(16).unwrap().footprint();
    assert_eq!(a, b);

    let c = CpuFlush::new(CpuFlushConfig::byte_loop(1).unwrap())
        .unwrap()
        .footprint();
    let d = CpuFlush::new(CpuFlushConfig::byte_loop(1).unwrap())
        .unwrap()
        .footprint();
    assert_eq!(c, d);
    assert_eq!(c.allocated, 4 * 1024 * 1024 + SOURCE_LEN * 1000 + PAGE_SIZE);
}

#[test]
fn harness_and_manual_timing_both_report_time() {
    let mut baseline = InlineBaseline::new().unwrap();
    assert_eq!(baseline.timing(), Timing::Harness);
    let elapsed = drive(&mut baseline, 10_000).unwrap();
    assert!(elapsed.as_nanos() > 0);

    let mut flush = CpuFlush::new(CpuFlushConfig::memset(1).unwrap()).unwrap();
    assert_eq!(flush.timing(), Timing::Manual);
    let manual = drive(&mut flush, 2_000).unwrap();
    assert!(manual.as_nanos() > 0);
    assert!(flush.verify());
}

#[test]
fn tlb_rotation_wraps_without_eviction() {
    let mut exp = CapacityRotation::tlb(7).unwrap();
    drive(&mut exp, 50).unwrap();
    assert!(exp.verify());
    assert_eq!(exp.footprint().num_copies, 7);
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
#[test]
fn line_flush_variants_reproduce_bytes() {
    use vmemprof::experiments::{LineFlushConfig, LineFlushCopy};

    for config in [LineFlushConfig::MEMCPY, LineFlushConfig::SINGLE] {
        let mut exp = LineFlushCopy::new(config).unwrap();
        drive(&mut exp, 5).unwrap();
        assert!(exp.verify());
        assert_eq!(exp.lines_flushed(), 270 * 6);
    }
}

#[cfg(all(unix, feature = "vmem"))]
mod vmem {
    use vmemprof::experiments::{VmemTlbFlush, WipFlush, WipFlushConfig};
    use vmemprof::geometry::{LARGE_PAGE, MIB};
    use vmemprof::{drive, Experiment, HostMemory, Protection};

    #[test]
    fn tlb_flush_toggles_once_per_lap() {
        let mut exp = VmemTlbFlush::with_memory(68, 6, HostMemory::new()).unwrap();
        drive(&mut exp, 18).unwrap();
        assert_eq!(exp.toggles(), 3);
        assert_eq!(exp.replicas().store().protection(), Protection::ReadWrite);
        assert!(exp.verify());
    }

    #[test]
    fn wip_flush_shares_one_region() {
        let config = WipFlushConfig {
            flush_len: 2 * MIB,
            guard: MIB,
            replicas: 10,
            region_len: 16 * MIB,
            region_align: LARGE_PAGE,
        };
        let mut exp = WipFlush::new(config).unwrap();
        let before = exp.marker();
        drive(&mut exp, 10).unwrap();
        assert_ne!(exp.marker(), before);
        assert!(exp.verify());
        assert_eq!(exp.window().offset(), 8 * MIB + MIB);
    }
}
