//! Registry contents and sweep-derived sizing.

use vmemprof::evict::Capabilities;
use vmemprof::experiments::capacity::l3_replicas;
use vmemprof::experiments::CpuFlushConfig;
use vmemprof::registry::{self, Group, Requirement};
use vmemprof::Timing;

fn expected_allocated(config: &CpuFlushConfig) -> usize {
    config.flush_len + 2 * config.guard + config.replicas.required_len().unwrap()
}

#[test]
fn sweeps_and_run_settings() {
    let cases: &[(&str, usize, u32, Option<u64>, Timing)] = &[
        ("memcpy_baseline_inline", 1, 4, None, Timing::Harness),
        ("memcpy_32mb_l3", 3, 4, None, Timing::Harness),
        ("memcpy_clflush", 1, 1, Some(100_000), Timing::Manual),
        ("memcpy_cpu_flush", 3, 4, None, Timing::Manual),
        ("memcpy_cpu_flush_memset", 3, 4, None, Timing::Manual),
        ("memcpy_cpu_flush_padded", 6, 20, None, Timing::Manual),
        ("memcpy_tlb", 4, 4, None, Timing::Harness),
        ("memcpy_copies_padded", 3, 4, None, Timing::Manual),
        ("cache_flushing_clflush", 1, 4, Some(100_000), Timing::Manual),
        ("cache_flushing_flush_std_memset", 3, 4, Some(100_000), Timing::Manual),
    ];
    for &(name, points, reps, iters, timing) in cases {
        let spec = registry::find(name).unwrap();
        assert_eq!(spec.sweep.len(), points, "{name}");
        assert_eq!(spec.repetitions, reps, "{name}");
        assert_eq!(spec.iterations, iters, "{name}");
        assert_eq!(spec.timing, timing, "{name}");
    }
}

#[cfg(all(unix, feature = "vmem"))]
#[test]
fn vmem_variants_are_registered() {
    let wip = registry::find("memcpy_wip_flush").unwrap();
    assert_eq!(wip.sweep.len(), 12);
    assert_eq!(wip.iterations, Some(3_000_000));
    assert_eq!(wip.requires, Requirement::Translation);
    let tlb = registry::find("memcpy_vmem_tlb_flush").unwrap();
    let padding: Vec<u64> = tlb.sweep.iter().map(|args| args[0]).collect();
    assert_eq!(padding, vec![40, 68]);
}

#[test]
fn groups_partition_the_registry() {
    let total: usize = [Group::Memcpy, Group::DecompSim, Group::CacheFlushing]
        .into_iter()
        .map(|g| registry::group(g).count())
        .sum();
    assert_eq!(total, registry::available().count());
}

#[test]
fn line_flush_variants_follow_host_capability() {
    let present = registry::available().any(|s| s.name == "memcpy_clflush");
    assert_eq!(present, Capabilities::HOST.line_flush);
    assert_eq!(
        registry::find("memcpy_clflush").unwrap().requires,
        Requirement::LineFlush
    );
}

#[test]
fn copies_padded_allocation_is_monotonic_in_padding() {
    let spec = registry::find("memcpy_copies_padded").unwrap();
    let allocated: Vec<usize> = spec
        .sweep
        .iter()
        .map(|args| expected_allocated(&CpuFlushConfig::copies_padded(args[0] as usize)))
        .collect();
    assert!(allocated.windows(2).all(|w| w[0] <= w[1]), "{allocated:?}");
    assert_eq!(
        allocated[0],
        32 * 1024 * 1024 + 2 * 16 * 1024 * 1024 + 17234 * 1000 + 2 * 1024 * 1024
    );
}

#[test]
fn padded_flush_allocation_grows_with_guard() {
    let spec = registry::find("memcpy_cpu_flush_padded").unwrap();
    let allocated: Vec<usize> = spec
        .sweep
        .iter()
        .map(|args| expected_allocated(&CpuFlushConfig::padded(args[0] as usize).unwrap()))
        .collect();
    assert!(allocated.windows(2).all(|w| w[0] < w[1]), "{allocated:?}");
}

#[test]
fn built_instance_reports_expected_allocation() {
    let exp = registry::instantiate("memcpy_copies_padded", &[4096]).unwrap();
    let config = CpuFlushConfig::copies_padded(4096);
    assert_eq!(exp.footprint().allocated, expected_allocated(&config));
    assert_eq!(exp.footprint().num_copies, 1000);
    assert_eq!(exp.footprint().bytes_per_iteration, 2004);
}

#[test]
fn l3_sweep_replica_counts() {
    let spec = registry::find("memcpy_32mb_l3").unwrap();
    let counts: Vec<usize> = spec
        .sweep
        .iter()
        .map(|args| l3_replicas(args[0] as usize).unwrap())
        .collect();
    assert_eq!(counts, vec![23_022, 29_999, 36_975]);
}

#[cfg(target_os = "linux")]
fn resident_bytes() -> usize {
    let status = std::fs::read_to_string("/proc/self/status").unwrap();
    let line = status.lines().find(|l| l.starts_with("VmRSS:")).unwrap();
    let kib: usize = line.split_whitespace().nth(1).unwrap().parse().unwrap();
    kib * 1024
}

#[cfg(target_os = "linux")]
#[test]
fn sixteen_mib_padding_leaves_slot_gaps_uncommitted() {
    use vmemprof::geometry::{LARGE_PAGE, MIB, SOURCE_LEN};
    use vmemprof::experiments::CpuFlush;
    use vmemprof::{drive, Experiment, ReplicaLayout};

    let padding = 16 * MIB;
    let mut config = CpuFlushConfig::copies_padded(padding);
    config.replicas = ReplicaLayout::packed(SOURCE_LEN, 64)
        .slot_multiple(padding)
        .base_align(LARGE_PAGE);

    let before = resident_bytes();
    let mut exp = CpuFlush::new(config).unwrap();
    drive(&mut exp, 128).unwrap();
    let grown = resident_bytes().saturating_sub(before);

    assert_eq!(exp.footprint().allocated, expected_allocated(&config));
    assert!(exp.footprint().allocated > 1024 * MIB);
    // Replicas touch a few pages per slot; the flush window is 32 MiB.
    assert!(grown < 384 * MIB, "resident set grew by {} MiB", grown / MIB);
    assert!(exp.verify());
}
