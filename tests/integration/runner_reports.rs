//! Runner repetitions and report formatting.

use vmemprof::registry;
use vmemprof::runner::{aggregate_lines, run_point, RunError, RunSettings};

fn quick(repetitions: u32, iterations: u64) -> RunSettings {
    RunSettings {
        repetitions: Some(repetitions),
        iterations: Some(iterations),
        ..RunSettings::default()
    }
}

#[test]
fn repetitions_produce_records_and_aggregates() {
    let spec = registry::find("memcpy_tlb").unwrap();
    let records = run_point(spec, &[850], &quick(3, 2_000)).unwrap();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.iterations, 2_000);
        assert_eq!(record.footprint.num_copies, 850);
        let line = record.render();
        assert!(line.starts_with("memcpy_tlb/850/iterations:2000/repeats:3 "), "{line}");
        assert!(line.contains("Speed="));
        assert!(line.contains("NumCopies=850"));
    }
    let aggregates = aggregate_lines(&records);
    assert_eq!(aggregates.len(), 3);
    assert!(aggregates[1].contains("_median"));
}

#[test]
fn manual_time_suffix_for_flush_variants() {
    let spec = registry::find("memcpy_cpu_flush_memset").unwrap();
    let records = run_point(spec, &[1], &quick(1, 1_500)).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].display_name().ends_with("/manual_time"));
    assert!(aggregate_lines(&records).is_empty());
}

#[test]
fn setup_errors_carry_the_label() {
    let spec = registry::find("memcpy_cpu_flush").unwrap();
    let err = run_point(spec, &[0], &quick(1, 1)).unwrap_err();
    assert!(matches!(err, RunError::Setup { .. }));
    assert!(err.to_string().starts_with("memcpy_cpu_flush/0: "));
}
