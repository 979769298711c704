//! Shared criterion driver: one benchmark group per registry group.
//!
//! Criterion picks the iteration counts; `iter_custom` hands back the time
//! [`drive`] reports, which for manual-timed variants excludes eviction.
//! Each sweep point reuses one experiment instance across samples.

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput};
use vmemprof::registry::{self, Group};
use vmemprof::{drive, Experiment};

pub fn bench_registry_group(c: &mut Criterion, group: Group, title: &str) {
    let mut g = c.benchmark_group(title);
    g.sample_size(10);
    g.warm_up_time(Duration::from_millis(200));
    g.measurement_time(Duration::from_millis(500));

    for spec in registry::group(group) {
        for args in spec.sweep {
            let label = spec.label(args);
            let mut exp: Box<dyn Experiment> = match spec.build(args) {
                Ok(exp) => exp,
                Err(e) => {
                    eprintln!("Skipping {label}: {e}");
                    continue;
                }
            };
            let footprint = exp.footprint();
            g.throughput(Throughput::Bytes(footprint.bytes_per_iteration as u64));

            let param = if args.is_empty() {
                "default".to_string()
            } else {
                args.iter().map(u64::to_string).collect::<Vec<_>>().join("/")
            };
            let mut total_iters = 0u64;
            let mut total_time = Duration::ZERO;
            g.bench_function(BenchmarkId::new(spec.name, param), |b| {
                b.iter_custom(|iters| {
                    let elapsed = drive(exp.as_mut(), iters).expect("eviction failed");
                    total_iters += iters;
                    total_time += elapsed;
                    elapsed
                })
            });

            assert!(exp.verify(), "{label}: copied bytes do not match the source");
            eprintln!("{label}: {}", footprint.render(total_iters, total_time));
        }
    }
    g.finish();
}
