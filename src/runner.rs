//! Repetition and reporting driver used by the `vmemprof` binary.
//!
//! For each sweep point the runner picks an iteration count (the variant's
//! fixed count, a user override, or calibration), then performs
//! `repetitions` independent runs. Each run builds a fresh experiment, so
//! allocation and the initial eviction are repeated per run, and checks
//! copy fidelity after measuring.
//!
//! Report lines follow the familiar layout:
//!
//! ```text
//! memcpy_cpu_flush/8/repeats:4/manual_time        147 ns  Speed=9.663G/s NumCopies=1k Allocated=48.44M
//! memcpy_cpu_flush/8/repeats:4/manual_time_mean   146 ns  ...
//! ```

use std::fmt;
use std::time::Duration;

use crate::counters::{summarize, Counter, Footprint};
use crate::error::SetupError;
use crate::evict::EvictError;
use crate::registry::BenchSpec;
use crate::timing::{drive, Timing};

/// Calibration stops doubling here.
pub const MAX_ITERATIONS: u64 = 1_000_000_000;

/// Default minimum measured time per calibrated run.
pub const DEFAULT_MIN_TIME: Duration = Duration::from_millis(500);

/// Knobs shared by every sweep point.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub min_time: Duration,
    /// Overrides each variant's repetition count.
    pub repetitions: Option<u32>,
    /// Overrides each variant's iteration count and skips calibration.
    pub iterations: Option<u64>,
    pub verbose: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            min_time: DEFAULT_MIN_TIME,
            repetitions: None,
            iterations: None,
            verbose: false,
        }
    }
}

/// Why a sweep point could not be measured.
#[derive(Debug)]
#[non_exhaustive]
pub enum RunError {
    Setup { label: String, source: SetupError },
    Evict { label: String, source: EvictError },
    /// The output or replicas did not hold the expected bytes after a run.
    Fidelity { label: String },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup { label, source } => write!(f, "{label}: {source}"),
            Self::Evict { label, source } => write!(f, "{label}: {source}"),
            Self::Fidelity { label } => write!(f, "{label}: copied bytes do not match the source"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Setup { source, .. } => Some(source),
            Self::Evict { source, .. } => Some(source),
            Self::Fidelity { .. } => None,
        }
    }
}

/// Result of one repetition.
#[derive(Clone, Debug)]
pub struct RunRecord {
    /// `name/args`.
    pub label: String,
    pub iterations: u64,
    pub repetitions: u32,
    /// Fixed iteration count shown in the name.
    pub fixed_iterations: bool,
    pub timing: Timing,
    pub elapsed: Duration,
    pub footprint: Footprint,
}

impl RunRecord {
    /// Reported time per iteration in nanoseconds.
    pub fn ns_per_iter(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() * 1e9 / self.iterations as f64
    }

    /// Counter values resolved for this run.
    pub fn resolved(&self) -> [f64; 3] {
        self.footprint
            .counters()
            .map(|c| c.resolve(self.iterations, self.elapsed))
    }

    /// Full report name, e.g. `memcpy_clflush/iterations:100000/manual_time`.
    pub fn display_name(&self) -> String {
        let mut name = self.label.clone();
        if self.fixed_iterations {
            name.push_str(&format!("/iterations:{}", self.iterations));
        }
        if self.repetitions > 1 {
            name.push_str(&format!("/repeats:{}", self.repetitions));
        }
        name.push_str(self.timing.label());
        name
    }

    /// One report line.
    pub fn render(&self) -> String {
        format_line(
            &self.display_name(),
            self.ns_per_iter(),
            &self.footprint.counters(),
            &self.resolved(),
        )
    }
}

fn format_line(name: &str, ns: f64, counters: &[Counter; 3], values: &[f64; 3]) -> String {
    let rendered: Vec<String> = counters
        .iter()
        .zip(values)
        .map(|(c, v)| format!("{}={}", c.name, c.format(*v)))
        .collect();
    format!("{name:<60} {ns:>10.1} ns  {}", rendered.join(" "))
}

/// Mean, median and stddev lines over `records` (same sweep point). Empty
/// when there are fewer than two records.
pub fn aggregate_lines(records: &[RunRecord]) -> Vec<String> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    if records.len() < 2 {
        return Vec::new();
    }
    let counters = first.footprint.counters();
    let name = first.display_name();

    let ns: Vec<f64> = records.iter().map(RunRecord::ns_per_iter).collect();
    let resolved: Vec<[f64; 3]> = records.iter().map(RunRecord::resolved).collect();
    let column = |i: usize| -> Vec<f64> { resolved.iter().map(|r| r[i]).collect() };
    let (Some(ns), Some(c0), Some(c1), Some(c2)) = (
        summarize(&ns),
        summarize(&column(0)),
        summarize(&column(1)),
        summarize(&column(2)),
    ) else {
        return Vec::new();
    };

    vec![
        format_line(
            &format!("{name}_mean"),
            ns.mean,
            &counters,
            &[c0.mean, c1.mean, c2.mean],
        ),
        format_line(
            &format!("{name}_median"),
            ns.median,
            &counters,
            &[c0.median, c1.median, c2.median],
        ),
        format_line(
            &format!("{name}_stddev"),
            ns.stddev,
            &counters,
            &[c0.stddev, c1.stddev, c2.stddev],
        ),
    ]
}

/// Doubles the iteration count from 1 until one run reports at least
/// `min_time`, using a single instance.
pub fn calibrate(spec: &BenchSpec, args: &[u64], min_time: Duration) -> Result<u64, RunError> {
    let label = spec.label(args);
    let mut exp = spec.build(args).map_err(|source| RunError::Setup {
        label: label.clone(),
        source,
    })?;
    let mut iterations = 1u64;
    loop {
        let elapsed = drive(exp.as_mut(), iterations).map_err(|source| RunError::Evict {
            label: label.clone(),
            source,
        })?;
        if elapsed >= min_time || iterations >= MAX_ITERATIONS {
            return Ok(iterations);
        }
        iterations = (iterations * 2).min(MAX_ITERATIONS);
    }
}

/// Measures one sweep point.
pub fn run_point(
    spec: &BenchSpec,
    args: &[u64],
    settings: &RunSettings,
) -> Result<Vec<RunRecord>, RunError> {
    let label = spec.label(args);
    let repetitions = settings.repetitions.unwrap_or(spec.repetitions).max(1);
    let fixed = settings.iterations.or(spec.iterations);
    let iterations = match fixed {
        Some(n) => n.max(1),
        None => {
            let n = calibrate(spec, args, settings.min_time)?;
            if settings.verbose {
                eprintln!("{label}: calibrated to {n} iterations");
            }
            n
        }
    };

    let mut records = Vec::with_capacity(repetitions as usize);
    for rep in 0..repetitions {
        if settings.verbose {
            eprintln!("{label}: repetition {}/{repetitions}", rep + 1);
        }
        let mut exp = spec.build(args).map_err(|source| RunError::Setup {
            label: label.clone(),
            source,
        })?;
        let elapsed = drive(exp.as_mut(), iterations).map_err(|source| RunError::Evict {
            label: label.clone(),
            source,
        })?;
        if !exp.verify() {
            return Err(RunError::Fidelity { label });
        }
        records.push(RunRecord {
            label: label.clone(),
            iterations,
            repetitions,
            fixed_iterations: fixed.is_some(),
            timing: exp.timing(),
            elapsed,
            footprint: exp.footprint(),
        });
    }
    Ok(records)
}
