//! User counters attached to every run, and repetition statistics.
//!
//! Each experiment reports three counters:
//!
//! | Name        | Kind                      | Scale  |
//! |-------------|---------------------------|--------|
//! | `Speed`     | bytes/iteration as a rate | 1024   |
//! | `NumCopies` | absolute                  | 1000   |
//! | `Allocated` | absolute                  | 1024   |
//!
//! An iteration-invariant rate multiplies its per-iteration value by the
//! iteration count and divides by the reported (measured) time, so `Speed`
//! is bytes copied per second of copy time.

use std::time::Duration;

/// How a counter value is turned into the reported number.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// Reported as is.
    Absolute,
    /// `value * iterations / seconds`.
    IterationInvariantRate,
}

/// Step between human-readable suffixes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scale {
    /// 1000.
    Decimal,
    /// 1024.
    Binary,
}

impl Scale {
    #[inline]
    fn base(self) -> f64 {
        match self {
            Self::Decimal => 1000.0,
            Self::Binary => 1024.0,
        }
    }
}

/// A named counter before resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Counter {
    pub name: &'static str,
    pub value: f64,
    pub kind: Kind,
    pub scale: Scale,
}

impl Counter {
    /// Reported value for a run of `iterations` that took `elapsed`.
    ///
    /// Rates over a zero duration resolve to zero.
    pub fn resolve(&self, iterations: u64, elapsed: Duration) -> f64 {
        match self.kind {
            Kind::Absolute => self.value,
            Kind::IterationInvariantRate => {
                let secs = elapsed.as_secs_f64();
                if secs > 0.0 {
                    self.value * iterations as f64 / secs
                } else {
                    0.0
                }
            }
        }
    }

    /// Formats a resolved value with this counter's scale, appending `/s`
    /// for rates.
    pub fn format(&self, resolved: f64) -> String {
        let mut text = human(resolved, self.scale);
        if self.kind == Kind::IterationInvariantRate {
            text.push_str("/s");
        }
        text
    }
}

/// Sizes one experiment reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Footprint {
    /// Bytes copied per iteration.
    pub bytes_per_iteration: usize,
    /// Replicas rotated over.
    pub num_copies: usize,
    /// Bytes allocated for replicas and flush buffers.
    pub allocated: usize,
}

impl Footprint {
    /// `Speed`, `NumCopies`, `Allocated`, in that order.
    pub fn counters(&self) -> [Counter; 3] {
        [
            Counter {
                name: "Speed",
                value: self.bytes_per_iteration as f64,
                kind: Kind::IterationInvariantRate,
                scale: Scale::Binary,
            },
            Counter {
                name: "NumCopies",
                value: self.num_copies as f64,
                kind: Kind::Absolute,
                scale: Scale::Decimal,
            },
            Counter {
                name: "Allocated",
                value: self.allocated as f64,
                kind: Kind::Absolute,
                scale: Scale::Binary,
            },
        ]
    }

    /// Resolved counters rendered as `Name=value` pairs.
    pub fn render(&self, iterations: u64, elapsed: Duration) -> String {
        self.counters()
            .iter()
            .map(|c| format!("{}={}", c.name, c.format(c.resolve(iterations, elapsed))))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

const SUFFIXES: [&str; 5] = ["", "k", "M", "G", "T"];

/// Renders `value` with a `k`/`M`/`G`/`T` suffix in steps of the scale
/// base, keeping up to five significant digits.
pub fn human(value: f64, scale: Scale) -> String {
    let base = scale.base();
    let mut scaled = value;
    let mut idx = 0;
    while scaled.abs() >= base && idx < SUFFIXES.len() - 1 {
        scaled /= base;
        idx += 1;
    }
    let digits = if scaled.abs() >= 100.0 {
        2
    } else if scaled.abs() >= 10.0 {
        3
    } else {
        4
    };
    let mut text = format!("{scaled:.digits$}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    text.push_str(SUFFIXES[idx]);
    text
}

/// Aggregates over repetitions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; zero for a single value.
    pub stddev: f64,
}

/// Mean, median and sample stddev of `values`; `None` when empty.
pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let stddev = if values.len() > 1 {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    } else {
        0.0
    };

    Some(Summary {
        mean,
        median,
        stddev,
    })
}
