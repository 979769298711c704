//! Iteration timing.
//!
//! Harness-timed experiments are measured as wall time around the whole
//! iteration loop, eviction included. Manual-timed experiments time only
//! the copy section of each iteration through [`IterClock::measure`] and
//! report the sum, so eviction work never shows up in the result.

use std::hint::black_box;
use std::time::{Duration, Instant};

use crate::evict::EvictError;
use crate::experiments::Experiment;

/// Who measures an iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timing {
    /// Wall time around the full loop.
    Harness,
    /// Sum of the sections passed to [`IterClock::measure`].
    Manual,
}

impl Timing {
    /// Suffix used in report lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Harness => "",
            Self::Manual => "/manual_time",
        }
    }
}

/// Per-run accumulator handed to [`Experiment::iterate`].
#[derive(Clone, Debug)]
pub struct IterClock {
    timing: Timing,
    measured: Duration,
    sections: u64,
}

impl IterClock {
    /// Starts an empty clock.
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            measured: Duration::ZERO,
            sections: 0,
        }
    }

    /// Runs `f`, timing it when the clock is manual.
    #[inline(always)]
    pub fn measure<R>(&mut self, f: impl FnOnce() -> R) -> R {
        match self.timing {
            Timing::Harness => f(),
            Timing::Manual => {
                let start = Instant::now();
                let result = f();
                self.record(start.elapsed());
                result
            }
        }
    }

    /// Adds an externally measured section.
    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        self.measured += elapsed;
        self.sections += 1;
    }

    /// Total measured time.
    #[inline]
    pub fn total(&self) -> Duration {
        self.measured
    }

    /// Sections recorded so far.
    #[inline]
    pub fn sections(&self) -> u64 {
        self.sections
    }

    /// Timing mode.
    #[inline]
    pub fn timing(&self) -> Timing {
        self.timing
    }
}

/// Runs `iters` iterations of `experiment` and returns the time to report.
///
/// # Errors
/// Propagates the first eviction failure; iterations before it still ran.
pub fn drive(experiment: &mut dyn Experiment, iters: u64) -> Result<Duration, EvictError> {
    let timing = experiment.timing();
    let mut clock = IterClock::new(timing);
    let start = Instant::now();
    for _ in 0..iters {
        experiment.iterate(&mut clock)?;
    }
    let wall = start.elapsed();
    black_box(&clock);
    Ok(match timing {
        Timing::Harness => wall,
        Timing::Manual => clock.total(),
    })
}

/// Short sleep after a line flush so the flush retires before the next
/// timed copy.
#[inline]
pub fn pause() {
    std::thread::sleep(Duration::from_nanos(1));
}
