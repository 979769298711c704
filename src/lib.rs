//! Micro-benchmarks for the cost of cache and TLB misses on small copies.
//!
//! ## Scope
//! Each benchmark copies a few fixed spans (401, 801 and 301 bytes in the
//! common case) from a 17234 byte source into a 3 KiB output buffer, and
//! varies only where the source bytes and their page translations live when
//! the copy starts: warm in L1, evicted by a line flush, evicted by
//! overwriting a buffer larger than the cache, or with their TLB entries
//! dropped by a protection change.
//!
//! ## Key invariants
//! - Every replica is byte-identical to the source, and every iteration
//!   writes the same output bytes (checked by [`Experiment::verify`]).
//! - Output spans are contiguous and disjoint: destination offsets are the
//!   running sum of span lengths.
//! - Eviction runs when the replica rotation wraps, and once before the
//!   first measured iteration.
//! - All fallible work happens while building an experiment; the measured
//!   loop only fails if the OS rejects a protection change.
//!
//! ## Flow (one iteration)
//! `Rotation -> replica slice -> copy kernel (timed) -> output -> evict on wrap`
//!
//! ## Notable entry points
//! - [`registry`]: every variant with its sweep, repetitions and iteration
//!   count.
//! - [`Experiment`] and [`timing::drive`]: build and run one variant.
//! - [`runner`]: calibration, repetitions and report lines for the binary.
//! - [`evict::MemoryControl`]: per-platform line flush and translation
//!   invalidation.

pub mod arena;
pub mod config;
pub mod copy;
pub mod counters;
pub mod error;
pub mod evict;
pub mod experiments;
pub mod geometry;
pub mod registry;
pub mod replica;
pub mod rotation;
pub mod runner;
#[cfg(test)]
pub mod test_utils;
pub mod timing;
pub mod util;
#[cfg(all(unix, feature = "vmem"))]
pub mod vmem;

pub use arena::{ArenaError, ByteArena, ByteStore};
pub use counters::{Counter, Footprint};
pub use error::{SetupError, VmemError};
pub use evict::{Capabilities, EvictError, FillStrategy, FlushBuffer, HostMemory, MemoryControl};
pub use experiments::Experiment;
pub use geometry::{CopyPlan, CopySpan, PlanError};
pub use registry::BenchSpec;
pub use replica::{ReplicaLayout, ReplicaSet};
pub use rotation::{Rotation, Turn};
pub use timing::{drive, IterClock, Timing};
#[cfg(all(unix, feature = "vmem"))]
pub use vmem::{Protection, VmemRegion};
