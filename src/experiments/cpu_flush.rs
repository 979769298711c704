//! Capacity eviction by overwriting a flush buffer.
//!
//! Replicas are read in rotation; when the rotation wraps, a flush buffer
//! several times the cache size is overwritten, so every replica read in
//! the next round misses. Only the copies are timed.
//!
//! Variants built from [`CpuFlushConfig`]:
//! - `memcpy_cpu_flush` / `memcpy_cpu_flush_memset`: byte loop vs library
//!   fill, cache size swept in MiB.
//! - `memcpy_cpu_flush_padded`: byte loop with guard padding around the
//!   flush window, guard swept in MiB.
//! - `cache_flushing_flush_std_memset`: library fill, single copy.
//! - `memcpy_copies_padded`: four byte-loop copies, replica slots padded to
//!   the argument and based on a 2 MiB boundary.

use std::hint::black_box;

use crate::arena::ByteArena;
use crate::copy::CopyKernel;
use crate::counters::Footprint;
use crate::error::SetupError;
use crate::evict::{EvictError, FillStrategy, FlushBuffer};
use crate::geometry::{
    CopyPlan, OutputBuffer, DEFAULT_REPLICAS, FLUSH_MULTIPLIER, LARGE_PAGE, MIB, OUTPUT_LEN,
    PAGE_SIZE, SOURCE_LEN,
};
use crate::replica::{ReplicaLayout, ReplicaSet};
use crate::rotation::Rotation;
use crate::timing::{IterClock, Timing};

use super::{output_matches, source_buffer, Experiment};

/// Everything that distinguishes one flush-buffer variant from another.
#[derive(Clone, Copy, Debug)]
pub struct CpuFlushConfig {
    pub name: &'static str,
    /// Bytes overwritten per flush.
    pub flush_len: usize,
    /// Untouched padding on each side of the flush window.
    pub guard: usize,
    pub fill: FillStrategy,
    pub plan: CopyPlan,
    pub kernel: CopyKernel,
    pub replicas: ReplicaLayout,
}

impl CpuFlushConfig {
    fn standard(name: &'static str, cache_mib: usize, fill: FillStrategy) -> Result<Self, SetupError> {
        Ok(Self {
            name,
            flush_len: flush_len_for(name, cache_mib)?,
            guard: 0,
            fill,
            plan: CopyPlan::STANDARD,
            kernel: CopyKernel::Library,
            replicas: ReplicaLayout::packed(SOURCE_LEN, DEFAULT_REPLICAS).base_align(PAGE_SIZE),
        })
    }

    /// `memcpy_cpu_flush`: byte-loop flush of `4 * cache_mib` MiB.
    pub fn byte_loop(cache_mib: usize) -> Result<Self, SetupError> {
        Self::standard("memcpy_cpu_flush", cache_mib, FillStrategy::ByteLoop)
    }

    /// `memcpy_cpu_flush_memset`: library fill of `4 * cache_mib` MiB.
    pub fn memset(cache_mib: usize) -> Result<Self, SetupError> {
        Self::standard("memcpy_cpu_flush_memset", cache_mib, FillStrategy::Library)
    }

    /// `cache_flushing_flush_std_memset`: library fill, one 401 byte copy.
    pub fn single_memset(cache_mib: usize) -> Result<Self, SetupError> {
        let mut config = Self::standard(
            "cache_flushing_flush_std_memset",
            cache_mib,
            FillStrategy::Library,
        )?;
        config.plan = CopyPlan::SINGLE;
        Ok(config)
    }

    /// `memcpy_cpu_flush_padded`: 8 MiB cache estimate, `guard_mib` MiB of
    /// padding on each side of the flush window.
    pub fn padded(guard_mib: usize) -> Result<Self, SetupError> {
        let name = "memcpy_cpu_flush_padded";
        let mut config = Self::standard(name, 8, FillStrategy::ByteLoop)?;
        config.guard = mib(name, "guard_mib", guard_mib)?;
        Ok(config)
    }

    /// `memcpy_copies_padded`: slots rounded up to `padding` bytes (0 keeps
    /// them packed), four byte-loop copies, fixed 32 MiB flush with 16 MiB
    /// guards.
    pub fn copies_padded(padding: usize) -> Self {
        let replicas = ReplicaLayout::packed(SOURCE_LEN, DEFAULT_REPLICAS)
            .slot_multiple(padding.max(1))
            .base_align(LARGE_PAGE);
        Self {
            name: "memcpy_copies_padded",
            flush_len: 8 * MIB * FLUSH_MULTIPLIER,
            guard: 16 * MIB,
            fill: FillStrategy::ByteLoop,
            plan: CopyPlan::WITH_TRAILER,
            kernel: CopyKernel::Bytewise,
            replicas,
        }
    }
}

fn mib(name: &'static str, arg: &'static str, value: usize) -> Result<usize, SetupError> {
    value.checked_mul(MIB).ok_or(SetupError::ArgumentOutOfRange {
        name,
        arg,
        value: value as u64,
    })
}

fn flush_len_for(name: &'static str, cache_mib: usize) -> Result<usize, SetupError> {
    if cache_mib == 0 {
        return Err(SetupError::ArgumentOutOfRange {
            name,
            arg: "cache_mib",
            value: 0,
        });
    }
    mib(name, "cache_mib", cache_mib)?
        .checked_mul(FLUSH_MULTIPLIER)
        .ok_or(SetupError::ArgumentOutOfRange {
            name,
            arg: "cache_mib",
            value: cache_mib as u64,
        })
}

pub struct CpuFlush {
    config: CpuFlushConfig,
    source: ByteArena,
    replicas: ReplicaSet,
    rotation: Rotation,
    flush: FlushBuffer,
    out: OutputBuffer,
}

impl CpuFlush {
    /// Allocates replicas and the flush buffer, then runs the first flush.
    pub fn new(config: CpuFlushConfig) -> Result<Self, SetupError> {
        config.plan.validate(config.replicas.source_len, OUTPUT_LEN)?;
        let source = source_buffer()?;
        let replicas = ReplicaSet::in_arena(config.replicas, source.as_slice())?;
        let mut flush = FlushBuffer::new(config.flush_len, config.guard, config.fill)?;
        flush.overwrite();
        Ok(Self {
            config,
            source,
            rotation: Rotation::new(replicas.count()),
            replicas,
            flush,
            out: [0; OUTPUT_LEN],
        })
    }

    /// The flush buffer, for inspecting the fill marker.
    pub fn flush(&self) -> &FlushBuffer {
        &self.flush
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }
}

impl Experiment for CpuFlush {
    fn name(&self) -> &'static str {
        self.config.name
    }

    fn timing(&self) -> Timing {
        Timing::Manual
    }

    fn footprint(&self) -> Footprint {
        Footprint {
            bytes_per_iteration: self.config.plan.footprint(),
            num_copies: self.replicas.count(),
            allocated: self.flush.allocated() + self.replicas.allocated(),
        }
    }

    #[inline]
    fn iterate(&mut self, clock: &mut IterClock) -> Result<(), EvictError> {
        let turn = self.rotation.advance();
        let (plan, kernel) = (self.config.plan, self.config.kernel);
        let src = self.replicas.replica(turn.index);
        let out = &mut self.out;
        clock.measure(|| kernel.run(&plan, src, out));
        black_box(&mut self.out);

        if turn.wrapped {
            self.flush.overwrite();
        }
        Ok(())
    }

    fn verify(&self) -> bool {
        let source = self.source.as_slice();
        self.replicas.verify(source) && output_matches(&self.config.plan, source, &self.out)
    }
}
