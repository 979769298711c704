//! Line-flush variants: `memcpy_clflush` and `cache_flushing_clflush`.
//!
//! One source buffer, no replicas. After every timed copy the lines of the
//! whole source are flushed, so each copy reads from memory. The
//! `memcpy_clflush` flavour also sleeps briefly after the flush so the
//! flushes have retired before the next timed section.

use std::hint::black_box;

use crate::arena::ByteArena;
use crate::copy::copy_plan;
use crate::counters::Footprint;
use crate::error::SetupError;
use crate::evict::{EvictError, HostMemory, MemoryControl};
use crate::geometry::{CopyPlan, OutputBuffer, OUTPUT_LEN, SOURCE_LEN};
use crate::timing::{pause, IterClock, Timing};

use super::{output_matches, source_buffer, Experiment};

/// Configuration for [`LineFlushCopy`].
#[derive(Clone, Copy, Debug)]
pub struct LineFlushConfig {
    pub name: &'static str,
    pub plan: CopyPlan,
    /// Sleep after each flush.
    pub pause: bool,
}

impl LineFlushConfig {
    /// Three copies, flush, pause.
    pub const MEMCPY: LineFlushConfig = LineFlushConfig {
        name: "memcpy_clflush",
        plan: CopyPlan::STANDARD,
        pause: true,
    };

    /// One 401 byte copy, flush.
    pub const SINGLE: LineFlushConfig = LineFlushConfig {
        name: "cache_flushing_clflush",
        plan: CopyPlan::SINGLE,
        pause: false,
    };
}

pub struct LineFlushCopy<M: MemoryControl = HostMemory> {
    config: LineFlushConfig,
    memory: M,
    source: ByteArena,
    out: OutputBuffer,
    lines_flushed: u64,
}

impl LineFlushCopy<HostMemory> {
    /// Builds the variant on the host.
    pub fn new(config: LineFlushConfig) -> Result<Self, SetupError> {
        Self::with_memory(config, HostMemory::new())
    }
}

impl<M: MemoryControl> LineFlushCopy<M> {
    /// Builds the variant over a specific [`MemoryControl`].
    ///
    /// # Errors
    /// [`EvictError::Unsupported`] when `memory` has no line flush.
    pub fn with_memory(config: LineFlushConfig, memory: M) -> Result<Self, SetupError> {
        if !memory.capabilities().line_flush {
            return Err(EvictError::Unsupported {
                capability: "cache line flush",
            }
            .into());
        }
        config.plan.validate(SOURCE_LEN, OUTPUT_LEN)?;
        let source = source_buffer()?;
        let mut exp = Self {
            config,
            memory,
            source,
            out: [0; OUTPUT_LEN],
            lines_flushed: 0,
        };
        exp.evict()?;
        Ok(exp)
    }

    /// Total flush instructions issued.
    pub fn lines_flushed(&self) -> u64 {
        self.lines_flushed
    }

    #[inline]
    fn evict(&mut self) -> Result<(), EvictError> {
        let lines = self.memory.evict_cache_lines(self.source.as_slice())?;
        self.lines_flushed += lines as u64;
        Ok(())
    }
}

impl<M: MemoryControl> Experiment for LineFlushCopy<M> {
    fn name(&self) -> &'static str {
        self.config.name
    }

    fn timing(&self) -> Timing {
        Timing::Manual
    }

    fn footprint(&self) -> Footprint {
        Footprint {
            bytes_per_iteration: self.config.plan.footprint(),
            num_copies: 1,
            allocated: SOURCE_LEN,
        }
    }

    #[inline]
    fn iterate(&mut self, clock: &mut IterClock) -> Result<(), EvictError> {
        let plan = self.config.plan;
        let src = self.source.as_slice();
        let out = &mut self.out;
        clock.measure(|| copy_plan(&plan, src, out));
        black_box(&mut self.out);

        self.evict()?;
        if self.config.pause {
            pause();
        }
        Ok(())
    }

    fn verify(&self) -> bool {
        output_matches(&self.config.plan, self.source.as_slice(), &self.out)
    }
}
