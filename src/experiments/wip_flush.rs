//! `memcpy_wip_flush`: data and translation eviction inside one region.
//!
//! A single mapping aligned to a 1 GiB boundary holds the packed replicas at
//! its start and a guarded flush window from its midpoint, so every access
//! goes through the same top-level page-table entry. On wrap the protection
//! of the whole region is toggled (dropping TLB entries), then the flush
//! window is overwritten byte by byte (evicting the data).
//!
//! ```text
//! 0            replicas            len/2   guard | flush | guard     len
//! |<-- 1000 x 17234 -->|   ...     |       ......|#######|......     |
//! ```

use std::hint::black_box;

use crate::arena::ByteArena;
use crate::copy::copy_plan;
use crate::counters::Footprint;
use crate::error::SetupError;
use crate::evict::{EvictError, FillStrategy, FlushWindow, HostMemory, MemoryControl};
use crate::geometry::{
    CopyPlan, OutputBuffer, DEFAULT_REPLICAS, FLUSH_MULTIPLIER, HUGE_PAGE, MIB, OUTPUT_LEN,
    PAGE_SIZE, SOURCE_LEN,
};
use crate::replica::{ReplicaLayout, ReplicaSet};
use crate::rotation::Rotation;
use crate::timing::{IterClock, Timing};
use crate::vmem::VmemRegion;

use super::{output_matches, source_buffer, Experiment};

const NAME: &str = "memcpy_wip_flush";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WipFlushConfig {
    pub flush_len: usize,
    /// Padding between the midpoint and the flush window, and after it.
    pub guard: usize,
    pub replicas: usize,
    /// Usable length of the mapping.
    pub region_len: usize,
    pub region_align: usize,
}

impl WipFlushConfig {
    /// Flush of `4 * cache_mib` MiB with `guard_mib` MiB guards in a 1 GiB
    /// region.
    pub fn new(cache_mib: usize, guard_mib: usize) -> Result<Self, SetupError> {
        let out_of_range = |arg, value: usize| SetupError::ArgumentOutOfRange {
            name: NAME,
            arg,
            value: value as u64,
        };
        let flush_len = cache_mib
            .checked_mul(MIB * FLUSH_MULTIPLIER)
            .filter(|&len| len > 0)
            .ok_or_else(|| out_of_range("cache_mib", cache_mib))?;
        let guard = guard_mib
            .checked_mul(MIB)
            .ok_or_else(|| out_of_range("guard_mib", guard_mib))?;
        let config = Self {
            flush_len,
            guard,
            replicas: DEFAULT_REPLICAS,
            region_len: HUGE_PAGE,
            region_align: HUGE_PAGE,
        };
        config.flush_offset()?;
        Ok(config)
    }

    /// Offset of the flush window inside the region.
    ///
    /// # Errors
    /// `ArgumentOutOfRange` when the replicas overlap the second half or the
    /// guarded window does not fit in it.
    pub fn flush_offset(&self) -> Result<usize, SetupError> {
        let half = self.region_len / 2;
        let replicas_end = SOURCE_LEN.checked_mul(self.replicas);
        let window_end = self
            .guard
            .checked_mul(2)
            .and_then(|g| g.checked_add(self.flush_len))
            .and_then(|v| v.checked_add(half));
        match (replicas_end, window_end) {
            (Some(r), Some(w)) if r <= half && w <= self.region_len => Ok(half + self.guard),
            _ => Err(SetupError::ArgumentOutOfRange {
                name: NAME,
                arg: "flush_len",
                value: self.flush_len as u64,
            }),
        }
    }
}

pub struct WipFlush<M: MemoryControl = HostMemory> {
    config: WipFlushConfig,
    memory: M,
    source: ByteArena,
    replicas: ReplicaSet<VmemRegion>,
    window: FlushWindow,
    rotation: Rotation,
    out: OutputBuffer,
}

impl WipFlush<HostMemory> {
    pub fn new(config: WipFlushConfig) -> Result<Self, SetupError> {
        Self::with_memory(config, HostMemory::new())
    }
}

impl<M: MemoryControl> WipFlush<M> {
    /// Maps the region, places replicas, then runs the first toggle and
    /// flush.
    pub fn with_memory(config: WipFlushConfig, memory: M) -> Result<Self, SetupError> {
        if !memory.capabilities().translation {
            return Err(EvictError::Unsupported {
                capability: "translation invalidation",
            }
            .into());
        }
        CopyPlan::STANDARD.validate(SOURCE_LEN, OUTPUT_LEN)?;
        let flush_offset = config.flush_offset()?;

        let region = VmemRegion::reserve_aligned(config.region_len, config.region_align)?;
        let source = source_buffer()?;
        let layout = ReplicaLayout::packed(SOURCE_LEN, config.replicas);
        let replicas = ReplicaSet::in_store(region, layout, source.as_slice())?;
        let window = FlushWindow::new(flush_offset, config.flush_len, FillStrategy::ByteLoop);

        let mut exp = Self {
            config,
            memory,
            source,
            rotation: Rotation::new(replicas.count()),
            replicas,
            window,
            out: [0; OUTPUT_LEN],
        };
        exp.evict()?;
        Ok(exp)
    }

    fn evict(&mut self) -> Result<(), EvictError> {
        self.memory
            .invalidate_translation(self.replicas.store_mut())?;
        self.window
            .overwrite(self.replicas.store_mut())
            .map_err(EvictError::Window)?;
        Ok(())
    }

    /// The flush window description.
    pub fn window(&self) -> &FlushWindow {
        &self.window
    }

    /// Current first byte of the flush window.
    pub fn marker(&self) -> u8 {
        self.window
            .marker(self.replicas.store())
            .unwrap_or_default()
    }

    pub fn replicas(&self) -> &ReplicaSet<VmemRegion> {
        &self.replicas
    }
}

impl<M: MemoryControl> Experiment for WipFlush<M> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn timing(&self) -> Timing {
        Timing::Manual
    }

    fn footprint(&self) -> Footprint {
        let config = &self.config;
        Footprint {
            bytes_per_iteration: CopyPlan::STANDARD.footprint(),
            num_copies: self.replicas.count(),
            allocated: config.flush_len
                + 2 * config.guard
                + SOURCE_LEN * config.replicas
                + PAGE_SIZE,
        }
    }

    #[inline]
    fn iterate(&mut self, clock: &mut IterClock) -> Result<(), EvictError> {
        let turn = self.rotation.advance();
        let src = self.replicas.replica(turn.index);
        let out = &mut self.out;
        clock.measure(|| copy_plan(&CopyPlan::STANDARD, src, out));
        black_box(&mut self.out);

        if turn.wrapped {
            self.evict()?;
        }
        Ok(())
    }

    fn verify(&self) -> bool {
        let source = self.source.as_slice();
        self.replicas.verify(source) && output_matches(&CopyPlan::STANDARD, source, &self.out)
    }
}
