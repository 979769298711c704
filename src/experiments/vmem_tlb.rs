//! `memcpy_vmem_tlb_flush`: translation eviction without data eviction.
//!
//! A last-level page-table cache line holds 8 entries covering 32 KiB, so
//! replicas spaced 40 KiB or more apart each need their own table line. 32
//! replicas is enough to alias across the TLB. When the rotation wraps the
//! whole mapping has its protection revoked and restored, which drops the
//! TLB entries but leaves the page-table lines in the data cache.

use std::hint::black_box;

use crate::arena::ByteArena;
use crate::copy::copy_plan;
use crate::counters::Footprint;
use crate::error::SetupError;
use crate::evict::{EvictError, HostMemory, MemoryControl};
use crate::geometry::{CopyPlan, OutputBuffer, OUTPUT_LEN, SOURCE_LEN};
use crate::replica::{ReplicaLayout, ReplicaSet};
use crate::rotation::Rotation;
use crate::timing::{IterClock, Timing};
use crate::vmem::VmemRegion;

use super::{output_matches, source_buffer, Experiment};

/// Replicas per mapping.
pub const VMEM_REPLICAS: usize = 32;

pub struct VmemTlbFlush<M: MemoryControl = HostMemory> {
    memory: M,
    source: ByteArena,
    replicas: ReplicaSet<VmemRegion>,
    rotation: Rotation,
    out: OutputBuffer,
    toggles: u64,
}

impl VmemTlbFlush<HostMemory> {
    /// Replica slots rounded up to `padding_kib` KiB.
    pub fn new(padding_kib: usize) -> Result<Self, SetupError> {
        Self::with_memory(padding_kib, VMEM_REPLICAS, HostMemory::new())
    }
}

impl<M: MemoryControl> VmemTlbFlush<M> {
    pub fn with_memory(padding_kib: usize, count: usize, memory: M) -> Result<Self, SetupError> {
        if !memory.capabilities().translation {
            return Err(EvictError::Unsupported {
                capability: "translation invalidation",
            }
            .into());
        }
        let out_of_range = SetupError::ArgumentOutOfRange {
            name: "memcpy_vmem_tlb_flush",
            arg: "padding_kib",
            value: padding_kib as u64,
        };
        let padding = match padding_kib.checked_mul(1024) {
            Some(padding) if padding > 0 => padding,
            _ => return Err(out_of_range),
        };
        CopyPlan::STANDARD.validate(SOURCE_LEN, OUTPUT_LEN)?;

        let layout = ReplicaLayout::packed(SOURCE_LEN, count).slot_multiple(padding);
        let region = VmemRegion::reserve(layout.required_len()?)?;
        let source = source_buffer()?;
        let replicas = ReplicaSet::in_store(region, layout, source.as_slice())?;
        Ok(Self {
            memory,
            source,
            rotation: Rotation::new(replicas.count()),
            replicas,
            out: [0; OUTPUT_LEN],
            toggles: 0,
        })
    }

    /// Protection round trips performed.
    pub fn toggles(&self) -> u64 {
        self.toggles
    }

    pub fn replicas(&self) -> &ReplicaSet<VmemRegion> {
        &self.replicas
    }
}

impl<M: MemoryControl> Experiment for VmemTlbFlush<M> {
    fn name(&self) -> &'static str {
        "memcpy_vmem_tlb_flush"
    }

    fn timing(&self) -> Timing {
        Timing::Manual
    }

    fn footprint(&self) -> Footprint {
        Footprint {
            bytes_per_iteration: CopyPlan::STANDARD.footprint(),
            num_copies: self.replicas.count(),
            allocated: self.replicas.allocated(),
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
            self.memory
                .invalidate_translation(self.replicas.store_mut())?;
            self.toggles += 1;
        }
        Ok(())
    }

    fn verify(&self) -> bool {
        let source = self.source.as_slice();
        self.replicas.verify(source) && output_matches(&CopyPlan::STANDARD, source, &self.out)
    }
}
