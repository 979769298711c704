//! Working-set variants with no explicit eviction: `memcpy_tlb` and
//! `memcpy_32mb_l3`.
//!
//! Both rotate over enough replicas that the data cannot stay cached:
//! - `memcpy_tlb` places each replica on its own run of pages, so with
//!   enough replicas the page translations fall out of the TLB as well. The
//!   count is swept around the point where three pages per replica exceed
//!   the TLB capacity.
//! - `memcpy_32mb_l3` packs `cache / 1503` replicas back to back, enough
//!   that the bytes touched per lap exceed the assumed last-level cache.

use std::hint::black_box;

use crate::arena::ByteArena;
use crate::copy::CopyKernel;
use crate::counters::Footprint;
use crate::error::SetupError;
use crate::evict::EvictError;
use crate::geometry::{CopyPlan, OutputBuffer, MIB, OUTPUT_LEN, PAGE_SIZE, SOURCE_LEN};
use crate::replica::{ReplicaLayout, ReplicaSet};
use crate::rotation::Rotation;
use crate::timing::{IterClock, Timing};

use super::{output_matches, source_buffer, Experiment};

pub struct CapacityRotation {
    name: &'static str,
    source: ByteArena,
    replicas: ReplicaSet,
    rotation: Rotation,
    out: OutputBuffer,
}

impl CapacityRotation {
    /// `memcpy_tlb`: `count` page-aligned replicas on page-rounded slots.
    pub fn tlb(count: usize) -> Result<Self, SetupError> {
        let layout = ReplicaLayout::packed(SOURCE_LEN, count)
            .slot_multiple(PAGE_SIZE)
            .base_align(PAGE_SIZE);
        Self::with_layout("memcpy_tlb", layout)
    }

    /// `memcpy_32mb_l3`: as many packed replicas as `cache_mib` MiB of
    /// copied bytes.
    pub fn l3(cache_mib: usize) -> Result<Self, SetupError> {
        let name = "memcpy_32mb_l3";
        let count = l3_replicas(cache_mib).ok_or(SetupError::ArgumentOutOfRange {
            name,
            arg: "cache_mib",
            value: cache_mib as u64,
        })?;
        Self::with_layout(name, ReplicaLayout::packed(SOURCE_LEN, count))
    }

    /// Rotation over an arbitrary replica layout.
    pub fn with_layout(name: &'static str, layout: ReplicaLayout) -> Result<Self, SetupError> {
        CopyPlan::STANDARD.validate(layout.source_len, OUTPUT_LEN)?;
        let source = source_buffer()?;
        let replicas = ReplicaSet::in_arena(layout, source.as_slice())?;
        Ok(Self {
            name,
            source,
            rotation: Rotation::new(replicas.count()),
            replicas,
            out: [0; OUTPUT_LEN],
        })
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }
}

/// Replica count for an assumed cache of `cache_mib` MiB; `None` when that
/// is zero or overflows.
pub fn l3_replicas(cache_mib: usize) -> Option<usize> {
    let count = cache_mib.checked_mul(MIB)? / CopyPlan::STANDARD.footprint();
    (count > 0).then_some(count)
}

impl Experiment for CapacityRotation {
    fn name(&self) -> &'static str {
        self.name
    }

    fn timing(&self) -> Timing {
        Timing::Harness
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
        clock.measure(|| CopyKernel::Library.run(&CopyPlan::STANDARD, src, out));
        black_box(&mut self.out);
        Ok(())
    }

    fn verify(&self) -> bool {
        let source = self.source.as_slice();
        self.replicas.verify(source) && output_matches(&CopyPlan::STANDARD, source, &self.out)
    }
}
