//! The benchmark variants.
//!
//! Every variant follows the same shape: allocate a source buffer and its
//! replicas, optionally set up an eviction mechanism, then on each iteration
//! copy a few spans of the current replica into a 3 KiB output buffer,
//! advance the rotation, and evict when it wraps. Construction does all
//! fallible work; the first eviction also happens there so the first
//! measured iteration already starts cold.
//!
//! | Variant                            | Module          | Timing  |
//! |------------------------------------|-----------------|---------|
//! | `memcpy_baseline_inline`           | [`baseline`]    | harness |
//! | `memcpy_clflush`                   | [`clflush`]     | manual  |
//! | `cache_flushing_clflush`           | [`clflush`]     | manual  |
//! | `memcpy_cpu_flush{,_memset}`       | [`cpu_flush`]   | manual  |
//! | `memcpy_cpu_flush_padded`          | [`cpu_flush`]   | manual  |
//! | `cache_flushing_flush_std_memset`  | [`cpu_flush`]   | manual  |
//! | `memcpy_copies_padded`             | [`cpu_flush`]   | manual  |
//! | `memcpy_tlb`                       | [`capacity`]    | harness |
//! | `memcpy_32mb_l3`                   | [`capacity`]    | harness |
//! | `memcpy_vmem_tlb_flush`            | `vmem_tlb`      | manual  |
//! | `memcpy_wip_flush`                 | `wip_flush`     | manual  |

pub mod baseline;
pub mod capacity;
pub mod clflush;
pub mod cpu_flush;
#[cfg(all(unix, feature = "vmem"))]
pub mod vmem_tlb;
#[cfg(all(unix, feature = "vmem"))]
pub mod wip_flush;

pub use baseline::InlineBaseline;
pub use capacity::CapacityRotation;
pub use clflush::{LineFlushConfig, LineFlushCopy};
pub use cpu_flush::{CpuFlush, CpuFlushConfig};
#[cfg(all(unix, feature = "vmem"))]
pub use vmem_tlb::VmemTlbFlush;
#[cfg(all(unix, feature = "vmem"))]
pub use wip_flush::{WipFlush, WipFlushConfig};

use crate::arena::{ArenaError, ByteArena};
use crate::counters::Footprint;
use crate::evict::EvictError;
use crate::geometry::{CopyPlan, SOURCE_FILL, SOURCE_LEN};
use crate::timing::{IterClock, Timing};

/// One configured benchmark instance.
///
/// Instances own all their buffers; dropping one releases everything it
/// allocated.
pub trait Experiment {
    /// Registered variant name, without arguments.
    fn name(&self) -> &'static str;

    /// Whether [`iterate`](Self::iterate) times its own copy section.
    fn timing(&self) -> Timing;

    /// Sizes reported as counters. Fixed at construction.
    fn footprint(&self) -> Footprint;

    /// Runs one iteration: copy, advance, evict on wrap.
    fn iterate(&mut self, clock: &mut IterClock) -> Result<(), EvictError>;

    /// True if the replicas still hold the source bytes and the output holds
    /// what the copy plan produces. Meaningful after at least one iteration.
    fn verify(&self) -> bool;
}

/// The 17234 byte source buffer filled with the marker byte.
pub(crate) fn source_buffer() -> Result<ByteArena, ArenaError> {
    ByteArena::filled(SOURCE_LEN, SOURCE_FILL)
}

/// True if `out` holds the bytes `plan` copies out of `source`.
pub fn output_matches(plan: &CopyPlan, source: &[u8], out: &[u8]) -> bool {
    plan.placements().all(|p| {
        let Some(end) = p.span.src_end() else {
            return false;
        };
        let dst_end = p.dst_offset + p.span.len;
        dst_end <= out.len()
            && end <= source.len()
            && out[p.dst_offset..dst_end] == source[p.span.src_offset..end]
    })
}
