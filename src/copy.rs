//! Measured copy kernels.
//!
//! Three flavours, matching what the variants want to observe:
//! - [`copy_inline`]: lengths are compile-time constants, so the compiler is
//!   free to inline and specialize the copies.
//! - [`copy_plan`]: library `memcpy` with lengths laundered through
//!   `black_box`, so every call takes the generic runtime-length path.
//! - [`copy_plan_bytewise`]: a byte-at-a-time loop that the optimizer may not
//!   turn back into a `memcpy` call.
//!
//! Destination offsets always come from the plan's placements, so the
//! output regions are contiguous and disjoint; [`CopyPlan::copy_sequence`]
//! decides the order the copies run in.

use std::hint::black_box;

use crate::geometry::{CopyPlan, OutputBuffer};

/// Copies the standard plan with constant lengths. Returns bytes copied.
///
/// # Panics
/// Panics if `src` is shorter than the standard plan requires.
#[inline(always)]
pub fn copy_inline(src: &[u8], out: &mut OutputBuffer) -> usize {
    out[0..401].copy_from_slice(&src[102..102 + 401]);
    out[401..401 + 801].copy_from_slice(&src[6402..6402 + 801]);
    out[1202..1202 + 301].copy_from_slice(&src[16586..16586 + 301]);
    1503
}

/// Copies every span of `plan` with runtime lengths. Returns bytes copied.
///
/// # Panics
/// Panics if a span reads past `src` or writes past `out`; plans are
/// validated at experiment construction so this does not happen in practice.
#[inline]
pub fn copy_plan(plan: &CopyPlan, src: &[u8], out: &mut [u8]) -> usize {
    let mut copied = 0;
    for placement in plan.copy_sequence() {
        let len = black_box(placement.span.len);
        let from = placement.span.src_offset;
        let to = placement.dst_offset;
        out[to..to + len].copy_from_slice(&src[from..from + len]);
        copied += len;
    }
    copied
}

/// Same contract as [`copy_plan`], one byte at a time.
#[inline]
pub fn copy_plan_bytewise(plan: &CopyPlan, src: &[u8], out: &mut [u8]) -> usize {
    let mut copied = 0;
    for placement in plan.copy_sequence() {
        let len = black_box(placement.span.len);
        let from = placement.span.src_offset;
        let to = placement.dst_offset;
        copy_bytes(&mut out[to..to + len], &src[from..from + len]);
        copied += len;
    }
    copied
}

#[inline(never)]
fn copy_bytes(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        // SAFETY: `d` is a valid, exclusive reference. Volatile keeps the loop
        // from being pattern-matched into a memcpy call.
        unsafe { std::ptr::write_volatile(d, *s) };
    }
}

/// Which kernel an experiment uses for its measured copies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CopyKernel {
    /// [`copy_plan`].
    Library,
    /// [`copy_plan_bytewise`].
    Bytewise,
}

impl CopyKernel {
    /// Runs the selected kernel.
    #[inline]
    pub fn run(self, plan: &CopyPlan, src: &[u8], out: &mut [u8]) -> usize {
        match self {
            Self::Library => copy_plan(plan, src, out),
            Self::Bytewise => copy_plan_bytewise(plan, src, out),
        }
    }
}
