//! Instruction-driven cache line eviction.
//!
//! x86_64 uses `clflush` (part of SSE2, so always present on that target);
//! aarch64 uses `dc civac`, which Linux and macOS allow from user space.
//! Other targets have no line flush and the variants that need it are not
//! registered.

/// True when this target can flush individual cache lines.
pub const AVAILABLE: bool = cfg!(any(target_arch = "x86_64", target_arch = "aarch64"));

/// Flushes every cache line overlapping `region`, stepping by `line_size`.
///
/// The walk starts at the first byte and advances until it passes the end,
/// so a trailing partial line is still flushed. Returns the number of flush
/// instructions issued (`ceil(len / line_size)`).
///
/// # Panics
/// Panics if `line_size == 0`.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub fn flush_lines(region: &[u8], line_size: usize) -> usize {
    assert!(line_size > 0);
    let base = region.as_ptr();
    let mut offset = 0;
    let mut issued = 0;
    while offset < region.len() {
        flush_line(base.wrapping_add(offset));
        offset += line_size;
        issued += 1;
    }
    complete();
    issued
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn flush_line(addr: *const u8) {
    // SAFETY: addr points into a live slice; clflush is SSE2, baseline on x86_64.
    unsafe { core::arch::x86_64::_mm_clflush(addr) }
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn flush_line(addr: *const u8) {
    // SAFETY: addr points into a live, mapped slice.
    unsafe {
        core::arch::asm!("dc civac, {0}", in(reg) addr, options(nostack, preserves_flags));
    }
}

// x86_64 relies on the caller's pause to let the flushes retire.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn complete() {}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn complete() {
    // SAFETY: barrier only.
    unsafe { core::arch::asm!("dsb ish", options(nostack, preserves_flags)) }
}
