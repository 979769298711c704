//! Helpers for the in-crate test modules.
//!
//! Proptest blocks size themselves with [`proptest_cases`]: a quick local
//! run by default, the block's own count on CI, and `PROPTEST_CASES` wins
//! over both.

fn var_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Case count for a proptest block whose CI count is `ci_cases`.
pub fn proptest_cases(ci_cases: u32) -> u32 {
    match var_u32("PROPTEST_CASES") {
        Some(cases) => cases.max(1),
        None if std::env::var_os("CI").is_some() => ci_cases.max(1),
        None => ci_cases.clamp(1, 4),
    }
}

/// `len` bytes where each byte encodes its offset modulo a prime, so a copy
/// from the wrong offset is visible.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Resident set size of this process in bytes, from `VmRSS`.
#[cfg(target_os = "linux")]
pub fn resident_bytes() -> Option<usize> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: usize = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}
