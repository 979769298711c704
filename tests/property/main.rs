//! Property-based tests for copy plans, replica layouts and flush windows.
//!
//! Run with: `cargo test --test property`
//!
//! Each block's case count can be overridden with `PROPTEST_CASES`.

mod flush_window;
mod plan_placement;
mod replica_layout;

/// Case count for a block: `PROPTEST_CASES` when set and positive, else
/// `default`.
pub(crate) fn cases(default: u32) -> u32 {
    cases_from(std::env::var("PROPTEST_CASES").ok().as_deref(), default)
}

fn cases_from(value: Option<&str>, default: u32) -> u32 {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

#[test]
fn case_override_parsing() {
    assert_eq!(cases_from(None, 64), 64);
    assert_eq!(cases_from(Some("1000"), 64), 1000);
    assert_eq!(cases_from(Some(" 7 "), 64), 7);
    assert_eq!(cases_from(Some("0"), 64), 64);
    assert_eq!(cases_from(Some("many"), 64), 64);
}
