//! Integration tests for vmemprof experiments, registry and runner.
//!
//! Run with: `cargo test --test integration`

mod experiments;
mod registry_sweeps;
mod runner_reports;
