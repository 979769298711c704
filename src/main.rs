//! vmemprof runner
//!
//! Runs the registered cache/TLB copy benchmarks with per-variant
//! repetitions and fixed iteration counts, printing one line per run plus
//! mean/median/stddev aggregates.
//!
//! # Output Format
//!
//! Report lines go to stdout:
//! `<name>/<args>[/iterations:N][/repeats:R][/manual_time]  <ns> ns  Speed=.. NumCopies=.. Allocated=..`
//!
//! Progress (with `--verbose`) and errors go to stderr.
//!
//! # Exit Codes
//!
//! - `0`: Every selected benchmark ran
//! - `1`: A benchmark failed to set up or run
//! - `2`: Invalid arguments or configuration error

use std::process::ExitCode;

use vmemprof::config::Config;
use vmemprof::evict::Capabilities;
use vmemprof::registry;
use vmemprof::runner::{aggregate_lines, run_point};

fn print_usage() {
    eprintln!(
        "usage: vmemprof [OPTIONS]

OPTIONS:
    --filter, -f <SUBSTR>   Run only benchmarks whose name/args contain SUBSTR
    --min-time-ms <N>       Minimum measured time per calibrated run (default: 500)
    --repetitions, -r <N>   Override each benchmark's repetition count
    --iterations, -i <N>    Override each benchmark's iteration count
    --list, -l              List benchmarks and exit
    --verbose, -v           Print progress to stderr
    --help, -h              Show this help message

ENVIRONMENT:
    VMEMPROF_FILTER, VMEMPROF_MIN_TIME_MS, VMEMPROF_REPETITIONS, VMEMPROF_ITERATIONS"
    );
}

/// Exit with error message.
fn die(msg: &str) -> ! {
    eprintln!("Error: {}", msg);
    eprintln!("Run with --help for usage");
    std::process::exit(2);
}

fn main() -> ExitCode {
    let config = Config::from_process().unwrap_or_else(|e| die(&e.to_string()));
    if config.help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    if config.list {
        let caps = Capabilities::HOST;
        for spec in registry::all() {
            let note = if spec.requires.satisfied_by(caps) {
                ""
            } else {
                "  (unsupported on this host)"
            };
            for args in spec.sweep {
                let label = spec.label(args);
                if config.selects(&label) {
                    println!("{label}{note}");
                }
            }
        }
        return ExitCode::SUCCESS;
    }

    if config.settings.verbose {
        eprintln!("Config: {:?}", config);
    }

    let mut failed = 0usize;
    for spec in registry::available() {
        for args in spec.sweep {
            if !config.selects(&spec.label(args)) {
                continue;
            }
            match run_point(spec, args, &config.settings) {
                Ok(records) => {
                    for record in &records {
                        println!("{}", record.render());
                    }
                    for line in aggregate_lines(&records) {
                        println!("{line}");
                    }
                }
                Err(e) => {
                    eprintln!("Benchmark failed: {e}");
                    failed += 1;
                }
            }
        }
    }

    if failed > 0 {
        eprintln!("{failed} benchmark(s) failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
