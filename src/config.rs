//! Runner configuration from environment variables and command-line flags.
//!
//! | Flag               | Environment             | Default |
//! |--------------------|-------------------------|---------|
//! | `--filter <s>`     | `VMEMPROF_FILTER`       | all     |
//! | `--min-time-ms <n>`| `VMEMPROF_MIN_TIME_MS`  | 500     |
//! | `--repetitions <n>`| `VMEMPROF_REPETITIONS`  | per variant |
//! | `--iterations <n>` | `VMEMPROF_ITERATIONS`   | per variant |
//! | `--list`           |                         |         |
//! | `--verbose`, `-v`  |                         |         |
//! | `--help`, `-h`     |                         |         |
//!
//! Flags override the environment.

use std::fmt;
use std::time::Duration;

use crate::runner::RunSettings;

pub const ENV_FILTER: &str = "VMEMPROF_FILTER";
pub const ENV_MIN_TIME_MS: &str = "VMEMPROF_MIN_TIME_MS";
pub const ENV_REPETITIONS: &str = "VMEMPROF_REPETITIONS";
pub const ENV_ITERATIONS: &str = "VMEMPROF_ITERATIONS";

/// Invalid configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    MissingValue { flag: String },
    InvalidValue { flag: String, value: String },
    /// Counts and durations must be at least 1.
    Zero { flag: String },
    UnknownArgument(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue { flag } => write!(f, "{flag} requires a value"),
            Self::InvalidValue { flag, value } => write!(f, "Invalid {flag}: '{value}'"),
            Self::Zero { flag } => write!(f, "{flag} must be >= 1"),
            Self::UnknownArgument(arg) => write!(f, "Unknown argument: '{arg}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parsed runner configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Substring a `name/args` label must contain to run.
    pub filter: Option<String>,
    pub settings: RunSettings,
    pub list: bool,
    pub help: bool,
}

impl Config {
    /// Reads the process environment and arguments.
    pub fn from_process() -> Result<Self, ConfigError> {
        Self::from_sources(|key| std::env::var(key).ok(), std::env::args().skip(1))
    }

    /// Builds a configuration from an environment lookup and an argument
    /// list (without the program name).
    pub fn from_sources<E, I>(env: E, args: I) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();

        if let Some(filter) = env(ENV_FILTER).filter(|f| !f.is_empty()) {
            config.filter = Some(filter);
        }
        if let Some(ms) = env(ENV_MIN_TIME_MS) {
            config.settings.min_time = Duration::from_millis(positive(ENV_MIN_TIME_MS, &ms)?);
        }
        if let Some(reps) = env(ENV_REPETITIONS) {
            config.settings.repetitions = Some(positive(ENV_REPETITIONS, &reps)?);
        }
        if let Some(iters) = env(ENV_ITERATIONS) {
            config.settings.iterations = Some(positive(ENV_ITERATIONS, &iters)?);
        }

        let mut it = args.into_iter();
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--help" | "-h" => config.help = true,
                "--verbose" | "-v" => config.settings.verbose = true,
                "--list" | "-l" => config.list = true,
                "--filter" | "-f" => {
                    config.filter = Some(next_value(&mut it, "--filter")?);
                }
                "--min-time-ms" => {
                    let val = next_value(&mut it, "--min-time-ms")?;
                    config.settings.min_time = Duration::from_millis(positive("--min-time-ms", &val)?);
                }
                "--repetitions" | "-r" => {
                    let val = next_value(&mut it, "--repetitions")?;
                    config.settings.repetitions = Some(positive("--repetitions", &val)?);
                }
                "--iterations" | "-i" => {
                    let val = next_value(&mut it, "--iterations")?;
                    config.settings.iterations = Some(positive("--iterations", &val)?);
                }
                other => return Err(ConfigError::UnknownArgument(other.to_string())),
            }
        }
        Ok(config)
    }

    /// True if `label` passes the filter.
    pub fn selects(&self, label: &str) -> bool {
        self.filter.as_deref().is_none_or(|f| label.contains(f))
    }
}

fn next_value(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, ConfigError> {
    it.next().ok_or_else(|| ConfigError::MissingValue {
        flag: flag.to_string(),
    })
}

fn positive<T>(flag: &str, val: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + From<u8>,
{
    let n: T = val.trim().parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: val.to_string(),
    })?;
    if n == T::from(0) {
        return Err(ConfigError::Zero {
            flag: flag.to_string(),
        });
    }
    Ok(n)
}
