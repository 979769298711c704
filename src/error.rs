//! Error types for experiment setup.
//!
//! Errors are stage-specific: buffer allocation ([`ArenaError`]), copy plan
//! validation ([`PlanError`]), virtual memory mapping ([`VmemError`]),
//! eviction ([`EvictError`]). [`SetupError`] wraps them for callers that
//! build a whole experiment and only need to report what went wrong.
//!
//! Nothing inside a measured loop returns an error; every fallible step
//! happens before the first iteration.

use std::fmt;
use std::io;

pub use crate::arena::ArenaError;
pub use crate::evict::EvictError;
pub use crate::geometry::PlanError;

/// Errors from mapping or re-protecting a region.
#[derive(Debug)]
#[non_exhaustive]
pub enum VmemError {
    /// A zero-byte region was requested.
    SizeZero,
    /// Alignment must be a power of two no smaller than the page size.
    BadAlignment { align: usize },
    /// The requested size overflows once alignment slack is added.
    SizeOverflow { len: usize, align: usize },
    /// The anonymous mapping failed.
    Map(io::Error),
    /// `mprotect` failed.
    Protect(io::Error),
}

impl fmt::Display for VmemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeZero => write!(f, "zero-sized mapping requested"),
            Self::BadAlignment { align } => {
                write!(f, "mapping alignment {align} is not a page-sized power of two")
            }
            Self::SizeOverflow { len, align } => {
                write!(f, "mapping of {len} bytes aligned to {align} overflows")
            }
            Self::Map(err) => write!(f, "anonymous mapping failed: {err}"),
            Self::Protect(err) => write!(f, "page protection change failed: {err}"),
        }
    }
}

impl std::error::Error for VmemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Map(err) | Self::Protect(err) => Some(err),
            _ => None,
        }
    }
}

/// Failure while building an experiment.
#[derive(Debug)]
#[non_exhaustive]
pub enum SetupError {
    /// Buffer allocation or layout failure.
    Arena(ArenaError),
    /// The copy plan does not fit the source or output buffer.
    Plan(PlanError),
    /// Mapping or protecting virtual memory failed.
    Vmem(VmemError),
    /// An eviction capability is missing or failed.
    Evict(EvictError),
    /// The registry has no experiment with this name.
    UnknownExperiment { name: String },
    /// The experiment was given the wrong number of arguments.
    BadArguments {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    /// An argument is outside the range the experiment can size buffers for.
    ArgumentOutOfRange {
        name: &'static str,
        arg: &'static str,
        value: u64,
    },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arena(err) => write!(f, "buffer setup failed: {err}"),
            Self::Plan(err) => write!(f, "invalid copy plan: {err}"),
            Self::Vmem(err) => write!(f, "virtual memory setup failed: {err}"),
            Self::Evict(err) => write!(f, "eviction failed: {err}"),
            Self::UnknownExperiment { name } => write!(f, "unknown experiment '{name}'"),
            Self::BadArguments {
                name,
                expected,
                got,
            } => write!(f, "{name} takes {expected} argument(s), got {got}"),
            Self::ArgumentOutOfRange { name, arg, value } => {
                write!(f, "{name}: {arg} = {value} is out of range")
            }
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Arena(err) => Some(err),
            Self::Plan(err) => Some(err),
            Self::Vmem(err) => Some(err),
            Self::Evict(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ArenaError> for SetupError {
    fn from(err: ArenaError) -> Self {
        Self::Arena(err)
    }
}

impl From<PlanError> for SetupError {
    fn from(err: PlanError) -> Self {
        Self::Plan(err)
    }
}

impl From<VmemError> for SetupError {
    fn from(err: VmemError) -> Self {
        Self::Vmem(err)
    }
}

impl From<EvictError> for SetupError {
    fn from(err: EvictError) -> Self {
        Self::Evict(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn setup_error_chains_its_source() {
        let err = SetupError::from(ArenaError::SizeZero);
        assert_eq!(err.to_string(), "buffer setup failed: zero-sized buffer requested");
        assert!(err.source().is_some());
    }

    #[test]
    fn vmem_protect_error_exposes_io_source() {
        let err = VmemError::Protect(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("page protection change failed"));
    }

    #[test]
    fn argument_errors_name_the_experiment() {
        let err = SetupError::BadArguments {
            name: "memcpy_tlb",
            expected: 1,
            got: 0,
        };
        assert_eq!(err.to_string(), "memcpy_tlb takes 1 argument(s), got 0");
    }
}
