//! Cache and translation eviction.
//!
//! Three mechanisms, in increasing scope:
//! - [`line_flush`]: flush the cache lines of one small region with a
//!   dedicated instruction.
//! - [`flush_buffer`]: overwrite a region several times the size of the
//!   cache so everything else is evicted by capacity.
//! - Translation invalidation: change the protection of a mapped region so
//!   the kernel drops its TLB entries ([`Protectable`]).
//!
//! Which of these a host supports is described by [`Capabilities`]; the
//! experiments reach them through [`MemoryControl`] so unsupported targets
//! fail at construction instead of silently measuring something else.

pub mod flush_buffer;
pub mod line_flush;

use std::fmt;

pub use flush_buffer::{FillStrategy, FlushBuffer, FlushWindow};

use crate::arena::ArenaError;
use crate::error::VmemError;

/// Eviction failure.
#[derive(Debug)]
#[non_exhaustive]
pub enum EvictError {
    /// The host cannot perform this kind of eviction.
    Unsupported { capability: &'static str },
    /// Changing page protection failed.
    Translation(VmemError),
    /// A flush window does not fit the store it overwrites.
    Window(ArenaError),
}

impl fmt::Display for EvictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { capability } => {
                write!(f, "{capability} is not supported on this host")
            }
            Self::Translation(err) => write!(f, "translation invalidation failed: {err}"),
            Self::Window(err) => write!(f, "flush window overwrite failed: {err}"),
        }
    }
}

impl std::error::Error for EvictError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Translation(err) => Some(err),
            Self::Window(err) => Some(err),
            Self::Unsupported { .. } => None,
        }
    }
}

/// A region whose cached translations can be dropped by a protection
/// round trip.
pub trait Protectable {
    /// Revokes then restores access to the whole region.
    fn toggle_protection(&mut self) -> Result<(), EvictError>;
}

/// What the host can evict.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capabilities {
    /// Per-line cache flush instruction.
    pub line_flush: bool,
    /// Explicit mappings with protection control.
    pub translation: bool,
}

impl Capabilities {
    /// Capabilities of the compilation target.
    pub const HOST: Capabilities = Capabilities {
        line_flush: line_flush::AVAILABLE,
        translation: cfg!(all(unix, feature = "vmem")),
    };
}

/// Platform eviction primitives.
pub trait MemoryControl {
    /// What this implementation supports.
    fn capabilities(&self) -> Capabilities;

    /// Flushes every cache line covering `region`. Returns the number of
    /// lines flushed.
    fn evict_cache_lines(&self, region: &[u8]) -> Result<usize, EvictError>;

    /// Drops cached translations for `region` without changing its contents.
    fn invalidate_translation(&self, region: &mut dyn Protectable) -> Result<(), EvictError>;
}

/// [`MemoryControl`] for the machine the crate was compiled for.
#[derive(Clone, Copy, Debug)]
pub struct HostMemory {
    line_size: usize,
}

impl HostMemory {
    /// Flushes with the default 64 byte line size.
    pub const fn new() -> Self {
        Self {
            line_size: crate::geometry::CACHE_LINE,
        }
    }

    /// Flushes with a custom stride.
    ///
    /// # Panics
    /// Panics if `line_size == 0`.
    pub fn with_line_size(line_size: usize) -> Self {
        assert!(line_size > 0, "line size must be non-zero");
        Self { line_size }
    }

    /// Stride used by [`evict_cache_lines`](MemoryControl::evict_cache_lines).
    #[inline]
    pub fn line_size(&self) -> usize {
        self.line_size
    }
}

impl Default for HostMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryControl for HostMemory {
    fn capabilities(&self) -> Capabilities {
        Capabilities::HOST
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[inline]
    fn evict_cache_lines(&self, region: &[u8]) -> Result<usize, EvictError> {
        Ok(line_flush::flush_lines(region, self.line_size()))
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    fn evict_cache_lines(&self, _region: &[u8]) -> Result<usize, EvictError> {
        Err(EvictError::Unsupported {
            capability: "cache line flush",
        })
    }

    #[inline]
    fn invalidate_translation(&self, region: &mut dyn Protectable) -> Result<(), EvictError> {
        region.toggle_protection()
    }
}
