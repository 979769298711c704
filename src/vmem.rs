//! Explicitly mapped virtual memory with page-protection control.
//!
//! A [`VmemRegion`] is an anonymous private mapping (reserved and committed
//! in one step) whose usable window can be aligned to any power-of-two
//! boundary at or above the page size. Changing the protection of the window
//! makes the kernel drop the cached translations for it, which is how the
//! TLB-targeted variants invalidate translations without touching the data
//! cache lines that hold the page tables themselves.
//!
//! Only built with the `vmem` feature on unix targets.

use std::fmt;
use std::io;

use memmap2::{MmapMut, MmapOptions};

use crate::arena::ByteStore;
use crate::error::VmemError;
use crate::evict::{EvictError, Protectable};
use crate::geometry::PAGE_SIZE;
use crate::util::{align_up, offset_to_alignment};

/// Access rights applied to a whole region.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Protection {
    /// Any access faults.
    None,
    /// Read-only.
    Read,
    /// Read and write (the state after mapping).
    ReadWrite,
}

impl Protection {
    fn as_prot(self) -> libc::c_int {
        match self {
            Self::None => libc::PROT_NONE,
            Self::Read => libc::PROT_READ,
            Self::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
        }
    }

    #[inline]
    fn readable(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Anonymous mapping with an aligned, page-granular usable window.
pub struct VmemRegion {
    map: MmapMut,
    offset: usize,
    len: usize,
    protection: Protection,
}

impl VmemRegion {
    /// Maps `len` bytes (rounded up to whole pages) read/write.
    pub fn reserve(len: usize) -> Result<Self, VmemError> {
        Self::reserve_aligned(len, PAGE_SIZE)
    }

    /// Maps a window of `len` bytes whose start is a multiple of `align`.
    ///
    /// The mapping over-allocates by `align` bytes so an aligned window
    /// always fits; untouched pages stay uncommitted.
    pub fn reserve_aligned(len: usize, align: usize) -> Result<Self, VmemError> {
        if len == 0 {
            return Err(VmemError::SizeZero);
        }
        if !align.is_power_of_two() || align < PAGE_SIZE {
            return Err(VmemError::BadAlignment { align });
        }
        let overflow = || VmemError::SizeOverflow { len, align };
        let window = len
            .checked_add(PAGE_SIZE - 1)
            .map(|v| v & !(PAGE_SIZE - 1))
            .ok_or_else(overflow)?;
        let slack = if align > PAGE_SIZE { align } else { 0 };
        let map_len = window.checked_add(slack).ok_or_else(overflow)?;

        let map = MmapOptions::new()
            .len(map_len)
            .map_anon()
            .map_err(VmemError::Map)?;
        let offset = offset_to_alignment(map.as_ptr() as usize, align);
        debug_assert!(offset + len <= map.len());

        Ok(Self {
            map,
            offset,
            len,
            protection: Protection::ReadWrite,
        })
    }

    /// Usable window length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; zero-sized regions cannot be constructed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current protection of the window.
    #[inline]
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Bytes actually mapped, including alignment slack.
    #[inline]
    pub fn mapped_len(&self) -> usize {
        self.map.len()
    }

    /// Applies `protection` to every page of the window.
    pub fn protect(&mut self, protection: Protection) -> Result<(), VmemError> {
        let addr = self.map.as_mut_ptr().wrapping_add(self.offset);
        let len = align_up(self.len, PAGE_SIZE);
        // SAFETY: [addr, addr + len) lies inside our own mapping, starts on a
        // page boundary, and no slice into it is alive while we hold &mut self.
        let rc = unsafe { libc::mprotect(addr.cast::<libc::c_void>(), len, protection.as_prot()) };
        if rc != 0 {
            return Err(VmemError::Protect(io::Error::last_os_error()));
        }
        self.protection = protection;
        Ok(())
    }

    /// Revokes then restores access, dropping cached translations for the
    /// window while leaving its contents intact.
    pub fn toggle_protection(&mut self) -> Result<(), VmemError> {
        self.protect(Protection::None)?;
        self.protect(Protection::ReadWrite)
    }
}

impl Protectable for VmemRegion {
    fn toggle_protection(&mut self) -> Result<(), EvictError> {
        VmemRegion::toggle_protection(self).map_err(EvictError::Translation)
    }
}

impl ByteStore for VmemRegion {
    #[inline]
    fn bytes(&self) -> &[u8] {
        assert!(self.protection.readable(), "region is not readable");
        &self.map[self.offset..self.offset + self.len]
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        assert_eq!(self.protection, Protection::ReadWrite, "region is not writable");
        &mut self.map[self.offset..self.offset + self.len]
    }
}

impl fmt::Debug for VmemRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmemRegion")
            .field("len", &self.len)
            .field("offset", &self.offset)
            .field("mapped_len", &self.map.len())
            .field("protection", &self.protection)
            .finish()
    }
}
