//! Backing storage for collector arenas.
//!
//! A [`Region`] is an anonymous, private, read-write mapping whose bytes
//! start out zeroed. Its length is the requested length rounded up to the
//! system page size.

use std::io;
use std::ptr::NonNull;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as os;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as os;

pub use os::page_size;

/// Round `len` up to a whole number of pages.
///
/// Returns `None` on overflow.
#[must_use]
pub fn round_to_pages(len: usize) -> Option<usize> {
    let page = page_size();
    len.checked_add(page - 1).map(|n| n & !(page - 1))
}

/// An owned anonymous memory mapping.
///
/// The mapping is released when this handle is dropped.
pub struct Region {
    inner: os::RegionInner,
}

impl Region {
    /// Returns a pointer to the first byte of the region.
    #[must_use]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.inner.ptr()
    }

    /// Returns the length of the region in bytes (a multiple of the page size).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// A region is never empty once mapped; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len())
            .finish()
    }
}

/// Configuration for creating a [`Region`].
#[derive(Debug, Clone, Default)]
pub struct RegionOptions {
    len: usize,
    populate: bool,
}

impl RegionOptions {
    /// Creates options with length 0. A length must be set before mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            len: 0,
            populate: false,
        }
    }

    /// Sets the minimum length of the region in bytes.
    #[must_use]
    pub const fn len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Pre-fault the page tables when mapping (`MAP_POPULATE` on Linux).
    #[must_use]
    pub const fn populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    /// Maps the region.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a zero or overflowing length, or the OS
    /// error when the mapping fails.
    pub fn map(&self) -> io::Result<Region> {
        if self.len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "region length must be greater than 0",
            ));
        }
        let len = round_to_pages(self.len).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "region length overflows")
        })?;

        let inner = os::RegionInner::map(len, self.populate)?;
        Ok(Region { inner })
    }
}
