//! The heap arena.
//!
//! One contiguous, zero-filled byte region backed by a [`sys_alloc::Region`].
//! Everything else in the collector addresses the arena by byte offset;
//! this module is the only place that touches the raw memory, through
//! exactly three primitives:
//!
//! - [`Arena::read_word`]: read a pointer-sized field at an offset,
//! - [`Arena::write_word`]: overwrite a pointer-sized field at an offset,
//! - [`Arena::move_bytes`]: relocate an object's bytes during compaction.
//!
//! Byte slices handed out by [`Arena::bytes`] / [`Arena::bytes_mut`] borrow
//! the arena, so ordinary safe code handles headers and payloads.

use std::num::NonZeroUsize;
use std::ptr::{self, NonNull};

use sys_alloc::{Region, RegionOptions};

use crate::error::{GcError, Result};
use crate::object::{ObjRef, HEADER_SIZE};

/// Size of a pointer field, and the allocation granule.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Round `n` up to the next word boundary.
///
/// Returns `None` on overflow.
#[must_use]
pub const fn align_to_word(n: usize) -> Option<usize> {
    match n.checked_add(WORD_SIZE - 1) {
        Some(n) => Some(n & !(WORD_SIZE - 1)),
        None => None,
    }
}

/// A fixed-size arena.
pub struct Arena {
    base: NonNull<u8>,
    base_addr: NonZeroUsize,
    size: usize,
    // Keeps the mapping alive; unmapped on drop.
    _region: Region,
}

impl Arena {
    /// Map an arena of `size` bytes, rounded down to the word size.
    pub fn new(size: usize, populate: bool) -> Result<Self> {
        let size = size & !(WORD_SIZE - 1);
        if size < HEADER_SIZE {
            return Err(GcError::InvalidHeapSize { size });
        }

        let region = RegionOptions::new().len(size).populate(populate).map()?;
        let base = region.as_ptr();
        let base_addr = NonZeroUsize::new(base.as_ptr() as usize)
            .ok_or(GcError::InvalidHeapSize { size })?;

        Ok(Self {
            base,
            base_addr,
            size,
            _region: region,
        })
    }

    /// Usable size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Reference to the object starting at `offset`.
    #[inline]
    #[must_use]
    pub const fn obj_ref(&self, offset: usize) -> ObjRef {
        ObjRef::from_addr(self.base_addr.saturating_add(offset))
    }

    /// Offset of an absolute address, if it lies inside `[base, base + size)`.
    #[inline]
    #[must_use]
    pub fn offset_of_addr(&self, addr: usize) -> Option<usize> {
        addr.checked_sub(self.base_addr.get())
            .filter(|&offset| offset < self.size)
    }

    /// Offset of `obj`, if it lies inside this arena.
    #[inline]
    #[must_use]
    pub fn offset_of(&self, obj: ObjRef) -> Option<usize> {
        self.offset_of_addr(obj.addr())
    }

    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, offset: usize, len: usize) -> bool {
        match offset.checked_add(len) {
            Some(end) => end <= self.size,
            None => false,
        }
    }

    #[inline]
    #[track_caller]
    fn check(&self, offset: usize, len: usize) {
        assert!(
            self.in_bounds(offset, len),
            "arena access [{offset}, +{len}) outside heap of {} bytes",
            self.size
        );
    }

    /// Read the pointer-sized word at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the word is not entirely inside the arena.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn read_word(&self, offset: usize) -> usize {
        self.check(offset, WORD_SIZE);
        // SAFETY: bounds checked above; the region is mapped read-write for
        // the lifetime of `self` and every bit pattern is a valid usize.
        unsafe { ptr::read_unaligned(self.base.as_ptr().add(offset).cast::<usize>()) }
    }

    /// Overwrite the pointer-sized word at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the word is not entirely inside the arena.
    #[inline]
    #[track_caller]
    pub fn write_word(&mut self, offset: usize, value: usize) {
        self.check(offset, WORD_SIZE);
        // SAFETY: bounds checked above; `&mut self` guarantees no slice
        // borrowed from the arena is alive.
        unsafe { ptr::write_unaligned(self.base.as_ptr().add(offset).cast::<usize>(), value) }
    }

    /// Move `len` bytes from `src` to `dst`.
    ///
    /// Source and destination may overlap: an object sliding down by less
    /// than its own size overlaps itself.
    ///
    /// # Panics
    ///
    /// Panics if either range is not entirely inside the arena.
    #[inline]
    #[track_caller]
    pub fn move_bytes(&mut self, src: usize, dst: usize, len: usize) {
        self.check(src, len);
        self.check(dst, len);
        // SAFETY: both ranges checked above; `ptr::copy` has memmove
        // semantics so overlap is allowed.
        unsafe {
            let base = self.base.as_ptr();
            ptr::copy(base.add(src), base.add(dst), len);
        }
    }

    /// Read a pointer field: the target's offset, or `None` for null or for
    /// an address outside the arena.
    #[inline]
    #[must_use]
    pub fn read_pointer(&self, offset: usize) -> Option<usize> {
        match self.read_word(offset) {
            0 => None,
            addr => self.offset_of_addr(addr),
        }
    }

    /// Write a pointer field: the absolute address of `target`, or null.
    #[inline]
    pub fn write_pointer(&mut self, offset: usize, target: Option<usize>) {
        let value = target.map_or(0, |target| self.base_addr.get() + target);
        self.write_word(offset, value);
    }

    /// Borrow `len` bytes starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range is not entirely inside the arena.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        self.check(offset, len);
        // SAFETY: range checked; the mapping outlives the borrow of `self`.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(offset), len) }
    }

    /// Mutably borrow `len` bytes starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range is not entirely inside the arena.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        self.check(offset, len);
        // SAFETY: range checked; `&mut self` makes this the only borrow.
        unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len) }
    }

    /// Zero `len` bytes starting at `offset`.
    #[inline]
    pub fn zero(&mut self, offset: usize, len: usize) {
        self.bytes_mut(offset, len).fill(0);
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("base", &format_args!("{:#x}", self.base_addr.get()))
            .field("size", &self.size)
            .finish()
    }
}
