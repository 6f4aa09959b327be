//! Object references and the per-object header.
//!
//! Every instance starts with a 16-byte header:
//!
//! | offset | field        |
//! |--------|--------------|
//! | 0      | `type_index: u32` (index into the heap's type table) |
//! | 4      | `length: u32` (element count of a variable instance) |
//! | 8      | `marked: u8` |
//! | 9..16  | reserved     |
//!
//! The header never carries compaction state; forwarding addresses live in
//! a side table for the duration of one compaction pass.

use std::fmt;
use std::num::NonZeroUsize;

use crate::arena::Arena;

/// Bytes occupied by [`ObjectHeader`] at the start of every object.
pub const HEADER_SIZE: usize = 16;

const TYPE_INDEX_OFFSET: usize = 0;
const LENGTH_OFFSET: usize = 4;
const MARK_OFFSET: usize = 8;

/// A reference to an object in a [`Heap`](crate::Heap).
///
/// This is the object's absolute address, exactly what a pointer field
/// holds. `Option<ObjRef>` is pointer-sized with `None` as null, so it can
/// be used directly as a field type in `#[repr(C)]` payload structs.
///
/// An `ObjRef` is a plain value: a compacting collection may move the
/// object it names. Hold long-lived references in root slots and re-read
/// them after every allocation or collection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjRef(NonZeroUsize);

impl ObjRef {
    #[inline]
    pub(crate) const fn from_addr(addr: NonZeroUsize) -> Self {
        Self(addr)
    }

    /// The object's absolute address.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({:#x})", self.0.get())
    }
}

/// Decoded object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Index of the object's descriptor in the heap's type table.
    pub type_index: u32,
    /// Element count for variable-length instances, 0 otherwise.
    pub length: u32,
    /// Mark bit.
    pub marked: bool,
}

impl ObjectHeader {
    /// Read the header of the object at `offset`.
    #[must_use]
    pub fn read(arena: &Arena, offset: usize) -> Self {
        let bytes = arena.bytes(offset, HEADER_SIZE);
        Self {
            type_index: read_u32(bytes, TYPE_INDEX_OFFSET),
            length: read_u32(bytes, LENGTH_OFFSET),
            marked: bytes[MARK_OFFSET] != 0,
        }
    }

    /// Install this header at `offset`, clearing the reserved bytes.
    pub fn write(&self, arena: &mut Arena, offset: usize) {
        let bytes = arena.bytes_mut(offset, HEADER_SIZE);
        bytes.fill(0);
        bytes[TYPE_INDEX_OFFSET..TYPE_INDEX_OFFSET + 4]
            .copy_from_slice(&self.type_index.to_ne_bytes());
        bytes[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&self.length.to_ne_bytes());
        bytes[MARK_OFFSET] = u8::from(self.marked);
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_ne_bytes(buf)
}

/// Whether the object at `offset` is marked.
#[inline]
#[must_use]
pub fn is_marked(arena: &Arena, offset: usize) -> bool {
    arena.bytes(offset + MARK_OFFSET, 1)[0] != 0
}

/// Set or clear the mark bit of the object at `offset`.
#[inline]
pub fn set_marked(arena: &mut Arena, offset: usize, marked: bool) {
    arena.bytes_mut(offset + MARK_OFFSET, 1)[0] = u8::from(marked);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut arena = Arena::new(64, false).unwrap();
        let header = ObjectHeader {
            type_index: 3,
            length: 11,
            marked: true,
        };
        header.write(&mut arena, 16);

        assert_eq!(ObjectHeader::read(&arena, 16), header);
        assert!(is_marked(&arena, 16));
        assert_eq!(arena.bytes(16, 4), 3u32.to_ne_bytes());

        set_marked(&mut arena, 16, false);
        assert!(!is_marked(&arena, 16));
        assert_eq!(ObjectHeader::read(&arena, 16).length, 11);
    }

    #[test]
    fn test_option_objref_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<Option<ObjRef>>(),
            std::mem::size_of::<usize>()
        );
    }
}
