//! Type descriptors: the static layout metadata the tracer consumes.

use std::collections::HashMap;

use crate::arena::align_to_word;
use crate::error::{GcError, Result};
use crate::object::{ObjectHeader, HEADER_SIZE};

/// Layout of the trailing elements of a variable-length type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    /// Bytes per element.
    pub size: usize,
    /// Bytes reserved after the last element (e.g. a NUL terminator).
    pub terminator: usize,
}

/// Per-type layout: instance size and where its pointer fields are.
///
/// Descriptors are immutable and shared by every instance of a type; the
/// header refers to one through the heap's type table, never by copy.
/// The collector reads offsets and sizes but does not validate them
/// beyond keeping every access inside the arena.
#[derive(Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Display name used by diagnostics.
    pub name: &'static str,
    /// Fixed instance size in bytes, header included.
    pub size: usize,
    /// Byte offsets (from the object start) of pointer-sized fields.
    pub pointer_offsets: &'static [usize],
    /// Trailing element layout for variable-length types.
    pub elements: Option<ElementLayout>,
}

/// Built-in text type: NUL-terminated bytes after the header.
pub static TEXT: TypeDescriptor = TypeDescriptor::variable("String", HEADER_SIZE, 1, 1);

/// Built-in vector type: `f64` elements after the header.
pub static VECTOR: TypeDescriptor = TypeDescriptor::variable("Vector", HEADER_SIZE, 8, 1);

impl TypeDescriptor {
    /// A fixed-size record.
    #[must_use]
    pub const fn fixed(name: &'static str, size: usize, pointer_offsets: &'static [usize]) -> Self {
        Self {
            name,
            size,
            pointer_offsets,
            elements: None,
        }
    }

    /// A variable-length instance with no pointer fields: `size` fixed bytes
    /// followed by `element_size`-byte elements and a terminator.
    #[must_use]
    pub const fn variable(
        name: &'static str,
        size: usize,
        element_size: usize,
        terminator: usize,
    ) -> Self {
        Self {
            name,
            size,
            pointer_offsets: &[],
            elements: Some(ElementLayout {
                size: element_size,
                terminator,
            }),
        }
    }

    /// Whether instances carry an element count.
    #[inline]
    #[must_use]
    pub const fn is_variable(&self) -> bool {
        self.elements.is_some()
    }

    /// Text types hold single-byte elements; diagnostics print them quoted.
    #[inline]
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.elements, Some(ElementLayout { size: 1, .. }))
    }

    /// Fixed part, never smaller than the header.
    #[inline]
    #[must_use]
    pub const fn fixed_size(&self) -> usize {
        if self.size < HEADER_SIZE {
            HEADER_SIZE
        } else {
            self.size
        }
    }

    /// Bytes occupied by the element area (elements plus terminator).
    #[must_use]
    pub fn element_bytes(&self, length: usize) -> Option<usize> {
        match self.elements {
            Some(layout) => layout
                .size
                .checked_mul(length)
                .and_then(|n| n.checked_add(layout.terminator)),
            None => Some(0),
        }
    }

    /// Exact instance size: fixed part plus element area.
    #[must_use]
    pub fn instance_size(&self, length: usize) -> Option<usize> {
        self.element_bytes(length)
            .and_then(|n| n.checked_add(self.fixed_size()))
    }

    /// Storage an instance occupies in the arena: the instance size rounded
    /// up to the word size.
    #[must_use]
    pub fn allocation_size(&self, length: usize) -> Option<usize> {
        self.instance_size(length).and_then(align_to_word)
    }
}

/// Types that know their own descriptor.
///
/// Usually implemented with `#[derive(Describe)]` on a `#[repr(C)]`
/// struct that lays out the payload following the header.
pub trait Describe {
    /// The shared descriptor for this type.
    fn descriptor() -> &'static TypeDescriptor;
}

/// Per-heap registry mapping header type indices to descriptors.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: Vec<&'static TypeDescriptor>,
    index: HashMap<usize, u32>,
}

impl TypeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `descriptor`, registering it on first use.
    pub fn register(&mut self, descriptor: &'static TypeDescriptor) -> Result<u32> {
        let key = std::ptr::from_ref(descriptor) as usize;
        if let Some(&index) = self.index.get(&key) {
            return Ok(index);
        }
        let index = u32::try_from(self.types.len()).map_err(|_| GcError::TooManyTypes)?;
        self.types.push(descriptor);
        self.index.insert(key, index);
        Ok(index)
    }

    /// Descriptor for a header's type index.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&'static TypeDescriptor> {
        self.types.get(index as usize).copied()
    }

    /// Descriptor named by `header`, if registered.
    #[inline]
    #[must_use]
    pub fn describe(&self, header: &ObjectHeader) -> Option<&'static TypeDescriptor> {
        self.get(header.type_index)
    }

    /// Arena footprint of an object with this header.
    #[must_use]
    pub fn object_size(&self, header: &ObjectHeader) -> Option<usize> {
        self.describe(header)
            .and_then(|d| d.allocation_size(header.length as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static USER: TypeDescriptor = TypeDescriptor::fixed("User", 40, &[32]);

    #[test]
    fn test_text_sizes() {
        let text = &TEXT;
        assert!(text.is_text());
        assert_eq!(text.instance_size(6), Some(HEADER_SIZE + 7));
        assert_eq!(text.allocation_size(6), Some(24));
        assert_eq!(text.allocation_size(10), Some(32));
    }

    #[test]
    fn test_vector_sizes() {
        let vector = &VECTOR;
        assert!(vector.is_variable());
        assert!(!vector.is_text());
        assert_eq!(vector.instance_size(3), Some(HEADER_SIZE + 25));
        assert_eq!(vector.allocation_size(3), Some(48));
    }

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(USER.instance_size(0), Some(40));
        assert_eq!(USER.allocation_size(0), Some(40));
        let tiny = TypeDescriptor::fixed("Tiny", 1, &[]);
        assert_eq!(tiny.allocation_size(0), Some(HEADER_SIZE));
    }

    #[test]
    fn test_size_overflow() {
        assert_eq!(VECTOR.instance_size(usize::MAX), None);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut table = TypeTable::new();
        let a = table.register(&USER).unwrap();
        let b = table.register(&TEXT).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.register(&USER).unwrap(), a);
        assert!(table.get(2).is_none());
        assert_eq!(table.get(a).map(|d| d.name), Some("User"));
        assert!(table.get(7).is_none());
    }
}
