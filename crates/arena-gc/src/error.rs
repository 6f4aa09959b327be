//! Collector error types.

use crate::config::PolicyKind;

/// Errors surfaced by [`Heap`](crate::Heap) operations.
///
/// Tracing and reclamation themselves never fail; the only way a
/// collection "fails" is by not recovering enough memory, which the
/// allocation that triggered it reports as [`GcError::OutOfMemory`].
#[derive(Debug, thiserror::Error)]
pub enum GcError {
    /// An allocation could not be satisfied even after one collection.
    #[error("out of memory: {requested} bytes requested under the {policy} policy")]
    OutOfMemory {
        /// Rounded request size in bytes.
        requested: usize,
        /// Policy that was active.
        policy: PolicyKind,
    },

    /// The fixed-size root table is full.
    #[error("root table overflow: capacity is {capacity} roots")]
    RootOverflow {
        /// Configured root capacity.
        capacity: usize,
    },

    /// A root slot that was released by a scope exit or truncation.
    #[error("root slot {index} was released (root depth is {depth})")]
    ReleasedRoot {
        /// Index of the stale slot.
        index: usize,
        /// Current root depth.
        depth: usize,
    },

    /// The configured heap cannot hold even a single object header.
    #[error("heap size {size} is too small")]
    InvalidHeapSize {
        /// Requested size in bytes.
        size: usize,
    },

    /// The backing region could not be mapped.
    #[error("failed to map heap arena: {0}")]
    Map(#[from] std::io::Error),

    /// A reference that does not point at an object of this heap.
    #[error("{address:#x} does not reference an object in this heap")]
    InvalidReference {
        /// The offending address.
        address: usize,
    },

    /// A pointer-field or element index beyond what the type declares.
    #[error("index {index} out of range for {type_name} (has {count})")]
    IndexOutOfRange {
        /// Display name of the object's type.
        type_name: &'static str,
        /// Requested index.
        index: usize,
        /// Number of fields or elements.
        count: usize,
    },

    /// A typed accessor used on an object of a different kind.
    #[error("expected a {expected} object, found {found}")]
    TypeMismatch {
        /// What the accessor works on.
        expected: &'static str,
        /// Display name of the object's type.
        found: &'static str,
    },

    /// Text does not fit into the element capacity of a text object.
    #[error("text of {len} bytes does not fit in {capacity} bytes")]
    TextTooLong {
        /// Length of the text.
        len: usize,
        /// Element capacity of the object.
        capacity: usize,
    },

    /// More distinct type descriptors than a header can index.
    #[error("type table is full")]
    TooManyTypes,

    /// A configuration value that could not be understood.
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig {
        /// Configuration key or environment variable.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GcError>;
