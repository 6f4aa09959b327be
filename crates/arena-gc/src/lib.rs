//! A precise tracing collector for a single pre-sized arena.
//!
//! `arena-gc` manages typed, fixed-layout records that refer to each other
//! through explicit pointer fields. Every record starts with a 16-byte
//! header naming its [`TypeDescriptor`]; descriptors list the byte offsets
//! of the pointer fields, which is all the tracer needs to walk the graph
//! precisely. Records are reached from an explicit root table and reclaimed
//! once unreachable.
//!
//! # Policies
//!
//! - [`PolicyKind::Sweep`]: first-fit free list; dead objects become free
//!   chunks in place.
//! - [`PolicyKind::ScanReuse`]: bump allocation, then reuse of slots left
//!   unmarked by the last collection. Never frees or moves storage.
//! - [`PolicyKind::Compact`]: bump allocation; collections slide live objects
//!   to the start of the arena and rewrite every pointer to them.
//!
//! Allocation asks the policy for storage, collects once if it has none,
//! and retries before reporting [`GcError::OutOfMemory`].
//!
//! # Quick Start
//!
//! ```
//! use arena_gc::{Heap, PolicyKind, TypeDescriptor, HEADER_SIZE};
//!
//! // A 40-byte record with one pointer field right after the header.
//! static USER: TypeDescriptor = TypeDescriptor::fixed("User", 40, &[HEADER_SIZE]);
//!
//! let mut heap = Heap::new(1000, PolicyKind::Compact).unwrap();
//! let user = heap.allocate_typed(&USER).unwrap();
//! let slot = heap.push_root(Some(user));
//!
//! let name = heap.allocate_text("parrt").unwrap();
//! let user = heap.root(slot).unwrap().unwrap();
//! heap.set_field(user, 0, Some(name)).unwrap();
//!
//! let stats = heap.collect();
//! assert_eq!(stats.objects_live, 2);
//! ```
//!
//! # Roots and moving objects
//!
//! An [`ObjRef`] is a plain address. Under the compacting policy any
//! allocation may move objects, so hold references in root slots and read
//! them back through [`Heap::root`] after allocating. [`RootScope`] releases
//! the roots registered inside it when it goes out of scope.
//!
//! # Thread Safety
//!
//! [`Heap`] is `!Send` and `!Sync`. Each heap belongs to one thread.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod arena;
mod config;
mod descriptor;
mod dump;
mod error;
mod heap;
mod metrics;
mod object;
mod policy;
mod roots;
mod trace;
mod tracing;

pub use arena::WORD_SIZE;
pub use config::{
    HeapConfig, PolicyKind, DEFAULT_HEAP_SIZE, DEFAULT_ROOT_CAPACITY, ENV_HEAP_SIZE, ENV_POLICY,
    ENV_ROOTS,
};
pub use descriptor::{Describe, ElementLayout, TypeDescriptor, TEXT, VECTOR};
pub use error::{GcError, Result};
pub use heap::Heap;
pub use metrics::CollectStats;
pub use object::{ObjRef, HEADER_SIZE};
pub use roots::{RootScope, RootSlot};

/// Derive macro generating a [`Describe`] implementation.
#[cfg(feature = "derive")]
pub use arena_gc_derive::Describe;
