//! The heap: arena, type table, root set and the active policy.

use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Instant;

use crate::arena::{align_to_word, Arena, WORD_SIZE};
use crate::config::{HeapConfig, PolicyKind};
use crate::descriptor::{Describe, TypeDescriptor, TypeTable, TEXT, VECTOR};
use crate::error::{GcError, Result};
use crate::metrics::{CollectStats, PhaseTimer};
use crate::object::{ObjRef, ObjectHeader, HEADER_SIZE};
use crate::policy::{self, Reclaim, Space};
use crate::roots::{RootScope, RootSet, RootSlot};
use crate::trace::{self, Tracer};
use crate::tracing::internal::{
    log_allocation_exhausted, log_heap_init, log_heap_teardown, log_out_of_memory, next_gc_id,
    trace_gc_collection,
};

const F64_SIZE: usize = std::mem::size_of::<f64>();

/// A garbage-collected heap.
///
/// Owns one arena and reclaims it under the policy chosen at construction.
/// Objects are named by [`ObjRef`], an absolute address inside the arena.
///
/// Under [`PolicyKind::Compact`] any allocation may collect and therefore
/// move objects: an `ObjRef` held across an allocation is only valid if it
/// was re-read from a root afterwards.
pub struct Heap {
    pub(crate) arena: Arena,
    pub(crate) types: TypeTable,
    pub(crate) roots: RootSet,
    tracer: Tracer,
    reclaimer: Box<dyn Reclaim>,
    config: HeapConfig,
    high_water: usize,
    last_collection: Option<CollectStats>,
    collections: usize,
}

/// A validated object: where it is and what it is.
#[derive(Clone, Copy)]
struct Resolved {
    offset: usize,
    header: ObjectHeader,
    descriptor: &'static TypeDescriptor,
}

impl Resolved {
    fn instance_size(&self) -> usize {
        self.descriptor
            .instance_size(self.header.length as usize)
            .unwrap_or(HEADER_SIZE)
    }
}

impl Heap {
    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create a heap of `heap_size` bytes reclaimed under `policy`.
    ///
    /// # Errors
    ///
    /// [`GcError::InvalidHeapSize`] when the size cannot hold one object
    /// header, [`GcError::Map`] when the backing memory cannot be mapped.
    pub fn new(heap_size: usize, policy: PolicyKind) -> Result<Self> {
        Self::with_config(HeapConfig::new().heap_size(heap_size).policy(policy))
    }

    /// Create a heap from a full configuration.
    ///
    /// # Errors
    ///
    /// See [`Heap::new`].
    pub fn with_config(config: HeapConfig) -> Result<Self> {
        let mut arena = Arena::new(config.heap_size, config.populate)?;
        let reclaimer = policy::build(config.policy, &mut arena);
        log_heap_init(arena.size(), config.policy.as_str(), config.root_capacity);
        Ok(Self {
            arena,
            types: TypeTable::new(),
            roots: RootSet::new(config.root_capacity),
            tracer: Tracer::new(),
            reclaimer,
            config,
            high_water: 0,
            last_collection: None,
            collections: 0,
        })
    }

    /// Release the heap and its backing memory.
    ///
    /// Equivalent to dropping it.
    pub fn teardown(self) {
        drop(self);
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate a zeroed instance of a fixed-size type.
    ///
    /// # Errors
    ///
    /// [`GcError::OutOfMemory`] when no storage is found even after a
    /// collection.
    pub fn allocate_typed(&mut self, descriptor: &'static TypeDescriptor) -> Result<ObjRef> {
        self.allocate_object(descriptor, 0)
    }

    /// Allocate a zeroed instance of a variable-length type with `count`
    /// elements. For fixed-size types `count` is ignored.
    ///
    /// # Errors
    ///
    /// [`GcError::OutOfMemory`] when no storage is found even after a
    /// collection.
    pub fn allocate_variable(
        &mut self,
        descriptor: &'static TypeDescriptor,
        count: usize,
    ) -> Result<ObjRef> {
        self.allocate_object(descriptor, count)
    }

    /// Allocate a zeroed `T`.
    ///
    /// # Errors
    ///
    /// [`GcError::OutOfMemory`] when no storage is found even after a
    /// collection.
    pub fn allocate<T: Describe>(&mut self) -> Result<ObjRef> {
        self.allocate_typed(T::descriptor())
    }

    /// Allocate a text object holding a copy of `text`.
    ///
    /// # Errors
    ///
    /// [`GcError::OutOfMemory`] when no storage is found even after a
    /// collection.
    pub fn allocate_text(&mut self, text: &str) -> Result<ObjRef> {
        let obj = self.allocate_object(&TEXT, text.len())?;
        self.write_text(obj, text)?;
        Ok(obj)
    }

    /// Allocate a vector of `f64` holding a copy of `values`.
    ///
    /// # Errors
    ///
    /// [`GcError::OutOfMemory`] when no storage is found even after a
    /// collection.
    pub fn allocate_vector(&mut self, values: &[f64]) -> Result<ObjRef> {
        let obj = self.allocate_object(&VECTOR, values.len())?;
        for (index, &value) in values.iter().enumerate() {
            self.set_vector_element(obj, index, value)?;
        }
        Ok(obj)
    }

    fn allocate_object(
        &mut self,
        descriptor: &'static TypeDescriptor,
        count: usize,
    ) -> Result<ObjRef> {
        let count = if descriptor.is_variable() { count } else { 0 };
        let too_large = || GcError::OutOfMemory {
            requested: usize::MAX,
            policy: self.config.policy,
        };
        let length = u32::try_from(count).map_err(|_| too_large())?;
        let size = descriptor.allocation_size(count).ok_or_else(too_large)?;
        let type_index = self.types.register(descriptor)?;

        let offset = self.allocate_storage(size)?;
        self.arena.zero(offset, size);
        ObjectHeader {
            type_index,
            length,
            marked: self.reclaimer.premark(),
        }
        .write(&mut self.arena, offset);
        Ok(self.arena.obj_ref(offset))
    }

    /// Find `size` bytes: ask the policy, collect on failure, ask once more.
    pub(crate) fn allocate_storage(&mut self, size: usize) -> Result<usize> {
        let policy = self.reclaimer.kind();
        let size = align_to_word(size.max(HEADER_SIZE)).ok_or(GcError::OutOfMemory {
            requested: size,
            policy,
        })?;

        if let Some(offset) = self.reclaimer.allocate(&mut self.arena, size) {
            return Ok(self.note_allocation(offset, size));
        }

        log_allocation_exhausted(size, policy.as_str());
        self.collect();

        if let Some(offset) = self.reclaimer.allocate(&mut self.arena, size) {
            return Ok(self.note_allocation(offset, size));
        }

        log_out_of_memory(size, policy.as_str());
        Err(GcError::OutOfMemory {
            requested: size,
            policy,
        })
    }

    fn note_allocation(&mut self, offset: usize, size: usize) -> usize {
        self.high_water = self.high_water.max(offset + size);
        offset
    }

    // ------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------

    /// Register a root.
    ///
    /// # Panics
    ///
    /// Panics when the root table is full; use [`Heap::try_push_root`] to
    /// handle that case.
    pub fn push_root(&mut self, value: Option<ObjRef>) -> RootSlot {
        self.roots.push(value)
    }

    /// Register a root, reporting overflow instead of panicking.
    ///
    /// # Errors
    ///
    /// [`GcError::RootOverflow`] when the root table is full.
    pub fn try_push_root(&mut self, value: Option<ObjRef>) -> Result<RootSlot> {
        self.roots.try_push(value)
    }

    /// Current value of a root. Follows relocation by compaction.
    ///
    /// # Errors
    ///
    /// [`GcError::ReleasedRoot`] when the slot was truncated away.
    pub fn root(&self, slot: RootSlot) -> Result<Option<ObjRef>> {
        self.roots.get(slot)
    }

    /// Overwrite a root.
    ///
    /// # Errors
    ///
    /// [`GcError::ReleasedRoot`] when the slot was truncated away.
    pub fn set_root(&mut self, slot: RootSlot, value: Option<ObjRef>) -> Result<()> {
        self.roots.set(slot, value)
    }

    /// Number of registered roots.
    #[must_use]
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Drop every root registered after the first `depth`.
    pub fn truncate_roots(&mut self, depth: usize) {
        self.roots.truncate(depth);
    }

    /// Open a root scope; roots pushed through it are released when it is
    /// dropped.
    pub fn root_scope(&mut self) -> RootScope<'_> {
        RootScope::new(self)
    }

    /// Run `f` inside a root scope.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let mut scope = self.root_scope();
        f(&mut scope)
    }

    // ------------------------------------------------------------------
    // Object access
    // ------------------------------------------------------------------

    fn resolve(&self, obj: ObjRef) -> Result<Resolved> {
        let invalid = || GcError::InvalidReference { address: obj.addr() };
        let offset = self
            .arena
            .offset_of(obj)
            .filter(|&offset| self.arena.in_bounds(offset, HEADER_SIZE))
            .ok_or_else(invalid)?;
        let header = ObjectHeader::read(&self.arena, offset);
        let descriptor = self.types.describe(&header).ok_or_else(invalid)?;
        let resolved = Resolved {
            offset,
            header,
            descriptor,
        };
        if !self.arena.in_bounds(offset, resolved.instance_size()) {
            return Err(invalid());
        }
        Ok(resolved)
    }

    fn pointer_slot(&self, obj: ObjRef, index: usize) -> Result<usize> {
        let resolved = self.resolve(obj)?;
        let offsets = resolved.descriptor.pointer_offsets;
        let field = offsets.get(index).ok_or(GcError::IndexOutOfRange {
            type_name: resolved.descriptor.name,
            index,
            count: offsets.len(),
        })?;
        let slot = resolved.offset + field;
        if !self.arena.in_bounds(slot, WORD_SIZE) {
            return Err(GcError::InvalidReference { address: obj.addr() });
        }
        Ok(slot)
    }

    /// Read the `index`-th pointer field of `obj`.
    ///
    /// # Errors
    ///
    /// [`GcError::InvalidReference`] for a stale or foreign reference,
    /// [`GcError::IndexOutOfRange`] when the type has fewer pointer fields.
    pub fn field(&self, obj: ObjRef, index: usize) -> Result<Option<ObjRef>> {
        let slot = self.pointer_slot(obj, index)?;
        Ok(NonZeroUsize::new(self.arena.read_word(slot)).map(ObjRef::from_addr))
    }

    /// Write the `index`-th pointer field of `obj`.
    ///
    /// # Errors
    ///
    /// See [`Heap::field`].
    pub fn set_field(&mut self, obj: ObjRef, index: usize, value: Option<ObjRef>) -> Result<()> {
        let slot = self.pointer_slot(obj, index)?;
        self.arena.write_word(slot, value.map_or(0, ObjRef::addr));
        Ok(())
    }

    /// Descriptor of `obj`.
    ///
    /// # Errors
    ///
    /// [`GcError::InvalidReference`] for a stale or foreign reference.
    pub fn type_of(&self, obj: ObjRef) -> Result<&'static TypeDescriptor> {
        Ok(self.resolve(obj)?.descriptor)
    }

    /// Element count of `obj` (0 for fixed-size types).
    ///
    /// # Errors
    ///
    /// [`GcError::InvalidReference`] for a stale or foreign reference.
    pub fn length(&self, obj: ObjRef) -> Result<usize> {
        Ok(self.resolve(obj)?.header.length as usize)
    }

    /// Bytes `obj` occupies in the arena, padding included.
    ///
    /// # Errors
    ///
    /// [`GcError::InvalidReference`] for a stale or foreign reference.
    pub fn size_of(&self, obj: ObjRef) -> Result<usize> {
        let resolved = self.resolve(obj)?;
        self.types
            .object_size(&resolved.header)
            .ok_or(GcError::InvalidReference { address: obj.addr() })
    }

    /// The bytes following the header, up to the end of the instance.
    ///
    /// # Errors
    ///
    /// [`GcError::InvalidReference`] for a stale or foreign reference.
    pub fn payload(&self, obj: ObjRef) -> Result<&[u8]> {
        let resolved = self.resolve(obj)?;
        Ok(self.arena.bytes(
            resolved.offset + HEADER_SIZE,
            resolved.instance_size() - HEADER_SIZE,
        ))
    }

    /// Mutable view of [`Heap::payload`].
    ///
    /// # Errors
    ///
    /// [`GcError::InvalidReference`] for a stale or foreign reference.
    pub fn payload_mut(&mut self, obj: ObjRef) -> Result<&mut [u8]> {
        let resolved = self.resolve(obj)?;
        Ok(self.arena.bytes_mut(
            resolved.offset + HEADER_SIZE,
            resolved.instance_size() - HEADER_SIZE,
        ))
    }

    fn resolve_text(&self, obj: ObjRef) -> Result<Resolved> {
        let resolved = self.resolve(obj)?;
        if resolved.descriptor.is_text() {
            Ok(resolved)
        } else {
            Err(GcError::TypeMismatch {
                expected: TEXT.name,
                found: resolved.descriptor.name,
            })
        }
    }

    /// Contents of a text object, up to the first NUL.
    ///
    /// # Errors
    ///
    /// [`GcError::TypeMismatch`] when `obj` is not a text object.
    pub fn text(&self, obj: ObjRef) -> Result<Cow<'_, str>> {
        let resolved = self.resolve_text(obj)?;
        let bytes = self.arena.bytes(
            resolved.offset + resolved.descriptor.fixed_size(),
            resolved.header.length as usize,
        );
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]))
    }

    /// Replace the contents of a text object. Bytes past the end of `text`
    /// are zeroed.
    ///
    /// # Errors
    ///
    /// [`GcError::TypeMismatch`] when `obj` is not a text object,
    /// [`GcError::TextTooLong`] when `text` exceeds its element count.
    pub fn write_text(&mut self, obj: ObjRef, text: &str) -> Result<()> {
        let resolved = self.resolve_text(obj)?;
        let capacity = resolved.header.length as usize;
        if text.len() > capacity {
            return Err(GcError::TextTooLong {
                len: text.len(),
                capacity,
            });
        }
        let bytes = self.arena.bytes_mut(
            resolved.offset + resolved.descriptor.fixed_size(),
            capacity,
        );
        let (head, tail) = bytes.split_at_mut(text.len());
        head.copy_from_slice(text.as_bytes());
        tail.fill(0);
        Ok(())
    }

    fn resolve_vector(&self, obj: ObjRef) -> Result<Resolved> {
        let resolved = self.resolve(obj)?;
        if std::ptr::eq(resolved.descriptor, &VECTOR) {
            Ok(resolved)
        } else {
            Err(GcError::TypeMismatch {
                expected: VECTOR.name,
                found: resolved.descriptor.name,
            })
        }
    }

    /// Elements of a vector object.
    ///
    /// # Errors
    ///
    /// [`GcError::TypeMismatch`] when `obj` is not a vector object.
    pub fn vector(&self, obj: ObjRef) -> Result<Vec<f64>> {
        let resolved = self.resolve_vector(obj)?;
        let count = resolved.header.length as usize;
        let bytes = self.arena.bytes(
            resolved.offset + resolved.descriptor.fixed_size(),
            count * F64_SIZE,
        );
        Ok(bytes
            .chunks_exact(F64_SIZE)
            .map(|chunk| {
                let mut raw = [0; F64_SIZE];
                raw.copy_from_slice(chunk);
                f64::from_ne_bytes(raw)
            })
            .collect())
    }

    /// Overwrite one element of a vector object.
    ///
    /// # Errors
    ///
    /// [`GcError::TypeMismatch`] when `obj` is not a vector object,
    /// [`GcError::IndexOutOfRange`] when `index` is past its length.
    pub fn set_vector_element(&mut self, obj: ObjRef, index: usize, value: f64) -> Result<()> {
        let resolved = self.resolve_vector(obj)?;
        let count = resolved.header.length as usize;
        if index >= count {
            return Err(GcError::IndexOutOfRange {
                type_name: resolved.descriptor.name,
                index,
                count,
            });
        }
        let at = resolved.offset + resolved.descriptor.fixed_size() + index * F64_SIZE;
        self.arena
            .bytes_mut(at, F64_SIZE)
            .copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    /// Offset of `obj` from the arena base, or `None` when it lies outside.
    #[must_use]
    pub fn offset_of(&self, obj: ObjRef) -> Option<usize> {
        self.arena.offset_of(obj)
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Run one full collection under the active policy.
    pub fn collect(&mut self) -> CollectStats {
        let policy = self.reclaimer.kind();
        let gc_id = next_gc_id();
        let _span = trace_gc_collection(policy.as_str(), gc_id);
        let start = Instant::now();
        let frontier_before = self.reclaimer.frontier(&self.arena);

        let mut timer = PhaseTimer::new();
        let reclaimed = self.reclaimer.collect(
            Space {
                arena: &mut self.arena,
                types: &self.types,
                roots: &mut self.roots,
                tracer: &mut self.tracer,
            },
            &mut timer,
        );

        let stats = CollectStats {
            gc_id: gc_id.0,
            policy,
            objects_live: reclaimed.objects_live,
            bytes_live: reclaimed.bytes_live,
            objects_reclaimed: reclaimed.objects_reclaimed,
            bytes_reclaimed: reclaimed.bytes_reclaimed,
            frontier_before,
            frontier_after: self.reclaimer.frontier(&self.arena),
            clear_duration: timer.clear,
            mark_duration: timer.mark,
            reclaim_duration: timer.reclaim,
            duration: start.elapsed(),
        };
        self.last_collection = Some(stats);
        self.collections += 1;
        stats
    }

    /// Statistics of the most recent collection.
    #[must_use]
    pub const fn last_collection(&self) -> Option<&CollectStats> {
        self.last_collection.as_ref()
    }

    /// Number of collections run so far.
    #[must_use]
    pub const fn total_collections(&self) -> usize {
        self.collections
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The policy's next-free offset: the bump frontier, or the head of the
    /// free list under [`PolicyKind::Sweep`].
    #[must_use]
    pub fn frontier(&self) -> usize {
        self.reclaimer.frontier(&self.arena)
    }

    /// Highest arena offset any allocation has reached.
    #[must_use]
    pub const fn high_water(&self) -> usize {
        self.high_water
    }

    /// Objects the policy is tracking. Sweep and scan-reuse count every
    /// address ever allocated; compact counts objects below the frontier.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.reclaimer.object_count(&self.arena, &self.types)
    }

    /// Objects found live by the last collection.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.last_collection.map_or(0, |stats| stats.objects_live)
    }

    /// Objects currently reachable from the roots, in address order.
    ///
    /// Does not disturb mark bits.
    #[must_use]
    pub fn reachable(&self) -> Vec<ObjRef> {
        trace::reachable(&self.arena, &self.types, &self.roots)
            .into_iter()
            .map(|offset| self.arena.obj_ref(offset))
            .collect()
    }

    /// Usable arena size in bytes.
    #[must_use]
    pub const fn heap_size(&self) -> usize {
        self.arena.size()
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> PolicyKind {
        self.reclaimer.kind()
    }

    /// Configuration the heap was built from.
    #[must_use]
    pub const fn config(&self) -> &HeapConfig {
        &self.config
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        log_heap_teardown(self.arena.size(), self.collections);
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("policy", &self.reclaimer.kind())
            .field("heap_size", &self.arena.size())
            .field("frontier", &self.frontier())
            .field("roots", &self.roots.len())
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}
