//! GC tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! spans and events for collector operations. Without it the same functions
//! exist as no-ops so call sites stay unconditional.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::{span, Level};

    /// High-level collection phases.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GcPhase {
        /// Reset mark bits left by an earlier cycle.
        Clear,
        /// Trace live object graph.
        Mark,
        /// Sweep, or compute forwarding addresses and move objects.
        Reclaim,
    }

    /// Stable identifier for a collection.
    ///
    /// Monotonically increasing across every heap in the process, starting
    /// at 1, so events from one collection can be correlated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    static NEXT_GC_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate the next unique GC ID.
    pub fn next_gc_id() -> GcId {
        GcId(NEXT_GC_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Span covering a whole collection.
    pub fn trace_gc_collection(policy: &str, gc_id: GcId) -> span::EnteredSpan {
        span!(Level::DEBUG, "gc_collect", policy = policy, gc_id = gc_id.0).entered()
    }

    /// Span covering one phase.
    pub fn trace_phase(phase: GcPhase) -> span::EnteredSpan {
        span!(Level::DEBUG, "gc_phase", phase = ?phase).entered()
    }

    pub fn log_phase_start(phase: GcPhase, frontier: usize) {
        tracing::debug!(phase = ?phase, frontier, "phase_start");
    }

    pub fn log_phase_end(phase: GcPhase, objects: usize, bytes: usize) {
        tracing::debug!(phase = ?phase, objects, bytes, "phase_end");
    }

    pub fn log_heap_init(heap_size: usize, policy: &str, root_capacity: usize) {
        tracing::debug!(heap_size, policy, root_capacity, "heap_init");
    }

    pub fn log_heap_teardown(heap_size: usize, collections: usize) {
        tracing::debug!(heap_size, collections, "heap_teardown");
    }

    pub fn log_allocation_exhausted(requested: usize, policy: &str) {
        tracing::debug!(requested, policy, "allocation_exhausted");
    }

    pub fn log_out_of_memory(requested: usize, policy: &str) {
        tracing::warn!(requested, policy, "out_of_memory");
    }

    pub fn log_chunk_freed(offset: usize, size: usize) {
        tracing::trace!(offset, size, "chunk_freed");
    }

    pub fn log_slot_reused(offset: usize, capacity: usize, requested: usize) {
        tracing::trace!(offset, capacity, requested, "slot_reused");
    }

    pub fn log_object_moved(from: usize, to: usize, size: usize) {
        tracing::trace!(from, to, size, "object_moved");
    }
}

#[cfg(not(feature = "tracing"))]
#[allow(clippy::missing_const_for_fn)]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};

    /// High-level collection phases.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GcPhase {
        Clear,
        Mark,
        Reclaim,
    }

    /// Stable identifier for a collection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Stand-in for an entered span.
    pub struct NoSpan;

    static NEXT_GC_ID: AtomicU64 = AtomicU64::new(1);

    pub fn next_gc_id() -> GcId {
        GcId(NEXT_GC_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn trace_gc_collection(_policy: &str, _gc_id: GcId) -> NoSpan {
        NoSpan
    }

    pub fn trace_phase(_phase: GcPhase) -> NoSpan {
        NoSpan
    }

    pub fn log_phase_start(_phase: GcPhase, _frontier: usize) {}

    pub fn log_phase_end(_phase: GcPhase, _objects: usize, _bytes: usize) {}

    pub fn log_heap_init(_heap_size: usize, _policy: &str, _root_capacity: usize) {}

    pub fn log_heap_teardown(_heap_size: usize, _collections: usize) {}

    pub fn log_allocation_exhausted(_requested: usize, _policy: &str) {}

    pub fn log_out_of_memory(_requested: usize, _policy: &str) {}

    pub fn log_chunk_freed(_offset: usize, _size: usize) {}

    pub fn log_slot_reused(_offset: usize, _capacity: usize, _requested: usize) {}

    pub fn log_object_moved(_from: usize, _to: usize, _size: usize) {}
}

