//! Collection statistics.

use std::time::{Duration, Instant};

use crate::config::PolicyKind;

/// Statistics from one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    /// Identifier correlating this collection with its log events.
    pub gc_id: u64,
    /// Policy that ran.
    pub policy: PolicyKind,
    /// Objects found reachable.
    pub objects_live: usize,
    /// Arena bytes occupied by reachable objects.
    pub bytes_live: usize,
    /// Objects whose storage became reusable.
    pub objects_reclaimed: usize,
    /// Bytes that became reusable.
    pub bytes_reclaimed: usize,
    /// Policy frontier before the collection.
    pub frontier_before: usize,
    /// Policy frontier after the collection.
    pub frontier_after: usize,
    /// Duration of the clear phase (mark bits reset).
    pub clear_duration: Duration,
    /// Duration of the mark phase.
    pub mark_duration: Duration,
    /// Duration of the reclaim phase (sweep, or compaction).
    pub reclaim_duration: Duration,
    /// Wall time of the whole collection.
    pub duration: Duration,
}

/// What a reclaimer reports back to the heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reclaimed {
    pub objects_live: usize,
    pub bytes_live: usize,
    pub objects_reclaimed: usize,
    pub bytes_reclaimed: usize,
}

/// Internal helper for capturing phase durations.
///
/// Collections time up to three phases:
/// - Clear: reset mark bits left by the previous cycle
/// - Mark: trace reachable objects
/// - Reclaim: sweep, or compute forwarding addresses and slide objects
#[derive(Debug, Clone, Copy)]
pub struct PhaseTimer {
    /// Accumulated clear phase time.
    pub clear: Duration,
    /// Accumulated mark phase time.
    pub mark: Duration,
    /// Accumulated reclaim phase time.
    pub reclaim: Duration,
    current_start: Option<Instant>,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimer {
    /// Create a new `PhaseTimer` with all durations set to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clear: Duration::ZERO,
            mark: Duration::ZERO,
            reclaim: Duration::ZERO,
            current_start: None,
        }
    }

    /// Start timing a phase.
    pub fn start(&mut self) {
        self.current_start = Some(Instant::now());
    }

    /// End the clear phase and record its duration.
    pub fn end_clear(&mut self) {
        if let Some(start) = self.current_start.take() {
            self.clear += start.elapsed();
        }
    }

    /// End the mark phase and record its duration.
    pub fn end_mark(&mut self) {
        if let Some(start) = self.current_start.take() {
            self.mark += start.elapsed();
        }
    }

    /// End the reclaim phase and record its duration.
    pub fn end_reclaim(&mut self) {
        if let Some(start) = self.current_start.take() {
            self.reclaim += start.elapsed();
        }
    }
}
