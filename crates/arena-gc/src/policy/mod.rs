//! Reclamation policies.
//!
//! Every policy owns the arena's free-space bookkeeping and decides what a
//! collection does with the objects the tracer leaves unmarked. The heap
//! talks to the active policy only through [`Reclaim`].

mod compact;
mod scan_reuse;
mod sweep;

pub(crate) use compact::Compact;
pub(crate) use scan_reuse::ScanReuse;
pub(crate) use sweep::Sweep;

use crate::arena::Arena;
use crate::config::PolicyKind;
use crate::descriptor::TypeTable;
use crate::metrics::{PhaseTimer, Reclaimed};
use crate::roots::RootSet;
use crate::trace::Tracer;
use crate::tracing::internal::{log_phase_end, log_phase_start, trace_phase, GcPhase};

/// Everything a collection may touch.
pub(crate) struct Space<'a> {
    pub arena: &'a mut Arena,
    pub types: &'a TypeTable,
    pub roots: &'a mut RootSet,
    pub tracer: &'a mut Tracer,
}

impl Space<'_> {
    /// Run the mark phase, returning the number of live objects.
    pub fn mark(&mut self, timer: &mut PhaseTimer, frontier: usize) -> usize {
        let _span = trace_phase(GcPhase::Mark);
        log_phase_start(GcPhase::Mark, frontier);
        timer.start();
        let marked = self.tracer.mark_live(self.arena, self.types, self.roots);
        timer.end_mark();
        log_phase_end(GcPhase::Mark, marked, 0);
        marked
    }
}

/// A reclamation discipline.
pub(crate) trait Reclaim {
    fn kind(&self) -> PolicyKind;

    /// Find `size` bytes (word-aligned, at least one header) without
    /// collecting. Returns the offset of the storage.
    fn allocate(&mut self, arena: &mut Arena, size: usize) -> Option<usize>;

    /// Whether fresh objects start out marked.
    fn premark(&self) -> bool {
        false
    }

    /// Trace and reclaim.
    fn collect(&mut self, space: Space<'_>, timer: &mut PhaseTimer) -> Reclaimed;

    /// The policy's notion of "next free": bump frontier or free-list head.
    fn frontier(&self, arena: &Arena) -> usize;

    /// Objects the policy currently tracks.
    fn object_count(&self, arena: &Arena, types: &TypeTable) -> usize;
}

/// Instantiate `kind` over a freshly mapped arena.
pub(crate) fn build(kind: PolicyKind, arena: &mut Arena) -> Box<dyn Reclaim> {
    match kind {
        PolicyKind::Sweep => Box::new(Sweep::new(arena)),
        PolicyKind::ScanReuse => Box::new(ScanReuse::new()),
        PolicyKind::Compact => Box::new(Compact::new()),
    }
}
