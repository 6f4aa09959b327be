//! Mark without sweep.
//!
//! Storage is bumped from a frontier and every allocation is recorded in
//! an object table. New objects start out marked, so nothing is reusable
//! until a collection has cleared the table and re-marked what is
//! reachable. Once the frontier hits the end of the arena, allocation
//! scans the table in allocation order for the first unmarked record large
//! enough and hands it out whole. Marks stay set between collections; that
//! is the state the reuse scan reads.

use super::{Reclaim, Space};
use crate::arena::Arena;
use crate::config::PolicyKind;
use crate::descriptor::TypeTable;
use crate::metrics::{PhaseTimer, Reclaimed};
use crate::object::{is_marked, set_marked};
use crate::tracing::internal::{
    log_phase_end, log_phase_start, log_slot_reused, trace_phase, GcPhase,
};

#[derive(Debug, Clone, Copy)]
struct Record {
    offset: usize,
    capacity: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ScanReuse {
    frontier: usize,
    objects: Vec<Record>,
}

impl ScanReuse {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reclaim for ScanReuse {
    fn kind(&self) -> PolicyKind {
        PolicyKind::ScanReuse
    }

    fn allocate(&mut self, arena: &mut Arena, size: usize) -> Option<usize> {
        if let Some(end) = self
            .frontier
            .checked_add(size)
            .filter(|&end| end <= arena.size())
        {
            let offset = self.frontier;
            self.frontier = end;
            self.objects.push(Record {
                offset,
                capacity: size,
            });
            return Some(offset);
        }

        let record = self
            .objects
            .iter()
            .find(|record| record.capacity >= size && !is_marked(arena, record.offset))?;
        log_slot_reused(record.offset, record.capacity, size);
        Some(record.offset)
    }

    fn premark(&self) -> bool {
        true
    }

    fn collect(&mut self, mut space: Space<'_>, timer: &mut PhaseTimer) -> Reclaimed {
        {
            let _span = trace_phase(GcPhase::Clear);
            log_phase_start(GcPhase::Clear, self.frontier);
            timer.start();
            for record in &self.objects {
                set_marked(space.arena, record.offset, false);
            }
            timer.end_clear();
            log_phase_end(GcPhase::Clear, self.objects.len(), 0);
        }

        space.mark(timer, self.frontier);

        let _span = trace_phase(GcPhase::Reclaim);
        log_phase_start(GcPhase::Reclaim, self.frontier);
        timer.start();
        let mut stats = Reclaimed::default();
        for record in &self.objects {
            if is_marked(space.arena, record.offset) {
                stats.objects_live += 1;
                stats.bytes_live += record.capacity;
            } else {
                stats.objects_reclaimed += 1;
                stats.bytes_reclaimed += record.capacity;
            }
        }
        // Marks are the reuse state; only the live list goes.
        space.tracer.clear();
        timer.end_reclaim();
        log_phase_end(
            GcPhase::Reclaim,
            stats.objects_reclaimed,
            stats.bytes_reclaimed,
        );
        stats
    }

    fn frontier(&self, _arena: &Arena) -> usize {
        self.frontier
    }

    fn object_count(&self, _arena: &Arena, _types: &TypeTable) -> usize {
        self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeDescriptor;
    use crate::object::ObjectHeader;
    use crate::roots::RootSet;
    use crate::trace::Tracer;

    static BLOB: TypeDescriptor = TypeDescriptor::fixed("Blob", 48, &[]);

    fn install(arena: &mut Arena, types: &mut TypeTable, offset: usize) {
        ObjectHeader {
            type_index: types.register(&BLOB).unwrap(),
            length: 0,
            marked: true,
        }
        .write(arena, offset);
    }

    #[test]
    fn test_nothing_reusable_before_collection() {
        let mut arena = Arena::new(96, false).unwrap();
        let mut types = TypeTable::new();
        let mut policy = ScanReuse::new();

        for expected in [0, 48] {
            let offset = policy.allocate(&mut arena, 48).unwrap();
            assert_eq!(offset, expected);
            install(&mut arena, &mut types, offset);
        }
        assert_eq!(policy.allocate(&mut arena, 48), None);
        assert_eq!(policy.frontier(&arena), 96);
    }

    #[test]
    fn test_collection_exposes_unreachable_slots() {
        let mut arena = Arena::new(96, false).unwrap();
        let mut types = TypeTable::new();
        let mut roots = RootSet::new(4);
        let mut tracer = Tracer::new();
        let mut policy = ScanReuse::new();

        for _ in 0..2 {
            let offset = policy.allocate(&mut arena, 48).unwrap();
            install(&mut arena, &mut types, offset);
        }
        roots.push(Some(arena.obj_ref(48)));

        let stats = policy.collect(
            Space {
                arena: &mut arena,
                types: &types,
                roots: &mut roots,
                tracer: &mut tracer,
            },
            &mut PhaseTimer::new(),
        );
        assert_eq!(stats.objects_live, 1);
        assert_eq!(stats.objects_reclaimed, 1);
        assert!(is_marked(&arena, 48));
        assert!(!is_marked(&arena, 0));

        // A smaller request takes the whole 48-byte slot.
        assert_eq!(policy.allocate(&mut arena, 24), Some(0));
        assert_eq!(policy.object_count(&arena, &types), 2);
    }
}
