//! Mark-and-compact (sliding, address-ordered).
//!
//! Allocation bumps a frontier. A collection slides every live object down
//! to the lowest free address while preserving address order:
//!
//! 1. mark, then sort the live list by address
//! 2. assign each live object its destination by bumping from offset 0
//! 3. rewrite roots, then every pointer field of every live object, through
//!    the forwarding table; clear marks on the way
//! 4. move objects in ascending order
//!
//! Destinations never exceed sources, so moving in ascending order never
//! clobbers an object that has not moved yet. An object sliding by less
//! than its own size overlaps itself, which the arena's move tolerates.

use super::{Reclaim, Space};
use crate::arena::{Arena, WORD_SIZE};
use crate::config::PolicyKind;
use crate::descriptor::TypeTable;
use crate::metrics::{PhaseTimer, Reclaimed};
use crate::object::{set_marked, ObjectHeader, HEADER_SIZE};
use crate::tracing::internal::{
    log_object_moved, log_phase_end, log_phase_start, trace_phase, GcPhase,
};

/// One entry of the forwarding table.
#[derive(Debug, Clone, Copy)]
struct Forward {
    from: usize,
    to: usize,
    size: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Compact {
    frontier: usize,
}

impl Compact {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Destination of the object at `offset`, if it is being forwarded.
fn forwarded(table: &[Forward], offset: usize) -> Option<usize> {
    table
        .binary_search_by_key(&offset, |entry| entry.from)
        .ok()
        .map(|i| table[i].to)
}

/// Count objects by parsing the arena from offset 0 up to `frontier`.
fn count_objects(arena: &Arena, types: &TypeTable, frontier: usize) -> usize {
    let mut offset = 0;
    let mut count = 0;
    while offset < frontier && arena.in_bounds(offset, HEADER_SIZE) {
        let header = ObjectHeader::read(arena, offset);
        let Some(size) = types.object_size(&header) else {
            break;
        };
        count += 1;
        offset += size;
    }
    count
}

impl Reclaim for Compact {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Compact
    }

    fn allocate(&mut self, arena: &mut Arena, size: usize) -> Option<usize> {
        let end = self.frontier.checked_add(size)?;
        if end > arena.size() {
            return None;
        }
        let offset = self.frontier;
        self.frontier = end;
        Some(offset)
    }

    fn collect(&mut self, mut space: Space<'_>, timer: &mut PhaseTimer) -> Reclaimed {
        let frontier_before = self.frontier;
        let objects_before = count_objects(space.arena, space.types, frontier_before);

        space.mark(timer, frontier_before);

        let _span = trace_phase(GcPhase::Reclaim);
        log_phase_start(GcPhase::Reclaim, frontier_before);
        timer.start();

        let mut live = space.tracer.take_live();
        live.sort_unstable();

        let arena_size = space.arena.size();
        let mut table = Vec::with_capacity(live.len());
        let mut next = 0;
        for &from in &live {
            let header = ObjectHeader::read(space.arena, from);
            let size = space
                .types
                .object_size(&header)
                .unwrap_or(HEADER_SIZE)
                .min(arena_size - from);
            table.push(Forward {
                from,
                to: next,
                size,
            });
            next += size;
        }

        for root in space.roots.iter_mut() {
            let Some(obj) = *root else { continue };
            let Some(offset) = space.arena.offset_of(obj) else {
                continue;
            };
            if let Some(to) = forwarded(&table, offset) {
                *root = Some(space.arena.obj_ref(to));
            }
        }

        for entry in &table {
            let header = ObjectHeader::read(space.arena, entry.from);
            if let Some(descriptor) = space.types.describe(&header) {
                for &field in descriptor.pointer_offsets {
                    if field + WORD_SIZE > entry.size {
                        continue;
                    }
                    let slot = entry.from + field;
                    if let Some(to) = space
                        .arena
                        .read_pointer(slot)
                        .and_then(|target| forwarded(&table, target))
                    {
                        space.arena.write_pointer(slot, Some(to));
                    }
                }
            }
            set_marked(space.arena, entry.from, false);
        }

        for entry in &table {
            if entry.from != entry.to {
                space.arena.move_bytes(entry.from, entry.to, entry.size);
                log_object_moved(entry.from, entry.to, entry.size);
            }
        }

        self.frontier = next;
        timer.end_reclaim();

        let stats = Reclaimed {
            objects_live: table.len(),
            bytes_live: next,
            objects_reclaimed: objects_before.saturating_sub(table.len()),
            bytes_reclaimed: frontier_before.saturating_sub(next),
        };
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

    fn object_count(&self, arena: &Arena, types: &TypeTable) -> usize {
        count_objects(arena, types, self.frontier)
    }
}
