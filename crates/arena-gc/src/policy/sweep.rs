//! Mark-and-sweep over a free list.
//!
//! Dead storage is threaded onto a singly linked free list whose nodes are
//! overlaid on the first two words of the dead object: the chunk size at
//! `+0` and the link at `+8`. Allocation is first fit. A chunk is taken
//! whole when it matches the request exactly, or split when the remainder
//! can still hold a chunk node; anything in between is skipped. Chunks are
//! never coalesced.

use std::collections::BTreeMap;

use super::{Reclaim, Space};
use crate::arena::{Arena, WORD_SIZE};
use crate::config::PolicyKind;
use crate::descriptor::TypeTable;
use crate::metrics::{PhaseTimer, Reclaimed};
use crate::object::{is_marked, set_marked};
use crate::tracing::internal::{
    log_chunk_freed, log_phase_end, log_phase_start, trace_phase, GcPhase,
};

/// Bytes of a free-chunk node.
const FREE_HEADER_SIZE: usize = 2 * WORD_SIZE;

#[derive(Debug, Clone, Copy)]
struct Record {
    capacity: usize,
    free: bool,
}

#[derive(Debug)]
pub(crate) struct Sweep {
    free_head: Option<usize>,
    /// Every address ever handed out. Reusing an address replaces its
    /// record.
    objects: BTreeMap<usize, Record>,
}

impl Sweep {
    /// Start with one free chunk spanning the whole arena.
    pub fn new(arena: &mut Arena) -> Self {
        write_chunk(arena, 0, arena.size(), None);
        Self {
            free_head: Some(0),
            objects: BTreeMap::new(),
        }
    }

    fn unlink(&mut self, arena: &mut Arena, prev: Option<usize>, replacement: Option<usize>) {
        match prev {
            Some(prev) => arena.write_pointer(prev + WORD_SIZE, replacement),
            None => self.free_head = replacement,
        }
    }
}

fn write_chunk(arena: &mut Arena, offset: usize, size: usize, next: Option<usize>) {
    arena.write_word(offset, size);
    arena.write_pointer(offset + WORD_SIZE, next);
}

impl Reclaim for Sweep {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Sweep
    }

    fn allocate(&mut self, arena: &mut Arena, size: usize) -> Option<usize> {
        let mut prev = None;
        let mut cursor = self.free_head;

        while let Some(chunk) = cursor {
            let chunk_size = arena.read_word(chunk);
            let next = arena.read_pointer(chunk + WORD_SIZE);

            if chunk_size == size {
                self.unlink(arena, prev, next);
            } else if size
                .checked_add(FREE_HEADER_SIZE)
                .is_some_and(|min| chunk_size >= min)
            {
                let rest = chunk + size;
                write_chunk(arena, rest, chunk_size - size, next);
                self.unlink(arena, prev, Some(rest));
            } else {
                prev = Some(chunk);
                cursor = next;
                continue;
            }

            self.objects.insert(
                chunk,
                Record {
                    capacity: size,
                    free: false,
                },
            );
            return Some(chunk);
        }
        None
    }

    fn collect(&mut self, mut space: Space<'_>, timer: &mut PhaseTimer) -> Reclaimed {
        let frontier = self.frontier(space.arena);
        space.mark(timer, frontier);

        let _span = trace_phase(GcPhase::Reclaim);
        log_phase_start(GcPhase::Reclaim, frontier);
        timer.start();

        let mut stats = Reclaimed::default();
        for (&offset, record) in &mut self.objects {
            if record.free {
                continue;
            }
            if is_marked(space.arena, offset) {
                set_marked(space.arena, offset, false);
                stats.objects_live += 1;
                stats.bytes_live += record.capacity;
            } else {
                write_chunk(space.arena, offset, record.capacity, self.free_head);
                self.free_head = Some(offset);
                record.free = true;
                stats.objects_reclaimed += 1;
                stats.bytes_reclaimed += record.capacity;
                log_chunk_freed(offset, record.capacity);
            }
        }
        space.tracer.clear();

        timer.end_reclaim();
        log_phase_end(
            GcPhase::Reclaim,
            stats.objects_reclaimed,
            stats.bytes_reclaimed,
        );
        stats
    }

    fn frontier(&self, arena: &Arena) -> usize {
        self.free_head.unwrap_or_else(|| arena.size())
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

    static CELL: TypeDescriptor = TypeDescriptor::fixed("Cell", 32, &[16]);

    struct Fixture {
        arena: Arena,
        types: TypeTable,
        roots: RootSet,
        tracer: Tracer,
        sweep: Sweep,
    }

    impl Fixture {
        fn new(size: usize) -> Self {
            let mut arena = Arena::new(size, false).unwrap();
            let sweep = Sweep::new(&mut arena);
            Self {
                arena,
                types: TypeTable::new(),
                roots: RootSet::new(8),
                tracer: Tracer::new(),
                sweep,
            }
        }

        fn cell(&mut self) -> Option<usize> {
            let offset = self.sweep.allocate(&mut self.arena, 32)?;
            self.arena.zero(offset, 32);
            ObjectHeader {
                type_index: self.types.register(&CELL).unwrap(),
                length: 0,
                marked: false,
            }
            .write(&mut self.arena, offset);
            Some(offset)
        }

        fn root(&mut self, offset: usize) {
            let obj = self.arena.obj_ref(offset);
            self.roots.push(Some(obj));
        }

        fn collect(&mut self) -> Reclaimed {
            let space = Space {
                arena: &mut self.arena,
                types: &self.types,
                roots: &mut self.roots,
                tracer: &mut self.tracer,
            };
            self.sweep.collect(space, &mut PhaseTimer::new())
        }
    }

    #[test]
    fn test_first_allocation_splits_initial_chunk() {
        let mut fx = Fixture::new(1000);
        assert_eq!(fx.cell(), Some(0));
        assert_eq!(fx.sweep.frontier(&fx.arena), 32);
        assert_eq!(fx.arena.read_word(32), 1000 - 32);
    }

    #[test]
    fn test_dead_object_heads_free_list() {
        let mut fx = Fixture::new(1000);
        let kept = fx.cell().unwrap();
        let dead = fx.cell().unwrap();
        fx.root(kept);

        let stats = fx.collect();
        assert_eq!(stats.objects_live, 1);
        assert_eq!(stats.objects_reclaimed, 1);
        assert_eq!(fx.sweep.frontier(&fx.arena), dead);
        assert!(!is_marked(&fx.arena, kept));

        // Exact fit reuses the freed address.
        assert_eq!(fx.cell(), Some(dead));
        assert_eq!(fx.sweep.object_count(&fx.arena, &fx.types), 2);
    }

    #[test]
    fn test_awkward_remainder_is_skipped() {
        // 48 bytes: a 32-byte request would leave 16, which is exactly one
        // chunk node, so it is split; a 40-byte request would leave 8 and is
        // skipped.
        let mut fx = Fixture::new(48);
        assert_eq!(fx.sweep.allocate(&mut fx.arena, 40), None);
        assert_eq!(fx.sweep.allocate(&mut fx.arena, 32), Some(0));
        assert_eq!(fx.sweep.allocate(&mut fx.arena, 16), Some(32));
        assert_eq!(fx.sweep.frontier(&fx.arena), 48);
    }

    #[test]
    fn test_huge_request_fails_without_overflow() {
        let mut fx = Fixture::new(1000);
        assert_eq!(fx.sweep.allocate(&mut fx.arena, usize::MAX - 15), None);
        assert_eq!(fx.cell(), Some(0));
    }

    #[test]
    fn test_second_collection_does_not_refree() {
        let mut fx = Fixture::new(1000);
        fx.cell().unwrap();
        let first = fx.collect();
        assert_eq!(first.objects_reclaimed, 1);
        let second = fx.collect();
        assert_eq!(second.objects_reclaimed, 0);
        assert_eq!(fx.sweep.frontier(&fx.arena), 0);
    }
}
