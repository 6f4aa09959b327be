//! Precise tracing (the mark phase).
//!
//! Marking walks the object graph depth-first from every root whose value
//! lies inside the arena, following the pointer fields named by each
//! object's descriptor. Pending targets sit on an explicit worklist; an
//! object is marked and appended to the live list the first time it is
//! popped, and popping an already-marked object does nothing. A back-edge
//! therefore stops at its target, and deep graphs do not grow the call
//! stack.

use std::collections::HashSet;

use crate::arena::{Arena, WORD_SIZE};
use crate::descriptor::{TypeDescriptor, TypeTable};
use crate::object::{is_marked, set_marked, ObjectHeader, HEADER_SIZE};
use crate::roots::RootSet;

/// Where visited objects are recorded.
pub(crate) trait MarkSink {
    fn arena(&self) -> &Arena;

    /// Record `offset` as reached; `true` the first time.
    fn mark(&mut self, offset: usize) -> bool;
}

/// Marks in object headers.
struct HeaderMarks<'a> {
    arena: &'a mut Arena,
}

impl MarkSink for HeaderMarks<'_> {
    fn arena(&self) -> &Arena {
        self.arena
    }

    fn mark(&mut self, offset: usize) -> bool {
        if is_marked(self.arena, offset) {
            return false;
        }
        set_marked(self.arena, offset, true);
        true
    }
}

/// Marks in a side set, leaving headers untouched.
struct VisitedSet<'a> {
    arena: &'a Arena,
    seen: HashSet<usize>,
}

impl MarkSink for VisitedSet<'_> {
    fn arena(&self) -> &Arena {
        self.arena
    }

    fn mark(&mut self, offset: usize) -> bool {
        self.seen.insert(offset)
    }
}

/// The tracer and its scratch state.
///
/// `live` is the live-object list of the most recent trace, in discovery
/// order. It is valid until the next trace or until a reclaimer consumes
/// it.
#[derive(Debug, Default)]
pub struct Tracer {
    worklist: Vec<usize>,
    live: Vec<usize>,
}

impl Tracer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            worklist: Vec::with_capacity(256),
            live: Vec::new(),
        }
    }

    /// Mark every object reachable from `roots` and fill the live list.
    ///
    /// Returns the number of objects marked. Objects already marked before
    /// the call are treated as visited, so callers clear marks first.
    pub fn mark_live(&mut self, arena: &mut Arena, types: &TypeTable, roots: &RootSet) -> usize {
        self.live.clear();
        let mut sink = HeaderMarks { arena };
        walk(&mut self.worklist, &mut self.live, types, roots, &mut sink);
        self.live.len()
    }

    /// Take the live list, leaving it empty.
    pub fn take_live(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.live)
    }

    /// Forget the live list without touching marks.
    pub fn clear(&mut self) {
        self.live.clear();
        self.worklist.clear();
    }
}

/// Objects reachable from `roots`, sorted by address, computed without
/// touching any header.
#[must_use]
pub fn reachable(arena: &Arena, types: &TypeTable, roots: &RootSet) -> Vec<usize> {
    let mut worklist = Vec::new();
    let mut live = Vec::new();
    let mut sink = VisitedSet {
        arena,
        seen: HashSet::new(),
    };
    walk(&mut worklist, &mut live, types, roots, &mut sink);
    live.sort_unstable();
    live
}

fn walk<S: MarkSink>(
    worklist: &mut Vec<usize>,
    live: &mut Vec<usize>,
    types: &TypeTable,
    roots: &RootSet,
    sink: &mut S,
) {
    worklist.clear();

    // Roots pointing outside the arena are not ours to trace.
    worklist.extend(
        roots
            .iter()
            .flatten()
            .filter_map(|root| sink.arena().offset_of(root)),
    );

    while let Some(offset) = worklist.pop() {
        let Some((descriptor, size)) = layout_at(sink.arena(), types, offset) else {
            continue;
        };
        if !sink.mark(offset) {
            continue;
        }
        live.push(offset);

        let arena = sink.arena();
        for &field in descriptor.pointer_offsets {
            if field + WORD_SIZE > size || !arena.in_bounds(offset + field, WORD_SIZE) {
                continue;
            }
            if let Some(target) = arena.read_pointer(offset + field) {
                worklist.push(target);
            }
        }
    }
}

/// Descriptor and instance size of the object at `offset`, or `None` when
/// the bytes there do not name a registered type.
fn layout_at(
    arena: &Arena,
    types: &TypeTable,
    offset: usize,
) -> Option<(&'static TypeDescriptor, usize)> {
    if !arena.in_bounds(offset, HEADER_SIZE) {
        return None;
    }
    let header = ObjectHeader::read(arena, offset);
    let descriptor = types.describe(&header)?;
    let size = descriptor.instance_size(header.length as usize)?;
    Some((descriptor, size))
}
