//! Root tracking.
//!
//! The root set is a bounded stack of slots living outside the arena. Each
//! slot holds the current value of one host-side reference variable; the
//! host names a slot by its [`RootSlot`] handle. Because the collector
//! owns the slots, a compacting collection rewrites them in place and the
//! host observes the relocated address on its next read.
//!
//! Function-scoped registration is save-depth-then-truncate: a
//! [`RootScope`] records the depth on entry and truncates back to it when
//! dropped, however the scope is left.

use std::ops::{Deref, DerefMut};

use crate::error::{GcError, Result};
use crate::heap::Heap;
use crate::object::ObjRef;

/// Handle to one registered root.
///
/// Valid until the root set is truncated below it. A handle whose slot was
/// released reports [`GcError::ReleasedRoot`]; if the depth has grown back
/// past it since, it names whatever root now occupies that position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootSlot(usize);

impl RootSlot {
    /// Position of this root in the root stack.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

// ============================================================================
// RootSet - bounded root stack
// ============================================================================

/// A fixed-capacity stack of root slots.
#[derive(Debug)]
pub struct RootSet {
    slots: Vec<Option<ObjRef>>,
    capacity: usize,
}

impl RootSet {
    /// Create an empty root set holding at most `capacity` roots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register a root.
    ///
    /// # Panics
    ///
    /// Panics when the root table is full. The table is sized by
    /// configuration; overflowing it is a programming error.
    #[track_caller]
    pub fn push(&mut self, value: Option<ObjRef>) -> RootSlot {
        match self.try_push(value) {
            Ok(slot) => slot,
            Err(err) => panic!("{err}"),
        }
    }

    /// Register a root, reporting overflow instead of panicking.
    pub fn try_push(&mut self, value: Option<ObjRef>) -> Result<RootSlot> {
        if self.slots.len() >= self.capacity {
            return Err(GcError::RootOverflow {
                capacity: self.capacity,
            });
        }
        self.slots.push(value);
        Ok(RootSlot(self.slots.len() - 1))
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Discard every root above depth `depth`. A larger `depth` is a no-op.
    pub fn truncate(&mut self, depth: usize) {
        self.slots.truncate(depth);
    }

    /// Current value of a root.
    pub fn get(&self, slot: RootSlot) -> Result<Option<ObjRef>> {
        self.slots
            .get(slot.0)
            .copied()
            .ok_or(GcError::ReleasedRoot {
                index: slot.0,
                depth: self.slots.len(),
            })
    }

    /// Overwrite a root.
    pub fn set(&mut self, slot: RootSlot, value: Option<ObjRef>) -> Result<()> {
        let depth = self.slots.len();
        let entry = self.slots.get_mut(slot.0).ok_or(GcError::ReleasedRoot {
            index: slot.0,
            depth,
        })?;
        *entry = value;
        Ok(())
    }

    /// Iterate over current root values.
    pub fn iter(&self) -> impl Iterator<Item = Option<ObjRef>> + '_ {
        self.slots.iter().copied()
    }

    /// Mutable access to every slot, for pointer fix-up.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Option<ObjRef>> + '_ {
        self.slots.iter_mut()
    }
}

// ============================================================================
// RootScope - scoped registration
// ============================================================================

/// A guard for scope-based root management.
///
/// Dereferences to the [`Heap`] it was opened on. When dropped, every root
/// registered since the guard was created is released.
///
/// ```
/// use arena_gc::{Heap, PolicyKind};
///
/// let mut heap = Heap::new(1000, PolicyKind::Compact).unwrap();
/// {
///     let mut scope = heap.root_scope();
///     let s = scope.allocate_text("temp").unwrap();
///     scope.push_root(Some(s));
///     assert_eq!(scope.root_count(), 1);
/// }
/// assert_eq!(heap.root_count(), 0);
/// ```
pub struct RootScope<'h> {
    heap: &'h mut Heap,
    depth: usize,
}

impl<'h> RootScope<'h> {
    pub(crate) fn new(heap: &'h mut Heap) -> Self {
        let depth = heap.root_count();
        Self { heap, depth }
    }

    /// Root depth this scope will truncate back to.
    #[must_use]
    pub const fn saved_depth(&self) -> usize {
        self.depth
    }
}

impl Deref for RootScope<'_> {
    type Target = Heap;

    fn deref(&self) -> &Heap {
        self.heap
    }
}

impl DerefMut for RootScope<'_> {
    fn deref_mut(&mut self) -> &mut Heap {
        self.heap
    }
}

impl Drop for RootScope<'_> {
    fn drop(&mut self) {
        self.heap.truncate_roots(self.depth);
    }
}
