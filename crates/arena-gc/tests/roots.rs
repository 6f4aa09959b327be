//! Root table and scoped-root tests.

mod common;

use std::panic::{self, AssertUnwindSafe};

use arena_gc::{GcError, Heap, HeapConfig, PolicyKind};
use common::{heap, USER};

#[test]
fn test_push_and_read_roots() {
    let mut heap = heap(PolicyKind::Sweep);
    assert_eq!(heap.root_count(), 0);

    let user = heap.allocate_typed(&USER).unwrap();
    let a = heap.push_root(Some(user));
    let b = heap.push_root(None);

    assert_eq!(heap.root_count(), 2);
    assert_eq!(heap.root(a).unwrap(), Some(user));
    assert_eq!(heap.root(b).unwrap(), None);

    heap.set_root(a, None).unwrap();
    assert_eq!(heap.root(a).unwrap(), None);
}

#[test]
fn test_scope_restores_depth() {
    let mut heap = heap(PolicyKind::Compact);
    heap.push_root(None);

    {
        let mut scope = heap.root_scope();
        assert_eq!(scope.saved_depth(), 1);
        let s = scope.allocate_text("temp").unwrap();
        scope.push_root(Some(s));
        scope.push_root(None);
        assert_eq!(scope.root_count(), 3);
    }

    assert_eq!(heap.root_count(), 1);
}

#[test]
fn test_released_scope_roots_are_not_traced() {
    for policy in PolicyKind::ALL {
        let mut heap = heap(policy);
        {
            let mut scope = heap.root_scope();
            let user = scope.allocate_typed(&USER).unwrap();
            scope.push_root(Some(user));
        }
        heap.scoped(|scope| {
            let name = scope.allocate_text("gone").unwrap();
            scope.push_root(Some(name));
        });

        let stats = heap.collect();
        assert_eq!(stats.objects_live, 0, "{policy}");
        assert_eq!(stats.bytes_live, 0, "{policy}");
        assert!(heap.reachable().is_empty(), "{policy}");
    }
}

#[test]
fn test_nested_scopes() {
    let mut heap = heap(PolicyKind::Compact);
    heap.scoped(|outer| {
        outer.push_root(None);
        outer.scoped(|inner| {
            inner.push_root(None);
            inner.push_root(None);
            assert_eq!(inner.root_count(), 3);
        });
        assert_eq!(outer.root_count(), 1);
    });
    assert_eq!(heap.root_count(), 0);
}

#[test]
fn test_scope_releases_roots_on_early_return() {
    fn find(heap: &mut Heap, fail: bool) -> Result<usize, GcError> {
        let mut scope = heap.root_scope();
        let s = scope.allocate_text("x")?;
        scope.push_root(Some(s));
        if fail {
            return Err(GcError::TooManyTypes);
        }
        Ok(scope.root_count())
    }

    let mut heap = heap(PolicyKind::Sweep);
    assert!(find(&mut heap, true).is_err());
    assert_eq!(heap.root_count(), 0);
    assert_eq!(find(&mut heap, false).unwrap(), 1);
    assert_eq!(heap.root_count(), 0);
}

#[test]
fn test_scope_releases_roots_on_panic() {
    let mut heap = heap(PolicyKind::Compact);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut scope = heap.root_scope();
        scope.push_root(None);
        panic!("boom");
    }));
    assert!(result.is_err());
    assert_eq!(heap.root_count(), 0);
}

#[test]
fn test_released_slot_is_an_error() {
    let mut heap = heap(PolicyKind::Compact);
    let slot = heap.scoped(|heap| heap.push_root(None));

    assert!(matches!(
        heap.root(slot),
        Err(GcError::ReleasedRoot { index: 0, depth: 0 })
    ));
    assert!(matches!(
        heap.set_root(slot, None),
        Err(GcError::ReleasedRoot { .. })
    ));
}

#[test]
fn test_root_capacity() {
    let mut heap = Heap::with_config(HeapConfig::new().root_capacity(2)).unwrap();
    heap.try_push_root(None).unwrap();
    heap.try_push_root(None).unwrap();
    assert!(matches!(
        heap.try_push_root(None),
        Err(GcError::RootOverflow { capacity: 2 })
    ));
    assert_eq!(heap.root_count(), 2);
}

#[test]
#[should_panic(expected = "root table overflow")]
fn test_push_root_overflow_panics() {
    let mut heap = Heap::with_config(HeapConfig::new().root_capacity(1)).unwrap();
    heap.push_root(None);
    heap.push_root(None);
}

#[test]
fn test_root_follows_compaction() {
    let mut heap = heap(PolicyKind::Compact);
    let _garbage = heap.allocate_text("garbage").unwrap();
    let kept = heap.allocate_text("kept").unwrap();
    let slot = heap.push_root(Some(kept));
    assert_eq!(heap.offset_of(kept), Some(24));

    heap.collect();

    let moved = heap.root(slot).unwrap().unwrap();
    assert_eq!(heap.offset_of(moved), Some(0));
    assert_eq!(heap.text(moved).unwrap(), "kept");
}

#[test]
fn test_foreign_root_is_ignored() {
    let mut other = heap(PolicyKind::Compact);
    let foreign = other.allocate_text("elsewhere").unwrap();

    let mut heap = heap(PolicyKind::Compact);
    let slot = heap.push_root(Some(foreign));
    let stats = heap.collect();

    assert_eq!(stats.objects_live, 0);
    assert_eq!(heap.root(slot).unwrap(), Some(foreign));
    assert_eq!(other.text(foreign).unwrap(), "elsewhere");
}
