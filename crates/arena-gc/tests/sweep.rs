//! Mark-and-sweep policy tests.

mod common;

use arena_gc::{GcError, Heap, PolicyKind, TEXT};
use common::{heap, EMPLOYEE, MGR, NAME, USER};

#[test]
fn test_empty() {
    let mut heap = heap(PolicyKind::Sweep);
    assert_eq!(heap.root_count(), 0);
    assert_eq!(heap.object_count(), 0);
    assert_eq!(heap.live_count(), 0);
    assert_eq!(heap.frontier(), 0);
    heap.collect();
    assert_eq!(heap.frontier(), 0);
}

#[test]
fn test_rooted_string_survives() {
    let mut heap = heap(PolicyKind::Sweep);
    let a = heap.allocate_variable(&TEXT, 10).unwrap();
    heap.write_text(a, "hi mom").unwrap();
    heap.push_root(Some(a));
    assert_eq!(heap.object_count(), 1);

    heap.collect();
    assert_eq!(heap.live_count(), 1);
    assert_eq!(heap.text(a).unwrap(), "hi mom");
}

#[test]
fn test_dead_string_heads_free_list() {
    let mut heap = heap(PolicyKind::Sweep);
    let a = heap.allocate_variable(&TEXT, 10).unwrap();
    let slot = heap.push_root(Some(a));
    heap.write_text(a, "hi mom").unwrap();
    heap.set_root(slot, None).unwrap();

    let stats = heap.collect();
    assert_eq!(stats.objects_live, 0);
    assert_eq!(stats.objects_reclaimed, 1);
    assert_eq!(stats.bytes_reclaimed, 32);
    assert_eq!(Some(heap.frontier()), heap.offset_of(a));
}

#[test]
fn test_user_freed_but_not_its_name() {
    let mut heap = heap(PolicyKind::Sweep);
    let s = heap.allocate_variable(&TEXT, 20).unwrap();
    heap.push_root(Some(s));
    heap.write_text(s, "parrt").unwrap();

    let u = heap.allocate_typed(&USER).unwrap();
    let u_slot = heap.push_root(Some(u));
    heap.set_field(u, NAME, Some(s)).unwrap();
    heap.set_root(u_slot, None).unwrap();

    heap.collect();
    assert_eq!(heap.object_count(), 2);
    assert_eq!(heap.live_count(), 1);
    assert_eq!(Some(heap.frontier()), heap.offset_of(u));
}

#[test]
fn test_last_swept_object_heads_free_list() {
    let mut heap = heap(PolicyKind::Sweep);
    let tombu = heap.allocate_typed(&EMPLOYEE).unwrap();
    let s = heap.allocate_text("Tom").unwrap();
    heap.set_field(tombu, NAME, Some(s)).unwrap();

    let parrt = heap.allocate_typed(&EMPLOYEE).unwrap();
    let name = heap.allocate_text("Terence").unwrap();
    heap.set_field(parrt, NAME, Some(name)).unwrap();
    heap.set_field(parrt, MGR, Some(tombu)).unwrap();
    heap.push_root(Some(parrt));

    heap.set_field(parrt, MGR, None).unwrap();
    heap.collect();

    assert_eq!(heap.live_count(), 2);
    assert_eq!(heap.object_count(), 4);
    // Sweeping runs in address order and pushes on the head, so the head
    // is the highest dead object.
    assert_eq!(Some(heap.frontier()), heap.offset_of(s));
}

#[test]
fn test_globals_released_one_at_a_time() {
    let mut heap = heap(PolicyKind::Sweep);
    let e1 = heap.allocate_typed(&EMPLOYEE).unwrap();
    let e2 = heap.allocate_typed(&EMPLOYEE).unwrap();
    let slot1 = heap.push_root(Some(e1));
    heap.push_root(Some(e2));
    assert_eq!(heap.object_count(), 2);
    assert_eq!(heap.root_count(), 2);

    heap.collect();
    assert_eq!(heap.live_count(), 2);

    heap.set_root(slot1, None).unwrap();
    heap.collect();
    assert_eq!(heap.live_count(), 1);
    assert_eq!(Some(heap.frontier()), heap.offset_of(e1));
}

#[test]
fn test_freed_address_is_reused() {
    let mut heap = heap(PolicyKind::Sweep);
    let dead = heap.allocate_typed(&USER).unwrap();
    let live = heap.allocate_typed(&USER).unwrap();
    heap.push_root(Some(live));
    heap.collect();

    let again = heap.allocate_typed(&USER).unwrap();
    assert_eq!(again, dead);
    assert_eq!(heap.object_count(), 2);
    // Reused storage is zeroed.
    assert_eq!(heap.field(again, 0).unwrap(), None);
}

#[test]
fn test_large_free_chunk_is_split() {
    let mut heap = heap(PolicyKind::Sweep);
    let dead = heap.allocate_typed(&EMPLOYEE).unwrap();
    let live = heap.allocate_typed(&EMPLOYEE).unwrap();
    heap.push_root(Some(live));
    heap.collect();

    // 40 bytes free at `dead`: a 24-byte text leaves a 16-byte chunk.
    let small = heap.allocate_text("tiny").unwrap();
    assert_eq!(small, dead);
    assert_eq!(heap.frontier(), heap.offset_of(dead).unwrap() + 24);
}

#[test]
fn test_awkward_fit_is_skipped() {
    let mut heap = heap(PolicyKind::Sweep);
    let dead = heap.allocate_typed(&EMPLOYEE).unwrap();
    let live = heap.allocate_typed(&EMPLOYEE).unwrap();
    heap.push_root(Some(live));
    heap.collect();

    // 32 bytes would leave 8, too small for a chunk: first fit moves on.
    let text = heap.allocate_variable(&TEXT, 10).unwrap();
    assert_ne!(text, dead);
    assert_eq!(heap.offset_of(text), Some(80));
}

#[test]
fn test_out_of_memory_after_collect() {
    let mut heap = Heap::new(64, PolicyKind::Sweep).unwrap();
    let keep = heap.allocate_typed(&EMPLOYEE).unwrap();
    heap.push_root(Some(keep));

    let err = heap.allocate_typed(&EMPLOYEE).unwrap_err();
    assert!(matches!(
        err,
        GcError::OutOfMemory {
            requested: 40,
            policy: PolicyKind::Sweep
        }
    ));
    assert_eq!(heap.total_collections(), 1);

    // The remaining 24-byte chunk is still usable.
    assert!(heap.allocate_text("1234567").is_ok());
}
