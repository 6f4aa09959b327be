//! Record types shared by the integration tests.

#![allow(dead_code)]

use arena_gc::{Heap, ObjRef, PolicyKind, TypeDescriptor, HEADER_SIZE};

/// `{ id: i32, name: *String, mgr: *Employee }`
pub static EMPLOYEE: TypeDescriptor =
    TypeDescriptor::fixed("Employee", HEADER_SIZE + 24, &[HEADER_SIZE + 8, HEADER_SIZE + 16]);

/// `{ userid: i32, parking_spot: i32, salary: f32, name: *String }`
pub static USER: TypeDescriptor =
    TypeDescriptor::fixed("User", HEADER_SIZE + 24, &[HEADER_SIZE + 16]);

/// `{ left: *Node, right: *Node }`
pub static NODE: TypeDescriptor =
    TypeDescriptor::fixed("Node", HEADER_SIZE + 16, &[HEADER_SIZE, HEADER_SIZE + 8]);

pub const NAME: usize = 0;
pub const MGR: usize = 1;

pub fn heap(policy: PolicyKind) -> Heap {
    Heap::new(1000, policy).unwrap()
}

/// Allocate an employee with a name, returning it. Only valid until the
/// next allocation under the compacting policy.
pub fn employee(heap: &mut Heap, name: &str) -> ObjRef {
    let slot = heap.push_root(None);
    let emp = heap.allocate_typed(&EMPLOYEE).unwrap();
    heap.set_root(slot, Some(emp)).unwrap();
    let name = heap.allocate_text(name).unwrap();
    let emp = heap.root(slot).unwrap().unwrap();
    heap.set_field(emp, NAME, Some(name)).unwrap();
    heap.truncate_roots(slot.index());
    emp
}

/// Offsets of every reachable object, in address order.
pub fn reachable_offsets(heap: &Heap) -> Vec<usize> {
    heap.reachable()
        .into_iter()
        .map(|obj| heap.offset_of(obj).unwrap())
        .collect()
}
