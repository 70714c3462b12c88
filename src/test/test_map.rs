//! End-to-end map scenarios: growth through deletion, tombstone reuse.

use crate::allocator::Allocator;
use crate::heap::Heap;
use crate::object::map::EmberMap;
use crate::value::Value;

#[test]
fn scenario_2_grow_then_delete_then_grow_again() {
    let heap = Heap::new(Allocator::default());
    let mut map = EmberMap::new();

    for k in 0..100 {
        map.set(Value::num(k as f64), Value::num(k as f64), &heap);
    }
    for k in (0..100).step_by(2) {
        map.remove(Value::num(k as f64), &heap);
    }
    for k in 100..150 {
        map.set(Value::num(k as f64), Value::num(k as f64), &heap);
    }

    for k in (1..100).step_by(2) {
        assert!(map.get(Value::num(k as f64), &heap).is_some(), "odd key {k} should survive");
    }
    for k in (0..100).step_by(2) {
        assert!(map.get(Value::num(k as f64), &heap).is_none(), "even key {k} was removed");
    }
    for k in 100..150 {
        assert!(map.get(Value::num(k as f64), &heap).is_some(), "newly inserted key {k} should be present");
    }
}

#[test]
fn boundary_grows_through_16_32_64_without_losing_entries() {
    let heap = Heap::new(Allocator::default());
    let mut map = EmberMap::new();
    for k in 0..64 {
        map.set(Value::num(k as f64), Value::num((k * 2) as f64), &heap);
    }
    assert_eq!(map.len(), 64);
    for k in 0..64 {
        assert_eq!(map.get(Value::num(k as f64), &heap).unwrap().as_num(), Some((k * 2) as f64));
    }
}

#[test]
fn boundary_reinsert_reuses_tombstone_slot() {
    let heap = Heap::new(Allocator::default());
    let mut map = EmberMap::new();
    map.set(Value::num(1.0), Value::num(1.0), &heap);
    let cap_before = map.capacity();
    map.remove(Value::num(1.0), &heap);
    map.set(Value::num(1.0), Value::num(2.0), &heap);
    assert_eq!(map.get(Value::num(1.0), &heap).unwrap().as_num(), Some(2.0));
    assert!(map.capacity() <= cap_before.max(16));
}

#[test]
fn last_writer_wins() {
    let heap = Heap::new(Allocator::default());
    let mut map = EmberMap::new();
    map.set(Value::num(1.0), Value::num(10.0), &heap);
    map.set(Value::num(1.0), Value::num(20.0), &heap);
    assert_eq!(map.get(Value::num(1.0), &heap).unwrap().as_num(), Some(20.0));
}
