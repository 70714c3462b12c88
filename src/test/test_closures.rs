//! End-to-end closure/upvalue sharing-then-closing scenario.

use crate::allocator::Allocator;
use crate::heap::Heap;
use crate::object::closure::EmberClosure;
use crate::object::function::{DebugInfo, EmberFunction};
use crate::object::module::EmberModule;
use crate::value::Value;

fn debug_stub(name: &str) -> DebugInfo {
    DebugInfo {
        name: name.to_string(),
        source_path: None,
        line_for_offset: Vec::new(),
    }
}

#[test]
fn scenario_3_ten_closures_share_then_observe_the_closed_value() {
    let mut heap = Heap::new(Allocator::default());
    let module = heap.alloc_module(EmberModule::new("main"));

    // A fiber with one stack slot: the shared loop counter.
    let placeholder_closure = {
        let f = heap.alloc_function(EmberFunction::new(module, 0, 1, debug_stub("body")));
        heap.alloc_closure(EmberClosure::new(f, Vec::new()))
    };
    let fiber_id = heap.alloc_fiber(placeholder_closure);
    heap.fibers.get_mut(fiber_id.0).unwrap().push(Value::num(0.0));

    // Capturing the same stack slot ten times must reuse one upvalue node,
    // per §4.8's "reuses the existing upvalue at that address" rule.
    let shared = heap.capture_upvalue(fiber_id, 0);

    let mut closures = Vec::new();
    for _ in 0..10 {
        let reused = heap.capture_upvalue(fiber_id, 0);
        assert_eq!(reused, shared, "capturing the same slot twice must not allocate a new upvalue");
        let f = heap.alloc_function(EmberFunction::new(module, 0, 1, debug_stub("closure")));
        closures.push(heap.alloc_closure(EmberClosure::new(f, vec![shared])));
    }

    // The loop runs to completion; the counter's final value is written into
    // the stack slot before the scope (and its upvalues) close.
    heap.fibers.get_mut(fiber_id.0).unwrap().stack[0] = Value::num(9.0);
    heap.close_upvalues_at(fiber_id, 0);

    assert!(heap.fibers.get(fiber_id.0).unwrap().open_upvalues.is_none());
    for closure_id in &closures {
        let closure = heap.closures.get(closure_id.0).unwrap();
        assert_eq!(closure.upvalues, vec![shared]);
        let upvalue = heap.upvalues.get(shared.0).unwrap();
        assert!(!upvalue.is_open());
        assert_eq!(upvalue.value(&[]).as_num(), Some(9.0));
    }
}

#[test]
fn capturing_distinct_slots_keeps_the_open_list_sorted_descending() {
    let mut heap = Heap::new(Allocator::default());
    let module = heap.alloc_module(EmberModule::new("main"));
    let closure = {
        let f = heap.alloc_function(EmberFunction::new(module, 0, 0, debug_stub("body")));
        heap.alloc_closure(EmberClosure::new(f, Vec::new()))
    };
    let fiber_id = heap.alloc_fiber(closure);
    for v in [1.0, 2.0, 3.0] {
        heap.fibers.get_mut(fiber_id.0).unwrap().push(Value::num(v));
    }

    // Capture out of order; the open list must still end up sorted by
    // descending slot so close_upvalues_at's early-exit walk is valid.
    let at_1 = heap.capture_upvalue(fiber_id, 1);
    let at_0 = heap.capture_upvalue(fiber_id, 0);
    let at_2 = heap.capture_upvalue(fiber_id, 2);

    let mut seen = Vec::new();
    let mut cur = heap.fibers.get(fiber_id.0).unwrap().open_upvalues;
    while let Some(id) = cur {
        let u = heap.upvalues.get(id.0).unwrap();
        seen.push(u.open_slot().unwrap());
        cur = u.next;
    }
    assert_eq!(seen, vec![2, 1, 0]);

    // Closing at address 1 should close slots 2 and 1 but leave slot 0 open.
    heap.fibers.get_mut(fiber_id.0).unwrap().stack[1] = Value::num(20.0);
    heap.fibers.get_mut(fiber_id.0).unwrap().stack[2] = Value::num(30.0);
    heap.close_upvalues_at(fiber_id, 1);

    assert!(!heap.upvalues.get(at_2.0).unwrap().is_open());
    assert!(!heap.upvalues.get(at_1.0).unwrap().is_open());
    assert!(heap.upvalues.get(at_0.0).unwrap().is_open());
    assert_eq!(heap.upvalues.get(at_2.0).unwrap().value(&[]).as_num(), Some(30.0));
    assert_eq!(heap.upvalues.get(at_1.0).unwrap().value(&[]).as_num(), Some(20.0));
}
