//! End-to-end fiber call/fail/resume scenario.

use crate::config::Configuration;
use crate::object::closure::EmberClosure;
use crate::object::function::{DebugInfo, EmberFunction};
use crate::object::module::EmberModule;
use crate::vm::Vm;

fn new_closure(vm: &mut Vm) -> crate::gc::id::ClosureId {
    let module = vm.register_module("main", EmberModule::new("main"));
    let debug = DebugInfo {
        name: "main".to_string(),
        source_path: None,
        line_for_offset: Vec::new(),
    };
    let f = vm.heap.alloc_function(EmberFunction::new(module, 0, 0, debug));
    vm.heap.alloc_closure(EmberClosure::new(f, Vec::new()))
}

#[test]
fn scenario_4_protected_call_returns_error_and_leaves_caller_resumable() {
    let mut vm = Vm::new(Configuration::new());
    let a_closure = new_closure(&mut vm);
    let b_closure = new_closure(&mut vm);

    let fiber_a = vm.interpret(a_closure);
    let fiber_b = vm.heap.alloc_fiber(b_closure);

    // A calls B under a protected ("try") call.
    vm.call(fiber_a, fiber_b, true).unwrap();
    assert_eq!(vm.current_fiber(), Some(fiber_b));

    // B aborts.
    let resumed = vm.fail(fiber_b, "x").unwrap();
    assert_eq!(resumed, Some(fiber_a), "a trying caller must be resumed, not the embedder");
    assert_eq!(vm.current_fiber(), Some(fiber_a));

    let b_error = vm.heap.fibers.get(fiber_b.0).unwrap().error.unwrap();
    let message = vm.heap.strings.get(b_error.0).unwrap();
    assert_eq!(message.as_bytes(), b"x");

    // A remains resumable: it still has its frame and can keep running.
    let a_fiber = vm.heap.fibers.get(fiber_a.0).unwrap();
    assert!(!a_fiber.is_done());
    assert!(!a_fiber.has_error());
}

#[test]
fn untried_call_unwinds_straight_to_the_embedder() {
    use std::sync::atomic::{AtomicBool, Ordering};
    static REPORTED: AtomicBool = AtomicBool::new(false);

    fn on_error(frames: &[crate::config::ErrorFrame<'_>], _msg: &str) {
        assert!(!frames.is_empty(), "the failing fiber's own frame should be reported");
        REPORTED.store(true, Ordering::SeqCst);
    }

    let mut config = Configuration::new();
    config.error_fn = Some(on_error);
    let mut vm = Vm::new(config);

    let closure = new_closure(&mut vm);
    let fiber = vm.interpret(closure);
    let resumed = vm.fail(fiber, "unhandled").unwrap();
    assert_eq!(resumed, None);
    assert!(REPORTED.load(Ordering::SeqCst));
}
