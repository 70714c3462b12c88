//! Explicit-worklist ("gray stack") mark-sweep.
//!
//! Ground: `gc::gc_v2.rs::GcV2::collect` almost directly — clear marks, seed
//! a gray list from the root set, pop-and-traverse until the gray list is
//! empty, sweep, reset the allocator's debt — stripped of the
//! generational/incremental machinery the teacher's full port carries,
//! since this core only needs the single mark-sweep cycle of §4.10 (no age
//! bits, no write barrier, no incremental stepping).

use crate::gc::id::{ObjKind, ObjRef};
use crate::heap::Heap;

/// Run one full collection cycle. `roots` are the VM-level roots this
/// module doesn't own: the current fiber, the module registry, pinned API
/// handles, and the compiler's working set while a compile is in progress.
/// The heap's own temporary-root stack is always included.
pub fn collect(heap: &mut Heap, roots: &[ObjRef]) {
    heap.clear_all_marks();

    let mut gray: Vec<ObjRef> = Vec::new();
    let all_roots: Vec<ObjRef> = roots.iter().chain(heap.temporary_roots()).copied().collect();
    for r in all_roots {
        mark(heap, &mut gray, r);
    }

    while let Some(r) = gray.pop() {
        mark_children(heap, &mut gray, r);
    }

    sweep(heap);
}

fn mark(heap: &mut Heap, gray: &mut Vec<ObjRef>, r: ObjRef) {
    if heap.is_marked(r) {
        return;
    }
    heap.set_marked(r, true);
    gray.push(r);
}

fn mark_children(heap: &mut Heap, gray: &mut Vec<ObjRef>, r: ObjRef) {
    match r.kind {
        ObjKind::Class => {
            if let Some(class) = heap.classes.get(r.index).cloned() {
                mark(heap, gray, ObjRef::new(ObjKind::String, class.name.0));
                if let Some(sup) = class.superclass {
                    mark(heap, gray, sup.into());
                }
                if let Some(meta) = class.metaclass {
                    mark(heap, gray, meta.into());
                }
                for m in &class.methods {
                    if let crate::object::class::Method::Closure(c) = m {
                        mark(heap, gray, (*c).into());
                    }
                }
            }
        }
        ObjKind::Closure => {
            if let Some(c) = heap.closures.get(r.index).cloned() {
                mark(heap, gray, c.function.into());
                for u in &c.upvalues {
                    mark(heap, gray, (*u).into());
                }
                if let Some(class) = c.class {
                    mark(heap, gray, class.into());
                }
            }
        }
        ObjKind::Fiber => {
            if let Some(f) = heap.fibers.get(r.index).cloned() {
                for frame in &f.frames {
                    mark(heap, gray, frame.closure.into());
                }
                for &v in f.stack.iter().take(f.stack_top) {
                    mark_value(heap, gray, v);
                }
                let mut up = f.open_upvalues;
                while let Some(id) = up {
                    mark(heap, gray, id.into());
                    up = heap.upvalues.get(id.0).and_then(|u| u.next);
                }
                if let Some(caller) = f.caller {
                    mark(heap, gray, caller.into());
                }
                if let Some(err) = f.error {
                    mark(heap, gray, ObjRef::new(ObjKind::String, err.0));
                }
                if let Some(class) = f.class {
                    mark(heap, gray, class.into());
                }
            }
        }
        ObjKind::Function => {
            if let Some(f) = heap.functions.get(r.index).cloned() {
                for &c in &f.constants {
                    mark_value(heap, gray, c);
                }
                if let Some(class) = f.class {
                    mark(heap, gray, class.into());
                }
            }
        }
        ObjKind::Instance => {
            if let Some(i) = heap.instances.get(r.index).cloned() {
                mark(heap, gray, i.class.into());
                for &v in &i.fields {
                    mark_value(heap, gray, v);
                }
            }
        }
        ObjKind::List => {
            if let Some(l) = heap.lists.get(r.index).cloned() {
                for v in l.iter().copied().collect::<Vec<_>>() {
                    mark_value(heap, gray, v);
                }
                if let Some(class) = l.class {
                    mark(heap, gray, class.into());
                }
            }
        }
        ObjKind::Map => {
            if let Some(m) = heap.maps.get(r.index).cloned() {
                for (k, v) in m.iter().collect::<Vec<_>>() {
                    mark_value(heap, gray, k);
                    mark_value(heap, gray, v);
                }
                if let Some(class) = m.class {
                    mark(heap, gray, class.into());
                }
            }
        }
        ObjKind::Module => {
            if let Some(m) = heap.modules.get(r.index).cloned() {
                for &v in &m.variables {
                    mark_value(heap, gray, v);
                }
            }
        }
        ObjKind::Range => {
            if let Some(class) = heap.ranges.get(r.index).and_then(|rg| rg.class) {
                mark(heap, gray, class.into());
            }
        }
        ObjKind::String => {
            if let Some(class) = heap.strings.get(r.index).and_then(|s| s.class) {
                mark(heap, gray, class.into());
            }
        }
        ObjKind::Upvalue => {
            if let Some(u) = heap.upvalues.get(r.index) {
                if let crate::object::upvalue::UpvalueState::Closed(v) = u.state {
                    mark_value(heap, gray, v);
                }
            }
        }
    }
}

fn mark_value(heap: &mut Heap, gray: &mut Vec<ObjRef>, v: crate::value::Value) {
    if let Some(r) = v.as_obj() {
        mark(heap, gray, r);
    }
}

fn sweep(heap: &mut Heap) {
    let mut live_bytes = 0usize;

    for id in heap.classes.live_ids() {
        let r = ObjRef::new(ObjKind::Class, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::class::EmberClass>();
        } else {
            heap.classes.free(id);
        }
    }
    for id in heap.closures.live_ids() {
        let r = ObjRef::new(ObjKind::Closure, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::closure::EmberClosure>();
        } else {
            heap.closures.free(id);
        }
    }
    for id in heap.fibers.live_ids() {
        let r = ObjRef::new(ObjKind::Fiber, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::fiber::EmberFiber>();
        } else {
            heap.fibers.free(id);
        }
    }
    for id in heap.functions.live_ids() {
        let r = ObjRef::new(ObjKind::Function, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::function::EmberFunction>();
        } else {
            heap.functions.free(id);
        }
    }
    for id in heap.instances.live_ids() {
        let r = ObjRef::new(ObjKind::Instance, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::instance::EmberInstance>();
        } else {
            heap.instances.free(id);
        }
    }
    for id in heap.lists.live_ids() {
        let r = ObjRef::new(ObjKind::List, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::list::EmberList>();
        } else {
            heap.lists.free(id);
        }
    }
    for id in heap.maps.live_ids() {
        let r = ObjRef::new(ObjKind::Map, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::map::EmberMap>();
        } else {
            heap.maps.free(id);
        }
    }
    for id in heap.modules.live_ids() {
        let r = ObjRef::new(ObjKind::Module, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::module::EmberModule>();
        } else {
            heap.modules.free(id);
        }
    }
    for id in heap.ranges.live_ids() {
        let r = ObjRef::new(ObjKind::Range, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::range::EmberRange>();
        } else {
            heap.ranges.free(id);
        }
    }
    for id in heap.strings.live_ids() {
        let r = ObjRef::new(ObjKind::String, id);
        if heap.is_marked(r) {
            live_bytes += heap.strings.get(id).map(|s| s.len()).unwrap_or(0) + std::mem::size_of::<crate::object::string_obj::EmberString>();
        } else {
            heap.strings.free(id);
        }
    }
    for id in heap.upvalues.live_ids() {
        let r = ObjRef::new(ObjKind::Upvalue, id);
        if heap.is_marked(r) {
            live_bytes += std::mem::size_of::<crate::object::upvalue::EmberUpvalue>();
        } else {
            heap.upvalues.free(id);
        }
    }

    heap.allocator.finish_collection(live_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Allocator;

    #[test]
    fn unreachable_string_is_collected() {
        let mut heap = Heap::new(Allocator::default());
        let id = heap.alloc_string(b"gone".to_vec());
        assert!(heap.strings.is_live(id.0));
        collect(&mut heap, &[]);
        assert!(!heap.strings.is_live(id.0));
    }

    #[test]
    fn rooted_string_survives() {
        let mut heap = Heap::new(Allocator::default());
        let id = heap.alloc_string(b"kept".to_vec());
        collect(&mut heap, &[ObjRef::new(ObjKind::String, id.0)]);
        assert!(heap.strings.is_live(id.0));
    }

    #[test]
    fn temporary_root_protects_across_collection() {
        let mut heap = Heap::new(Allocator::default());
        let id = heap.alloc_string(b"temp".to_vec());
        heap.push_root(ObjRef::new(ObjKind::String, id.0));
        collect(&mut heap, &[]);
        assert!(heap.strings.is_live(id.0));
        heap.pop_root();
        collect(&mut heap, &[]);
        assert!(!heap.strings.is_live(id.0));
    }

    #[test]
    fn list_keeps_its_elements_reachable() {
        let mut heap = Heap::new(Allocator::default());
        let s = heap.alloc_string(b"inside".to_vec());
        let mut list = crate::object::list::EmberList::new();
        list.push(crate::value::Value::obj(ObjRef::new(ObjKind::String, s.0)));
        let list_id = heap.alloc_list(list);

        collect(&mut heap, &[ObjRef::new(ObjKind::List, list_id.0)]);
        assert!(heap.lists.is_live(list_id.0));
        assert!(heap.strings.is_live(s.0), "string reachable through the list must survive");
    }
}
