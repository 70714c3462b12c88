//! The VM's object store: one arena per object kind, the byte allocator,
//! and the temporary-root stack that protects objects between allocation
//! and being stored into a reachable container.
//!
//! Ground: the combination of `gc::object_pool.rs` (per-kind arenas) and
//! `gc::gc_v2.rs` (the accounting the allocator now owns) into a single
//! owning structure, the same role `lua_vm::mod.rs::LuaVM` plays by holding
//! every arena directly rather than behind a trait object.

use ahash::AHashMap;

use crate::allocator::Allocator;
use crate::gc::arena::Arena;
use crate::gc::collector;
use crate::gc::id::{
    ClassId, ClosureId, FiberId, FunctionId, InstanceId, ListId, MapId, ModuleId, ObjKind, ObjRef,
    RangeId, StringId, UpvalueId,
};
use crate::handle::{HandleId, HandleTable};
use crate::object::class::EmberClass;
use crate::object::closure::EmberClosure;
use crate::object::fiber::EmberFiber;
use crate::object::function::EmberFunction;
use crate::object::instance::EmberInstance;
use crate::object::list::EmberList;
use crate::object::map::{EmberMap, ValueOps};
use crate::object::module::EmberModule;
use crate::object::range::EmberRange;
use crate::object::string_obj::EmberString;
use crate::object::upvalue::EmberUpvalue;
use crate::value::Value;

pub struct Heap {
    pub classes: Arena<EmberClass>,
    pub closures: Arena<EmberClosure>,
    pub fibers: Arena<EmberFiber>,
    pub functions: Arena<EmberFunction>,
    pub instances: Arena<EmberInstance>,
    pub lists: Arena<EmberList>,
    pub maps: Arena<EmberMap>,
    pub modules: Arena<EmberModule>,
    pub ranges: Arena<EmberRange>,
    pub strings: Arena<EmberString>,
    pub upvalues: Arena<EmberUpvalue>,

    marks: [Vec<bool>; ObjKind::COUNT],
    pub allocator: Allocator,
    root_stack: Vec<ObjRef>,
    next_fiber_id: u64,

    /// The VM's current fiber and module/handle tables, per §4.10's root
    /// list. These live here, not on `Vm`, so that every `alloc_*` below can
    /// run a full, correctly-rooted collection on its own instead of relying
    /// on an external caller to remember to check afterward.
    current_fiber: Option<FiberId>,
    module_registry: AHashMap<Box<str>, ModuleId>,
    handles: HandleTable,
}

impl Heap {
    pub fn new(allocator: Allocator) -> Self {
        Self {
            classes: Arena::new(),
            closures: Arena::new(),
            fibers: Arena::new(),
            functions: Arena::new(),
            instances: Arena::new(),
            lists: Arena::new(),
            maps: Arena::new(),
            modules: Arena::new(),
            ranges: Arena::new(),
            strings: Arena::new(),
            upvalues: Arena::new(),
            marks: std::array::from_fn(|_| Vec::new()),
            allocator,
            root_stack: Vec::new(),
            next_fiber_id: 1,
            current_fiber: None,
            module_registry: AHashMap::new(),
            handles: HandleTable::new(),
        }
    }

    pub fn current_fiber(&self) -> Option<FiberId> {
        self.current_fiber
    }

    pub fn set_current_fiber(&mut self, fiber: Option<FiberId>) {
        self.current_fiber = fiber;
    }

    pub fn named_module(&self, name: &str) -> Option<ModuleId> {
        self.module_registry.get(name).copied()
    }

    pub fn name_module(&mut self, name: &str, id: ModuleId) {
        self.module_registry.insert(name.into(), id);
    }

    pub fn pin(&mut self, value: ObjRef) -> HandleId {
        self.handles.pin(value)
    }

    pub fn unpin(&mut self, handle: HandleId) {
        self.handles.unpin(handle);
    }

    /// The VM-level roots this heap now owns directly: the current fiber,
    /// every named module, and every pinned handle. The temporary-root stack
    /// is folded in separately by `collector::collect`.
    fn vm_roots(&self) -> Vec<ObjRef> {
        let mut roots = Vec::new();
        if let Some(fiber) = self.current_fiber {
            roots.push(fiber.into());
        }
        roots.extend(self.module_registry.values().map(|&m| ObjRef::from(m)));
        roots.extend(self.handles.roots());
        roots
    }

    /// Run one full mark-sweep cycle right now, regardless of the
    /// allocator's threshold.
    pub fn collect_garbage(&mut self) {
        let roots = self.vm_roots();
        collector::collect(self, &roots);
    }

    /// Run a collection if the allocator's byte threshold says to. Every
    /// `alloc_*` below calls this after recording its allocation, so growth
    /// past `nextGC` always triggers a cycle instead of waiting for an
    /// embedder to poll for one.
    pub fn maybe_collect_garbage(&mut self) {
        if self.allocator.maybe_collect() {
            self.collect_garbage();
        }
    }

    /// Protect `r` as a temporary root, run the threshold check, then
    /// release it — the object an `alloc_*` just created isn't reachable
    /// from anywhere yet, so it must be rooted across its own
    /// collection-trigger or a cycle landing in the same call could free it.
    fn protect_new_allocation(&mut self, r: ObjRef) {
        self.push_root(r);
        self.maybe_collect_garbage();
        self.pop_root();
    }

    fn ensure_mark_slot(&mut self, kind: ObjKind, index: u32) {
        let marks = &mut self.marks[kind as usize];
        if index as usize >= marks.len() {
            marks.resize(index as usize + 1, false);
        }
    }

    pub fn is_marked(&self, r: ObjRef) -> bool {
        self.marks[r.kind as usize].get(r.index as usize).copied().unwrap_or(false)
    }

    pub fn set_marked(&mut self, r: ObjRef, marked: bool) {
        self.ensure_mark_slot(r.kind, r.index);
        self.marks[r.kind as usize][r.index as usize] = marked;
    }

    pub fn clear_all_marks(&mut self) {
        for m in &mut self.marks {
            m.iter_mut().for_each(|b| *b = false);
        }
    }

    /// Protect `r` across an allocation that might trigger a collection
    /// before `r` has been stored anywhere reachable.
    pub fn push_root(&mut self, r: ObjRef) {
        self.root_stack.push(r);
    }

    pub fn pop_root(&mut self) {
        self.root_stack.pop();
    }

    pub fn temporary_roots(&self) -> &[ObjRef] {
        &self.root_stack
    }

    pub fn alloc_string(&mut self, bytes: impl Into<Vec<u8>>) -> StringId {
        let s = EmberString::new(bytes);
        self.allocator.record_alloc(std::mem::size_of::<EmberString>() + s.len());
        let id = self.strings.alloc(s);
        self.ensure_mark_slot(ObjKind::String, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::String, id));
        StringId(id)
    }

    pub fn alloc_list(&mut self, list: EmberList) -> ListId {
        self.allocator.record_alloc(std::mem::size_of::<EmberList>());
        let id = self.lists.alloc(list);
        self.ensure_mark_slot(ObjKind::List, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::List, id));
        ListId(id)
    }

    pub fn alloc_map(&mut self, map: EmberMap) -> MapId {
        self.allocator.record_alloc(std::mem::size_of::<EmberMap>());
        let id = self.maps.alloc(map);
        self.ensure_mark_slot(ObjKind::Map, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Map, id));
        MapId(id)
    }

    pub fn alloc_range(&mut self, range: EmberRange) -> RangeId {
        self.allocator.record_alloc(std::mem::size_of::<EmberRange>());
        let id = self.ranges.alloc(range);
        self.ensure_mark_slot(ObjKind::Range, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Range, id));
        RangeId(id)
    }

    pub fn alloc_function(&mut self, f: EmberFunction) -> FunctionId {
        self.allocator.record_alloc(std::mem::size_of::<EmberFunction>() + f.bytecode.len());
        let id = self.functions.alloc(f);
        self.ensure_mark_slot(ObjKind::Function, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Function, id));
        FunctionId(id)
    }

    pub fn alloc_closure(&mut self, c: EmberClosure) -> ClosureId {
        self.allocator.record_alloc(std::mem::size_of::<EmberClosure>());
        let id = self.closures.alloc(c);
        self.ensure_mark_slot(ObjKind::Closure, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Closure, id));
        ClosureId(id)
    }

    pub fn alloc_upvalue(&mut self, u: EmberUpvalue) -> UpvalueId {
        self.allocator.record_alloc(std::mem::size_of::<EmberUpvalue>());
        let id = self.upvalues.alloc(u);
        self.ensure_mark_slot(ObjKind::Upvalue, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Upvalue, id));
        UpvalueId(id)
    }

    pub fn alloc_class(&mut self, c: EmberClass) -> ClassId {
        self.allocator.record_alloc(std::mem::size_of::<EmberClass>());
        let id = self.classes.alloc(c);
        self.ensure_mark_slot(ObjKind::Class, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Class, id));
        ClassId(id)
    }

    pub fn alloc_instance(&mut self, i: EmberInstance) -> InstanceId {
        self.allocator.record_alloc(std::mem::size_of::<EmberInstance>());
        let id = self.instances.alloc(i);
        self.ensure_mark_slot(ObjKind::Instance, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Instance, id));
        InstanceId(id)
    }

    pub fn alloc_fiber(&mut self, closure: ClosureId) -> FiberId {
        let fid = self.next_fiber_id;
        self.next_fiber_id += 1;
        self.allocator.record_alloc(std::mem::size_of::<EmberFiber>());
        let id = self.fibers.alloc(EmberFiber::new(fid, closure));
        self.ensure_mark_slot(ObjKind::Fiber, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Fiber, id));
        FiberId(id)
    }

    pub fn alloc_module(&mut self, m: EmberModule) -> ModuleId {
        self.allocator.record_alloc(std::mem::size_of::<EmberModule>());
        let id = self.modules.alloc(m);
        self.ensure_mark_slot(ObjKind::Module, id);
        self.protect_new_allocation(ObjRef::new(ObjKind::Module, id));
        ModuleId(id)
    }

    /// `hash(v)` from §4.2: numbers XOR their bit-pattern halves, strings
    /// use their cached hash, classes hash their name string, ranges XOR
    /// their endpoints' hashes, the three non-numeric singletons use
    /// distinct small constants. Everything else (lists, maps, instances,
    /// closures, functions, modules, upvalues) is unhashable — callers must
    /// reject those before reaching here.
    pub fn hash_value(&self, v: Value) -> u32 {
        if let Some(n) = v.as_num() {
            let bits = n.to_bits();
            return ((bits >> 32) as u32) ^ (bits as u32);
        }
        if v.is_null() {
            return 0x1000_0001;
        }
        match v.as_bool() {
            Some(true) => return 0x1000_0002,
            Some(false) => return 0x1000_0003,
            None => {}
        }
        let r = v.as_obj().expect("non-number, non-bool, non-null value must be an object");
        match r.kind {
            ObjKind::String => self.strings.get(r.index).map(|s| s.hash()).unwrap_or(0),
            ObjKind::Class => self
                .classes
                .get(r.index)
                .and_then(|c| self.strings.get(c.name.0))
                .map(|s| s.hash())
                .unwrap_or(0),
            ObjKind::Range => self.ranges.get(r.index).map(|rg| rg.hash()).unwrap_or(0),
            ObjKind::Fiber => self.fibers.get(r.index).map(|f| f.id as u32 ^ (f.id >> 32) as u32).unwrap_or(0),
            _ => panic!("value of kind {:?} is not hashable", r.kind),
        }
    }

    /// `valuesEqual` from §4.2: identity for everything except strings
    /// (length+hash+bytes) and ranges (tuple equality), which compare
    /// structurally.
    pub fn values_equal(&self, a: Value, b: Value) -> bool {
        if a.same(b) {
            return true;
        }
        match (a.as_obj(), b.as_obj()) {
            (Some(ra), Some(rb)) if ra.kind == ObjKind::String && rb.kind == ObjKind::String => {
                match (self.strings.get(ra.index), self.strings.get(rb.index)) {
                    (Some(sa), Some(sb)) => sa.hash() == sb.hash() && sa.as_bytes() == sb.as_bytes(),
                    _ => false,
                }
            }
            (Some(ra), Some(rb)) if ra.kind == ObjKind::Range && rb.kind == ObjKind::Range => {
                match (self.ranges.get(ra.index), self.ranges.get(rb.index)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl Heap {
    /// Capture `slot` of `fiber` as an open upvalue, per §4.8: reuse the
    /// existing node at that slot if the open list already has one,
    /// otherwise insert a new open upvalue in descending-slot order.
    pub fn capture_upvalue(&mut self, fiber: FiberId, slot: usize) -> UpvalueId {
        let head = self.fibers.get(fiber.0).and_then(|f| f.open_upvalues);
        let upvalues = &self.upvalues;
        let slot_of = |id: UpvalueId| upvalues.get(id.0).and_then(|u| u.open_slot()).unwrap_or(0);
        let next_of = |id: UpvalueId| upvalues.get(id.0).and_then(|u| u.next);

        match crate::object::upvalue::find_or_insert_slot(head, slot, slot_of, next_of) {
            crate::object::upvalue::InsertPlan::Reuse(id) => id,
            crate::object::upvalue::InsertPlan::InsertBefore { prev, next } => {
                self.allocator.record_alloc(std::mem::size_of::<EmberUpvalue>());
                let new_id = self.upvalues.alloc(EmberUpvalue::new_open(fiber, slot, next));
                self.ensure_mark_slot(ObjKind::Upvalue, new_id);
                self.protect_new_allocation(ObjRef::new(ObjKind::Upvalue, new_id));
                let new_id = UpvalueId(new_id);
                match prev {
                    Some(prev_id) => {
                        if let Some(prev_upvalue) = self.upvalues.get_mut(prev_id.0) {
                            prev_upvalue.next = Some(new_id);
                        }
                    }
                    None => {
                        if let Some(f) = self.fibers.get_mut(fiber.0) {
                            f.open_upvalues = Some(new_id);
                        }
                    }
                }
                new_id
            }
        }
    }

    /// "Close upvalues at address `a`" from §4.8: walk `fiber`'s open list
    /// from the head while each upvalue's slot is `>= addr`, capturing the
    /// stack value into each and unlinking it. The list is kept sorted by
    /// descending slot, so the walk stops at the first upvalue below `addr`.
    pub fn close_upvalues_at(&mut self, fiber: FiberId, addr: usize) {
        let Some(stack_snapshot) = self.fibers.get(fiber.0).map(|f| f.stack.clone()) else {
            return;
        };
        let mut current = self.fibers.get(fiber.0).and_then(|f| f.open_upvalues);

        while let Some(id) = current {
            let Some(slot) = self.upvalues.get(id.0).and_then(|u| u.open_slot()) else {
                break;
            };
            if slot < addr {
                break;
            }
            let value = stack_snapshot[slot];
            let next = self.upvalues.get(id.0).and_then(|u| u.next);
            if let Some(u) = self.upvalues.get_mut(id.0) {
                u.close(value);
            }
            current = next;
        }

        if let Some(f) = self.fibers.get_mut(fiber.0) {
            f.open_upvalues = current;
        }
    }
}

impl ValueOps for Heap {
    fn hash(&self, v: Value) -> u32 {
        self.hash_value(v)
    }

    fn eq(&self, a: Value, b: Value) -> bool {
        self.values_equal(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_equality_is_structural() {
        let mut heap = Heap::new(Allocator::default());
        let a = heap.alloc_string(b"hi".to_vec());
        let b = heap.alloc_string(b"hi".to_vec());
        assert_ne!(a, b, "distinct allocations get distinct ids");
        assert!(heap.values_equal(Value::obj(a.into()), Value::obj(b.into())));
    }

    #[test]
    fn numbers_compare_by_identity_value() {
        let heap = Heap::new(Allocator::default());
        assert!(heap.values_equal(Value::num(1.0), Value::num(1.0)));
        assert!(!heap.values_equal(Value::num(f64::NAN), Value::num(f64::NAN)));
    }
}
