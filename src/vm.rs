//! The VM: owns the heap, the module registry, the foreign-method registry,
//! pinned handles, and whichever fiber is currently running. Ties every
//! other component together the way `lua_vm::mod.rs::LuaVM` does, minus the
//! bytecode dispatch loop, which is out of scope for this core.
//!
//! §6's `interpret(vm, source)` would compile-and-run source text; since the
//! lexer/parser/compiler/interpreter loop are explicitly out of scope here,
//! `interpret` is a thin hand-off: it resolves a module to an already-
//! compiled entry closure (through `Configuration::load_module_fn` plus an
//! external compiler the embedder owns) and parks it as the current fiber
//! via [`Vm::call`], returning control immediately. Running that fiber to
//! completion is the external interpreter loop's job.

use crate::allocator::Allocator;
use crate::config::Configuration;
use crate::error::{EmberError, ErrorKind, Result};
use crate::foreign::{ForeignCallContext, ForeignRegistry};
use crate::gc::id::{ClassId, ClosureId, FiberId, InstanceId, ModuleId, ObjRef};
use crate::handle::HandleId;
use crate::heap::Heap;
use crate::object::class::EmberClass;
use crate::object::fiber::FailureRoute;
use crate::object::instance::EmberInstance;
use crate::object::module::EmberModule;
use crate::symbol_table::SymbolTable;
use crate::value::Value;

struct OwnedFrame {
    module: String,
    line: u32,
    function_name: String,
}

pub struct Vm {
    pub heap: Heap,
    pub config: Configuration,
    pub foreign: ForeignRegistry,
    /// Global method-selector symbol table: every class's `methods` vector
    /// is indexed by the symbols interned here (§4.7).
    pub method_symbols: SymbolTable,
    /// The root `Class` class every other class's metaclass ultimately
    /// inherits from, bootstrapped in [`Vm::new`] per §4.13.
    pub root_class: ClassId,
    /// The root `Object` class every class without an explicit superclass
    /// implicitly descends from, built through the ordinary §4.7 recipe
    /// once `root_class` exists to serve as its metaclass's class-of.
    pub root_object: ClassId,
}

impl Vm {
    pub fn new(config: Configuration) -> Self {
        let allocator = Allocator::new(config.min_heap_size, config.heap_growth_percent);
        let mut heap = Heap::new(allocator);
        let root_class = bootstrap_root_class(&mut heap);
        let mut vm = Self {
            heap,
            config,
            foreign: ForeignRegistry::new(),
            method_symbols: SymbolTable::new(),
            root_class,
            root_object: root_class,
        };
        vm.root_object = vm.create_class("Object", None, 0);
        vm
    }

    pub fn current_fiber(&self) -> Option<FiberId> {
        self.heap.current_fiber()
    }

    pub fn module(&self, name: &str) -> Option<ModuleId> {
        self.heap.named_module(name)
    }

    pub fn register_module(&mut self, name: &str, module: EmberModule) -> ModuleId {
        let id = self.heap.alloc_module(module);
        self.heap.name_module(name, id);
        id
    }

    /// Create a class named `name` with `num_fields` declared fields and
    /// optional `superclass`, following §4.7's construction recipe: allocate
    /// a metaclass (0 fields, class-of the root `Class`) bound to `Class` as
    /// its own superclass, allocate the class itself with that metaclass as
    /// its class-of, then (if `superclass` is given) bind it — accumulating
    /// field counts and copying inherited methods by initial copy.
    pub fn create_class(&mut self, name: &str, superclass: Option<ClassId>, num_fields: u16) -> ClassId {
        let class_name = self.heap.alloc_string(name.as_bytes().to_vec());
        let meta_name = self.heap.alloc_string(format!("{name} metaclass").into_bytes());

        let metaclass = self.heap.alloc_class(EmberClass::new(meta_name, 0));
        if let Some(c) = self.heap.classes.get_mut(metaclass.0) {
            c.metaclass = Some(self.root_class);
        }
        self.bind_superclass(metaclass, self.root_class);

        let mut class = EmberClass::new(class_name, num_fields);
        class.metaclass = Some(metaclass);
        let class_id = self.heap.alloc_class(class);

        if let Some(super_id) = superclass {
            self.bind_superclass(class_id, super_id);
        }
        class_id
    }

    /// Bind `class.superclass = superclass` per §4.7 step 4: set the link,
    /// add the superclass's field count, and copy its methods by initial
    /// copy (later `bind` calls from an external compiler simply overwrite
    /// the copied entries).
    fn bind_superclass(&mut self, class: ClassId, superclass: ClassId) {
        let Some(super_class) = self.heap.classes.get(superclass.0).cloned() else {
            return;
        };
        if let Some(c) = self.heap.classes.get_mut(class.0) {
            c.superclass = Some(superclass);
            c.num_fields += super_class.num_fields;
            c.inherit_methods_from(&super_class);
        }
    }

    /// Allocate a plain (non-foreign) instance of `class`, fields initialized
    /// to `null` per §3 Object.
    pub fn new_instance(&mut self, class: ClassId, num_fields: u16) -> InstanceId {
        self.heap.alloc_instance(EmberInstance::new(class, num_fields))
    }

    /// Allocate an instance of a class declared `foreign` in `module`: look
    /// up its allocator/finalizer pair through
    /// [`Configuration::bind_foreign_class_fn`] and run the allocator once
    /// the instance exists, storing whatever it returns in field 0 — the
    /// slot foreign methods use to recover their backing Rust state. Returns
    /// `Err(ForeignFailure)` if no hooks are registered for this class.
    pub fn new_foreign_instance(
        &mut self,
        module: &str,
        class_name: &str,
        class: ClassId,
        num_fields: u16,
    ) -> Result<InstanceId> {
        let bind = self
            .config
            .bind_foreign_class_fn
            .ok_or_else(|| EmberError::new(ErrorKind::ForeignFailure, "no foreign class binder configured"))?;
        let hooks = bind(module, class_name)
            .ok_or_else(|| EmberError::new(ErrorKind::ForeignFailure, "no foreign allocator for this class"))?;

        let id = self.heap.alloc_instance(EmberInstance::new(class, num_fields));
        let ctx = ForeignCallContext { receiver: Value::NULL, args: &[] };
        let state = (hooks.allocate)(&ctx)?;
        if let Some(instance) = self.heap.instances.get_mut(id.0) {
            if !instance.fields.is_empty() {
                instance.fields[0] = state;
            }
        }
        Ok(id)
    }

    /// Park `closure` as a brand-new fiber and make it current, without
    /// running anything — the hand-off point described on this module's
    /// doc comment. Returns the new fiber's id so the external interpreter
    /// can begin stepping it.
    pub fn interpret(&mut self, entry: ClosureId) -> FiberId {
        let fiber = self.heap.alloc_fiber(entry);
        self.heap.set_current_fiber(Some(fiber));
        fiber
    }

    /// Transfer control to `callee`, recording `caller` as the fiber to
    /// resume once `callee` completes or fails.
    pub fn call(&mut self, caller: FiberId, callee: FiberId, is_try: bool) -> Result<()> {
        let callee_fiber = self
            .heap
            .fibers
            .get_mut(callee.0)
            .ok_or_else(|| EmberError::from_kind(ErrorKind::FiberState))?;
        if !callee_fiber.is_done() && callee_fiber.caller.is_some() {
            return Err(EmberError::new(ErrorKind::FiberState, "fiber is already running"));
        }
        callee_fiber.caller = Some(caller);
        callee_fiber.caller_is_trying = is_try;
        self.heap.set_current_fiber(Some(callee));
        Ok(())
    }

    /// The current fiber has completed normally: resume its caller, if any.
    pub fn return_from(&mut self, finished: FiberId) -> Option<FiberId> {
        let caller = self.heap.fibers.get(finished.0).and_then(|f| f.caller);
        self.heap.set_current_fiber(caller);
        caller
    }

    /// The current fiber failed with `message`: route to a trying caller or
    /// report to the embedder per §4.9, §6, §7.
    pub fn fail(&mut self, failing: FiberId, message: &str) -> Result<Option<FiberId>> {
        let string_id = self.heap.alloc_string(message.as_bytes().to_vec());
        let owned_frames = self.describe_frames(failing);
        let fiber = self
            .heap
            .fibers
            .get_mut(failing.0)
            .ok_or_else(|| EmberError::from_kind(ErrorKind::FiberState))?;
        match fiber.fail(string_id) {
            FailureRoute::ReturnToCaller(caller) => {
                self.heap.set_current_fiber(Some(caller));
                Ok(Some(caller))
            }
            FailureRoute::UnwindToEmbedder => {
                self.heap.set_current_fiber(None);
                if let Some(report) = self.config.error_fn {
                    let frames: Vec<crate::config::ErrorFrame<'_>> = owned_frames
                        .iter()
                        .map(|f| crate::config::ErrorFrame {
                            module: &f.module,
                            line: f.line,
                            function_name: &f.function_name,
                        })
                        .collect();
                    report(&frames, message);
                }
                Ok(None)
            }
        }
    }

    /// Resolve `fiber`'s call stack into `(module, line, function name)`
    /// triples, innermost first, for [`Configuration::error_fn`]. Must run
    /// before the fiber's frames are cleared by `EmberFiber::fail`.
    fn describe_frames(&self, fiber: FiberId) -> Vec<OwnedFrame> {
        let Some(f) = self.heap.fibers.get(fiber.0) else {
            return Vec::new();
        };
        f.frames
            .iter()
            .rev()
            .map(|frame| {
                let closure = self.heap.closures.get(frame.closure.0);
                let function = closure.and_then(|c| self.heap.functions.get(c.function.0));
                let module = function
                    .and_then(|func| self.heap.modules.get(func.module.0))
                    .map(|m| m.name.clone())
                    .unwrap_or_default();
                let line = function
                    .and_then(|func| func.debug.line_for_offset.get(frame.ip).copied())
                    .unwrap_or(0);
                let function_name = function.map(|func| func.debug.name.clone()).unwrap_or_default();
                OwnedFrame { module, line, function_name }
            })
            .collect()
    }

    /// Force one mark-sweep cycle now, using the current fiber, every
    /// registered module, and every pinned handle as roots. Every `Heap`
    /// allocation already runs this automatically once the allocator's
    /// threshold is crossed (§4.1) — this is the explicit embedder-facing
    /// entry point for forcing a cycle early.
    pub fn collect_garbage(&mut self) {
        self.heap.collect_garbage();
    }

    pub fn maybe_collect_garbage(&mut self) {
        self.heap.maybe_collect_garbage();
    }

    pub fn pin(&mut self, value: ObjRef) -> HandleId {
        self.heap.pin(value)
    }

    pub fn unpin(&mut self, handle: HandleId) {
        self.heap.unpin(handle);
    }
}

/// Bootstrap the root `Class` class: the one class the general §4.7 recipe
/// can't build, since that recipe needs the root `Class` to already exist
/// (to be the new metaclass's class-of). `Class`'s own metaclass, `Class
/// metaclass`, is instead built by hand here and wired back onto `Class`
/// once both exist. Every other class (starting with `Object`, built right
/// after this returns) goes through [`Vm::create_class`] instead.
fn bootstrap_root_class(heap: &mut Heap) -> ClassId {
    let class_name = heap.alloc_string(b"Class".to_vec());
    let class_id = heap.alloc_class(EmberClass::new(class_name, 0));

    let meta_name = heap.alloc_string(b"Class metaclass".to_vec());
    let meta_id = heap.alloc_class(EmberClass::new(meta_name, 0));
    if let Some(meta) = heap.classes.get_mut(meta_id.0) {
        meta.metaclass = Some(class_id);
    }

    let root = heap.classes.get(class_id.0).cloned();
    if let (Some(root), Some(meta)) = (root, heap.classes.get_mut(meta_id.0)) {
        meta.superclass = Some(class_id);
        meta.num_fields += root.num_fields;
        meta.inherit_methods_from(&root);
    }

    if let Some(c) = heap.classes.get_mut(class_id.0) {
        c.metaclass = Some(meta_id);
    }
    class_id
}
