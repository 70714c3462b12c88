//! Embedder-supplied configuration: callbacks and heap-size knobs.
//!
//! Ground: `lua_vm::safe_option.rs` and `lua_vm::mod.rs::LuaVM::new`'s
//! pattern of threading an options struct with sensible defaults through
//! construction, so an embedder only overrides what it cares about.

use crate::allocator::{DEFAULT_HEAP_GROW_PERCENT, DEFAULT_MIN_HEAP_BYTES};
use crate::error::Result;

/// Resolves `import "name"` to source text. The compiler that parses the
/// result is out of scope for this core; this callback exists so the
/// `Vm` can be exercised end-to-end without one, by having embedders hand
/// back pre-compiled entry points keyed by name instead.
pub type LoadModuleFn = fn(name: &str) -> Result<String>;

/// Called when a class declared `foreign` needs its methods bound; the
/// embedder looks the signature up in its own registry (or the core's
/// built-in [`crate::foreign::ForeignRegistry`]) and returns a function
/// pointer.
pub type BindForeignMethodFn = fn(module: &str, class: &str, signature: &str, is_static: bool) -> Option<crate::foreign::ForeignFn>;

/// A foreign class's constructor and, optionally, its destructor — called
/// when script code allocates or an Instance of this class is swept.
#[derive(Clone, Copy)]
pub struct ForeignClassHooks {
    pub allocate: crate::foreign::ForeignFn,
    pub finalize: Option<fn(crate::value::Value)>,
}

pub type BindForeignClassFn = fn(module: &str, class: &str) -> Option<ForeignClassHooks>;

/// Diagnostic/print output sink, matching the teacher's `write_fn` callback
/// shape (a single string, not `fmt::Arguments`, so embedders across an FFI
/// boundary don't need Rust's formatting machinery).
pub type WriteFn = fn(text: &str);

/// One stack frame as reported to [`ErrorFn`], innermost first, per §6's
/// "exit behavior" contract.
pub struct ErrorFrame<'a> {
    pub module: &'a str,
    pub line: u32,
    pub function_name: &'a str,
}

/// Uncaught-error sink, invoked once a fiber's failure has unwound all the
/// way to the embedder (§4.9, §6 exit behavior, §7 propagation): receives
/// every frame in stack order plus the final message line.
pub type ErrorFn = fn(frames: &[ErrorFrame<'_>], message: &str);

#[derive(Clone)]
pub struct Configuration {
    pub load_module_fn: Option<LoadModuleFn>,
    pub bind_foreign_method_fn: Option<BindForeignMethodFn>,
    pub bind_foreign_class_fn: Option<BindForeignClassFn>,
    pub write_fn: Option<WriteFn>,
    pub error_fn: Option<ErrorFn>,
    pub initial_heap_size: usize,
    pub min_heap_size: usize,
    pub heap_growth_percent: u32,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            load_module_fn: None,
            bind_foreign_method_fn: None,
            bind_foreign_class_fn: None,
            write_fn: None,
            error_fn: None,
            initial_heap_size: DEFAULT_MIN_HEAP_BYTES,
            min_heap_size: DEFAULT_MIN_HEAP_BYTES,
            heap_growth_percent: DEFAULT_HEAP_GROW_PERCENT,
        }
    }
}
