//! Foreign method registration: `(module, class, signature, is_static) -> fn`.
//!
//! Ground: `lib_registry.rs`'s table mapping a library/function name pair to
//! a native Rust function pointer, generalized to the three-part key a
//! foreign method needs (module + class + signature) plus the static/
//! instance split.

use crate::error::Result;
use crate::value::Value;
use ahash::AHashMap;

/// What a foreign method implementation sees: the receiver, the argument
/// list, and a slot to write its return value into. Matches the shape of a
/// primitive/bytecode call so the dispatcher in the (external) interpreter
/// can treat all three uniformly.
pub struct ForeignCallContext<'a> {
    pub receiver: Value,
    pub args: &'a [Value],
}

pub type ForeignFn = fn(&ForeignCallContext<'_>) -> Result<Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ForeignKey {
    module: Box<str>,
    class: Box<str>,
    signature: Box<str>,
    is_static: bool,
}

#[derive(Default)]
pub struct ForeignRegistry {
    methods: AHashMap<ForeignKey, ForeignFn>,
}

impl ForeignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: &str, class: &str, signature: &str, is_static: bool, f: ForeignFn) {
        self.methods.insert(
            ForeignKey {
                module: module.into(),
                class: class.into(),
                signature: signature.into(),
                is_static,
            },
            f,
        );
    }

    pub fn lookup(&self, module: &str, class: &str, signature: &str, is_static: bool) -> Option<ForeignFn> {
        self.methods
            .get(&ForeignKey {
                module: module.into(),
                class: class.into(),
                signature: signature.into(),
                is_static,
            })
            .copied()
    }
}
