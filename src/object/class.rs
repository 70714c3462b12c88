//! Classes: a dense, symbol-indexed method table plus the metaclass
//! construction recipe from §4.7.
//!
//! The teacher has no class concept (Lua's object model is tables, not
//! classes), so the method-table shape here is greenfield against the spec,
//! styled after the `enum`-tagged value kinds used elsewhere in the teacher
//! (e.g. `LuaValueKind`) rather than lifted from any one file.

use crate::error::Result;
use crate::foreign::ForeignFn;
use crate::gc::id::{ClassId, ClosureId, StringId};
use crate::value::Value;

pub type PrimitiveFn = fn(receiver: Value, args: &[Value]) -> Result<Value>;

#[derive(Clone, Copy)]
pub enum Method {
    None,
    Primitive(PrimitiveFn),
    Foreign(ForeignFn),
    Closure(ClosureId),
    FieldGetter(u16),
    FieldSetter(u16),
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::None => write!(f, "Method::None"),
            Method::Primitive(_) => write!(f, "Method::Primitive(..)"),
            Method::Foreign(_) => write!(f, "Method::Foreign(..)"),
            Method::Closure(c) => write!(f, "Method::Closure({c:?})"),
            Method::FieldGetter(i) => write!(f, "Method::FieldGetter({i})"),
            Method::FieldSetter(i) => write!(f, "Method::FieldSetter({i})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmberClass {
    pub superclass: Option<ClassId>,
    pub metaclass: Option<ClassId>,
    pub name: StringId,
    pub num_fields: u16,
    /// Indexed by global method symbol. Grown with `Method::None` fillers so
    /// symbol indices stay stable across every class.
    pub methods: Vec<Method>,
}

impl EmberClass {
    pub fn new(name: StringId, num_fields: u16) -> Self {
        Self {
            superclass: None,
            metaclass: None,
            name,
            num_fields,
            methods: Vec::new(),
        }
    }

    pub fn method(&self, symbol: usize) -> &Method {
        self.methods.get(symbol).unwrap_or(&Method::None)
    }

    /// Bind `method` at `symbol`, padding with `Method::None` so the vector
    /// is at least `symbol + 1` long.
    pub fn bind(&mut self, symbol: usize, method: Method) {
        if symbol >= self.methods.len() {
            self.methods.resize(symbol + 1, Method::None);
        }
        self.methods[symbol] = method;
    }

    /// Copy every bound method from `other` into `self`, padding as needed.
    /// This is the "inheritance by initial copy" step of §4.7 step 4 — later
    /// overrides from the (external) compiler simply call `bind` again.
    pub fn inherit_methods_from(&mut self, other: &EmberClass) {
        if other.methods.len() > self.methods.len() {
            self.methods.resize(other.methods.len(), Method::None);
        }
        for (i, m) in other.methods.iter().enumerate() {
            if !matches!(m, Method::None) {
                self.methods[i] = *m;
            }
        }
    }
}
