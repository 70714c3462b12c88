//! Top-level variable name table and parallel value buffer.
//!
//! Ground: the dense-index-plus-name-table pattern used throughout
//! `lua_value::lua_table`.

use crate::symbol_table::SymbolTable;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct EmberModule {
    pub name: String,
    pub variable_names: SymbolTable,
    pub variables: Vec<Value>,
}

impl EmberModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable_names: SymbolTable::new(),
            variables: Vec::new(),
        }
    }

    /// A referenced-but-undefined slot holds the numeric sentinel equal to
    /// its declaration line, per §3 Module.
    pub fn declare(&mut self, name: &str, declaration_line: u32) -> usize {
        let index = self.variable_names.ensure(name);
        if index == self.variables.len() {
            self.variables.push(Value::num(declaration_line as f64));
        }
        index
    }

    pub fn define(&mut self, index: usize, value: Value) {
        self.variables[index] = value;
    }

    /// Whether the slot still holds the undefined-sentinel line number it
    /// was declared with. The caller (the external compiler, which tracked
    /// the declaration) supplies that line since the sentinel is only
    /// meaningful in relation to it — an ordinary numeric value that happens
    /// to equal the line is indistinguishable from the sentinel otherwise,
    /// a known sharp edge of the line-number-as-sentinel scheme.
    pub fn is_undefined(&self, index: usize, declaration_line: u32) -> bool {
        self.variables
            .get(index)
            .and_then(|v| v.as_num())
            .is_some_and(|n| n == declaration_line as f64)
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.variables.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_define_replaces_sentinel() {
        let mut module = EmberModule::new("main");
        let idx = module.declare("x", 7);
        assert_eq!(module.get(idx).unwrap().as_num(), Some(7.0));
        module.define(idx, Value::num(99.0));
        assert_eq!(module.get(idx).unwrap().as_num(), Some(99.0));
    }
}
