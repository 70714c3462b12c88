//! End-to-end class construction: the §4.7 metaclass recipe exercised
//! through [`crate::vm::Vm::create_class`] rather than `EmberClass::new`
//! directly, so superclass/metaclass wiring and field/method inheritance are
//! actually under test.

use crate::config::Configuration;
use crate::object::class::Method;
use crate::vm::Vm;

#[test]
fn bootstrapping_wires_class_and_object_metaclasses() {
    let vm = Vm::new(Configuration::new());
    let class = vm.heap.classes.get(vm.root_class.0).unwrap();
    assert!(class.metaclass.is_some(), "Class's class-of must be its own metaclass");
    assert_ne!(class.metaclass, Some(vm.root_class), "Class's metaclass is a distinct object, not Class itself");
    assert_eq!(class.superclass, None, "the root Class has no superclass");

    let meta = vm.heap.classes.get(class.metaclass.unwrap().0).unwrap();
    assert_eq!(meta.superclass, Some(vm.root_class), "Class metaclass's superclass is Class");

    let object = vm.heap.classes.get(vm.root_object.0).unwrap();
    assert!(object.metaclass.is_some(), "Object's class-of must be its own metaclass");
    assert_ne!(object.metaclass, Some(vm.root_class), "Object's metaclass is distinct from Class itself");
    assert_eq!(object.superclass, None, "Object is the root of the class hierarchy");
}

#[test]
fn subclass_accumulates_fields_and_inherits_methods() {
    let mut vm = Vm::new(Configuration::new());

    fn getter(receiver: crate::value::Value, _args: &[crate::value::Value]) -> crate::error::Result<crate::value::Value> {
        Ok(receiver)
    }

    let base = vm.create_class("Animal", Some(vm.root_object), 2);
    if let Some(c) = vm.heap.classes.get_mut(base.0) {
        c.bind(0, Method::Primitive(getter));
    }

    let derived = vm.create_class("Dog", Some(base), 3);
    let derived_class = vm.heap.classes.get(derived.0).unwrap();

    assert_eq!(derived_class.num_fields, 5, "3 declared fields plus Animal's 2");
    assert!(matches!(derived_class.method(0), Method::Primitive(_)), "Dog must inherit Animal's bound method");
    assert_eq!(derived_class.superclass, Some(base));
}

#[test]
fn each_class_gets_its_own_named_metaclass() {
    let mut vm = Vm::new(Configuration::new());
    let a = vm.create_class("A", Some(vm.root_object), 0);
    let b = vm.create_class("B", Some(vm.root_object), 0);

    let meta_a = vm.heap.classes.get(a.0).unwrap().metaclass;
    let meta_b = vm.heap.classes.get(b.0).unwrap().metaclass;
    assert_ne!(meta_a, meta_b, "every class gets its own metaclass, not a shared one");

    let meta_a_class = vm.heap.classes.get(meta_a.unwrap().0).unwrap();
    assert_eq!(meta_a_class.superclass, Some(vm.root_class), "every metaclass descends from the root Class");
}
