//! Reactive objects
//!
//! One `ReactiveObject` is created per compiled frame. It owns a flat
//! property table shared by scalars, function values and child objects,
//! plus separate tables for listener callables, listener pointers, init
//! callables and observers.
//!
//! `set` runs the property's observers synchronously, in registration
//! order, before it returns. While a property's observers are running a
//! nested write to the same property is refused with
//! [`ObserverError::Cycle`].

use crate::ast::Frame;
use crate::diagnostics::Diagnostics;
use crate::error::ObserverError;
use amber_script::{HostObject, ScriptResult, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

pub const INSTANCE_NAME_PROPERTY: &str = "instanceName";
pub const CLASS_NAME_PROPERTY: &str = "className";

/// Callback registered on a property. Receives the new value.
pub type ObserverCallback = Rc<dyn Fn(&Value)>;

/// Resolved binding of one listener argument to an object property.
#[derive(Clone)]
pub struct ObjectPointer {
    reference_name: String,
    pointed_name: String,
    pointed_object: Weak<ReactiveObject>,
}

impl ObjectPointer {
    pub fn new(
        reference_name: impl Into<String>,
        pointed_name: impl Into<String>,
        pointed_object: &Rc<ReactiveObject>,
    ) -> Self {
        ObjectPointer {
            reference_name: reference_name.into(),
            pointed_name: pointed_name.into(),
            pointed_object: Rc::downgrade(pointed_object),
        }
    }

    /// Parameter name inside the listener body
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    /// Property name on the pointed object
    pub fn pointed_name(&self) -> &str {
        &self.pointed_name
    }

    pub fn pointed_object(&self) -> Option<Rc<ReactiveObject>> {
        self.pointed_object.upgrade()
    }
}

impl fmt::Debug for ObjectPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self
            .pointed_object()
            .map(|obj| obj.path().to_string())
            .unwrap_or_else(|| "<released>".to_string());
        write!(
            f,
            "{} -> {}.{}",
            self.reference_name, target, self.pointed_name
        )
    }
}

pub struct ReactiveObject {
    frame: Frame,
    path: String,
    diagnostics: Diagnostics,
    properties: RefCell<HashMap<String, Value>>,
    scripted_property_names: RefCell<Vec<String>>,
    listener_functions: RefCell<Vec<(String, Value)>>,
    listener_pointers: RefCell<HashMap<String, Vec<ObjectPointer>>>,
    init_functions: RefCell<Vec<(String, Value)>>,
    observers: RefCell<HashMap<String, Vec<ObserverCallback>>>,
    children: RefCell<Vec<Rc<ReactiveObject>>>,
    notifying: RefCell<HashSet<String>>,
}

impl ReactiveObject {
    pub fn new(frame: &Frame, path: impl Into<String>, diagnostics: Diagnostics) -> Rc<Self> {
        let mut properties = HashMap::new();
        properties.insert(
            INSTANCE_NAME_PROPERTY.to_string(),
            Value::from(frame.instance_name.as_str()),
        );
        properties.insert(
            CLASS_NAME_PROPERTY.to_string(),
            Value::from(frame.class_name.as_str()),
        );
        Rc::new(ReactiveObject {
            frame: frame.clone(),
            path: path.into(),
            diagnostics,
            properties: RefCell::new(properties),
            scripted_property_names: RefCell::new(Vec::new()),
            listener_functions: RefCell::new(Vec::new()),
            listener_pointers: RefCell::new(HashMap::new()),
            init_functions: RefCell::new(Vec::new()),
            observers: RefCell::new(HashMap::new()),
            children: RefCell::new(Vec::new()),
            notifying: RefCell::new(HashSet::new()),
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Dotted instance path from the root, e.g. `root.sub`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn instance_name(&self) -> &str {
        &self.frame.instance_name
    }

    pub fn class_name(&self) -> &str {
        &self.frame.class_name
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Script value referring to this object.
    pub fn to_value(self: &Rc<Self>) -> Value {
        Value::Host(self.clone())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.properties.borrow().get(name).cloned()
    }

    /// Store a value without notifying observers.
    pub fn define(&self, name: &str, value: Value) {
        self.properties.borrow_mut().insert(name.to_string(), value);
    }

    /// Store a value and run the property's observers.
    pub fn set(&self, name: &str, value: Value) -> Result<(), ObserverError> {
        if self.notifying.borrow().contains(name) {
            return Err(ObserverError::Cycle {
                object: self.path.clone(),
                property: name.to_string(),
            });
        }
        self.define(name, value.clone());

        // Observers may re-enter this object, so nothing stays borrowed.
        let observers = self
            .observers
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default();
        if observers.is_empty() {
            return Ok(());
        }
        self.notifying.borrow_mut().insert(name.to_string());
        for observer in &observers {
            observer(&value);
        }
        self.notifying.borrow_mut().remove(name);
        Ok(())
    }

    pub fn add_observer(&self, name: &str, callback: ObserverCallback) {
        self.observers
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(callback);
    }

    pub fn observer_count(&self, name: &str) -> usize {
        self.observers.borrow().get(name).map_or(0, |o| o.len())
    }

    /// Property names in sorted order.
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Record a member name. Returns false if it was already recorded.
    pub fn add_scripted_property_name(&self, name: &str) -> bool {
        let mut names = self.scripted_property_names.borrow_mut();
        if names.iter().any(|n| n == name) {
            return false;
        }
        names.push(name.to_string());
        true
    }

    pub fn scripted_property_names(&self) -> Vec<String> {
        self.scripted_property_names.borrow().clone()
    }

    pub fn set_listener_function(&self, name: &str, callable: Value) {
        let mut functions = self.listener_functions.borrow_mut();
        match functions.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = callable,
            None => functions.push((name.to_string(), callable)),
        }
    }

    pub fn listener_function(&self, name: &str) -> Option<Value> {
        self.listener_functions
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, callable)| callable.clone())
    }

    /// Listener names in declaration order.
    pub fn listener_names(&self) -> Vec<String> {
        self.listener_functions
            .borrow()
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn set_listener_pointers(&self, name: &str, pointers: Vec<ObjectPointer>) {
        self.listener_pointers
            .borrow_mut()
            .insert(name.to_string(), pointers);
    }

    pub fn listener_pointers(&self, name: &str) -> Option<Vec<ObjectPointer>> {
        self.listener_pointers.borrow().get(name).cloned()
    }

    pub fn add_init_function(&self, name: &str, callable: Value) {
        self.init_functions
            .borrow_mut()
            .push((name.to_string(), callable));
    }

    pub fn init_functions(&self) -> Vec<(String, Value)> {
        self.init_functions.borrow().clone()
    }

    /// Attach a child object, reachable as a property under its
    /// instance name.
    pub fn add_child(&self, child: Rc<ReactiveObject>) {
        self.define(child.instance_name(), child.to_value());
        self.children.borrow_mut().push(child);
    }

    pub fn child_frame(&self, name: &str) -> Option<Rc<ReactiveObject>> {
        self.children
            .borrow()
            .iter()
            .find(|c| c.instance_name() == name)
            .cloned()
    }

    /// Children in declaration order.
    pub fn children(&self) -> Vec<Rc<ReactiveObject>> {
        self.children.borrow().clone()
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("path", &self.path)
            .field("class_name", &self.frame.class_name)
            .field("properties", &self.property_names())
            .finish()
    }
}

impl HostObject for ReactiveObject {
    fn type_name(&self) -> String {
        self.frame.class_name.clone()
    }

    fn get(&self, name: &str) -> Value {
        ReactiveObject::get(self, name).unwrap_or_default()
    }

    /// Script writes that hit a cycle are refused and reported; the
    /// script itself keeps running.
    fn set(&self, name: &str, value: Value) -> ScriptResult<()> {
        if let Err(err) = ReactiveObject::set(self, name, value) {
            self.diagnostics.report(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_script::{Interpreter, ScriptEngine};
    use std::cell::Cell;

    fn object(name: &str) -> Rc<ReactiveObject> {
        ReactiveObject::new(&Frame::new("Object", name), name, Diagnostics::new())
    }

    #[test]
    fn test_default_properties() {
        let obj = object("root");
        assert_eq!(obj.get("instanceName"), Some(Value::from("root")));
        assert_eq!(obj.get("className"), Some(Value::from("Object")));
        assert_eq!(obj.get("missing"), None);
    }

    #[test]
    fn test_observers_run_in_order() {
        let obj = object("root");
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let log = log.clone();
            obj.add_observer(
                "a",
                Rc::new(move |v: &Value| log.borrow_mut().push(format!("{} {}", tag, v))),
            );
        }
        obj.set("a", Value::from(3i64)).unwrap();
        obj.set("b", Value::from(4i64)).unwrap();
        assert_eq!(*log.borrow(), vec!["first 3", "second 3"]);
        assert_eq!(obj.get("a"), Some(Value::from(3i64)));
    }

    #[test]
    fn test_define_does_not_notify() {
        let obj = object("root");
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        obj.add_observer("a", Rc::new(move |_: &Value| counter.set(counter.get() + 1)));
        obj.define("a", Value::from(1i64));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_reentrant_write_is_refused() {
        let obj = object("root");
        let inner = Rc::downgrade(&obj);
        let result = Rc::new(RefCell::new(None));
        let seen = result.clone();
        obj.add_observer(
            "a",
            Rc::new(move |_: &Value| {
                if let Some(obj) = inner.upgrade() {
                    *seen.borrow_mut() = Some(obj.set("a", Value::from(0i64)));
                }
            }),
        );
        obj.set("a", Value::from(1i64)).unwrap();
        assert!(matches!(
            result.borrow().as_ref(),
            Some(Err(ObserverError::Cycle { .. }))
        ));
        assert_eq!(obj.get("a"), Some(Value::from(1i64)));
        // the guard is released once notification finishes
        assert!(obj.set("b", Value::from(2i64)).is_ok());
    }

    #[test]
    fn test_children_and_pointers() {
        let root = object("root");
        let sub = ReactiveObject::new(&Frame::new("Object", "sub"), "root.sub", Diagnostics::new());
        root.add_child(sub.clone());
        assert!(Rc::ptr_eq(&root.child_frame("sub").unwrap(), &sub));
        assert!(matches!(root.get("sub"), Some(Value::Host(_))));

        let pointer = ObjectPointer::new("x", "b", &sub);
        assert_eq!(format!("{:?}", pointer), "x -> root.sub.b");
        root.set_listener_pointers("f", vec![pointer.clone()]);
        assert_eq!(root.listener_pointers("f").map(|p| p.len()), Some(1));

        drop(root);
        drop(sub);
        assert!(pointer.pointed_object().is_none());
    }

    #[test]
    fn test_script_access() {
        let obj = object("root");
        obj.define("a", Value::from(1i64));
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        obj.add_observer("a", Rc::new(move |_: &Value| counter.set(counter.get() + 1)));

        let engine = Interpreter::new();
        engine.set_named_value("root", obj.to_value());
        let result = engine
            .evaluate_script("root.a = root.a + 41; root.instanceName")
            .unwrap();
        assert_eq!(result, Value::from("root"));
        assert_eq!(obj.get("a"), Some(Value::from(42i64)));
        assert_eq!(hits.get(), 1);
    }
}
