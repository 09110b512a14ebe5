//! Listener bindings
//!
//! A binding ties one listener function of an owner object to the
//! properties its path arguments point at. Invoking it gathers the
//! current pointed values, calls the listener with
//! `(owner, values...)` and writes a defined result back into the
//! owner's property of the same name.

use crate::diagnostics::Diagnostics;
use crate::error::ObserverError;
use crate::reactive::ReactiveObject;
use amber_script::{ScriptEngine, Value};
use std::rc::{Rc, Weak};

pub struct ListenerBinding {
    owner: Weak<ReactiveObject>,
    listener: String,
    engine: Rc<dyn ScriptEngine>,
    diagnostics: Diagnostics,
}

impl ListenerBinding {
    pub fn new(
        owner: &Rc<ReactiveObject>,
        listener: &str,
        engine: Rc<dyn ScriptEngine>,
        diagnostics: Diagnostics,
    ) -> Self {
        ListenerBinding {
            owner: Rc::downgrade(owner),
            listener: listener.to_string(),
            engine,
            diagnostics,
        }
    }

    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// Run the listener once and store its result.
    pub fn invoke(&self) -> Result<(), ObserverError> {
        let owner = self.owner.upgrade().ok_or_else(|| ObserverError::Released {
            listener: self.listener.clone(),
        })?;
        let callable =
            owner
                .listener_function(&self.listener)
                .ok_or_else(|| ObserverError::MissingFunction {
                    object: owner.path().to_string(),
                    listener: self.listener.clone(),
                })?;

        let mut args = vec![owner.to_value()];
        for pointer in owner.listener_pointers(&self.listener).unwrap_or_default() {
            let target = pointer
                .pointed_object()
                .ok_or_else(|| ObserverError::Released {
                    listener: self.listener.clone(),
                })?;
            let value = target
                .get(pointer.pointed_name())
                .ok_or_else(|| ObserverError::MissingProperty {
                    object: target.path().to_string(),
                    property: pointer.pointed_name().to_string(),
                    listener: self.listener.clone(),
                })?;
            args.push(value);
        }

        let result = self.engine.call_function(&callable, &args);
        self.engine.reset_error_count();
        let result = result.map_err(|error| ObserverError::Script {
            object: owner.path().to_string(),
            listener: self.listener.clone(),
            error,
        })?;
        if result.is_undefined() {
            return Err(ObserverError::NoResult {
                object: owner.path().to_string(),
                listener: self.listener.clone(),
            });
        }
        tracing::trace!("{}.{} = {}", owner.path(), self.listener, result.describe());
        owner.set(&self.listener, result)
    }

    /// Invoke and report any failure instead of returning it.
    pub fn fire(&self) {
        if let Err(err) = self.invoke() {
            self.diagnostics.report(err);
        }
    }
}

/// Register observers so that the listener re-runs whenever one of its
/// pointed properties changes.
pub fn link(
    owner: &Rc<ReactiveObject>,
    listener: &str,
    engine: Rc<dyn ScriptEngine>,
    diagnostics: Diagnostics,
) {
    let pointers = owner.listener_pointers(listener).unwrap_or_default();
    let binding = Rc::new(ListenerBinding::new(
        owner,
        listener,
        engine,
        diagnostics.clone(),
    ));
    for pointer in pointers {
        match pointer.pointed_object() {
            Some(target) => {
                let binding = binding.clone();
                target.add_observer(
                    pointer.pointed_name(),
                    Rc::new(move |_: &Value| binding.fire()),
                );
            }
            None => diagnostics.report(ObserverError::Released {
                listener: listener.to_string(),
            }),
        }
    }
}

/// Link every listener in the tree, children before their parent.
pub fn link_tree(
    object: &Rc<ReactiveObject>,
    engine: &Rc<dyn ScriptEngine>,
    diagnostics: &Diagnostics,
) {
    for child in object.children() {
        link_tree(&child, engine, diagnostics);
    }
    for listener in object.listener_names() {
        link(object, &listener, engine.clone(), diagnostics.clone());
    }
}

/// Invoke every listener in the tree once, children before their
/// parent.
pub fn seed_tree(
    object: &Rc<ReactiveObject>,
    engine: &Rc<dyn ScriptEngine>,
    diagnostics: &Diagnostics,
) {
    for child in object.children() {
        seed_tree(&child, engine, diagnostics);
    }
    for listener in object.listener_names() {
        ListenerBinding::new(object, &listener, engine.clone(), diagnostics.clone()).fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Frame;
    use crate::reactive::ObjectPointer;
    use amber_script::Interpreter;

    fn setup() -> (Rc<dyn ScriptEngine>, Rc<ReactiveObject>, Diagnostics) {
        let engine: Rc<dyn ScriptEngine> = Rc::new(Interpreter::new());
        let diagnostics = Diagnostics::new();
        let obj = ReactiveObject::new(&Frame::new("Object", "root"), "root", diagnostics.clone());
        (engine, obj, diagnostics)
    }

    fn listener(engine: &Rc<dyn ScriptEngine>, source: &str) -> Value {
        engine.evaluate_script(source).unwrap()
    }

    #[test]
    fn test_invoke_stores_result() {
        let (engine, obj, diagnostics) = setup();
        obj.define("a", Value::from(2i64));
        obj.set_listener_function(
            "f",
            listener(&engine, "t = function(self, x) { return x * 10 ; }"),
        );
        obj.set_listener_pointers("f", vec![ObjectPointer::new("x", "a", &obj)]);
        link(&obj, "f", engine.clone(), diagnostics.clone());
        assert_eq!(obj.observer_count("a"), 1);

        ListenerBinding::new(&obj, "f", engine.clone(), diagnostics.clone())
            .invoke()
            .unwrap();
        assert_eq!(obj.get("f"), Some(Value::from(20i64)));

        obj.set("a", Value::from(5i64)).unwrap();
        assert_eq!(obj.get("f"), Some(Value::from(50i64)));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_missing_property_is_skipped() {
        let (engine, obj, diagnostics) = setup();
        obj.set_listener_function(
            "f",
            listener(&engine, "t = function(self, x) { return 1 ; }"),
        );
        obj.set_listener_pointers("f", vec![ObjectPointer::new("x", "absent", &obj)]);
        ListenerBinding::new(&obj, "f", engine, diagnostics.clone()).fire();
        assert_eq!(obj.get("f"), None);
        assert!(matches!(
            diagnostics.errors().as_slice(),
            [ObserverError::MissingProperty { property, .. }] if property == "absent"
        ));
    }

    #[test]
    fn test_undefined_result_is_not_stored() {
        let (engine, obj, diagnostics) = setup();
        obj.set_listener_function("f", listener(&engine, "t = function(self) { }"));
        ListenerBinding::new(&obj, "f", engine, diagnostics.clone()).fire();
        assert_eq!(obj.get("f"), None);
        assert!(matches!(
            diagnostics.errors().as_slice(),
            [ObserverError::NoResult { .. }]
        ));
    }

    #[test]
    fn test_failing_listener_does_not_stop_siblings() {
        let (engine, obj, diagnostics) = setup();
        obj.define("a", Value::from(1i64));
        obj.set_listener_function(
            "bad",
            listener(&engine, "t = function(self, x) { return nothing ; }"),
        );
        obj.set_listener_function(
            "good",
            listener(&engine, "t = function(self, x) { return x + 1 ; }"),
        );
        for name in ["bad", "good"] {
            obj.set_listener_pointers(name, vec![ObjectPointer::new("x", "a", &obj)]);
            link(&obj, name, engine.clone(), diagnostics.clone());
        }
        assert_eq!(obj.observer_count("a"), 2);

        assert!(obj.set("a", Value::from(5i64)).is_ok());
        assert_eq!(obj.get("good"), Some(Value::from(6i64)));
        assert_eq!(obj.get("bad"), None);
        assert!(matches!(
            diagnostics.errors().as_slice(),
            [ObserverError::Script { listener, .. }] if listener == "bad"
        ));
    }

    #[test]
    fn test_script_failure_is_reported() {
        let (engine, obj, diagnostics) = setup();
        obj.set_listener_function(
            "f",
            listener(&engine, "t = function(self) { return nothing ; }"),
        );
        ListenerBinding::new(&obj, "f", engine.clone(), diagnostics.clone()).fire();
        assert!(matches!(
            diagnostics.errors().as_slice(),
            [ObserverError::Script { .. }]
        ));
        assert_eq!(engine.error_count(), 0);
    }
}
