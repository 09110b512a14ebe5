//! Components
//!
//! A component wraps one reactive object for the embedding
//! application. Components are allocated through a
//! [`ComponentRegistry`] keyed by class name and arranged by
//! [`ComponentMapper`] into a tree that mirrors the nested frames.

use crate::ast::Value as FrameValue;
use crate::error::CompileError;
use crate::reactive::ReactiveObject;
use amber_script::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;

pub trait Component {
    fn react_object(&self) -> &Rc<ReactiveObject>;

    fn children(&self) -> Vec<Rc<dyn Component>>;

    fn add_child(&self, child: Rc<dyn Component>);

    fn search_child(&self, name: &str) -> Option<Rc<dyn Component>> {
        self.children()
            .into_iter()
            .find(|c| c.react_object().instance_name() == name)
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.react_object().get(name)
    }

    /// Returns false if the write was refused.
    fn set(&self, name: &str, value: Value) -> bool {
        match self.react_object().set(name, value) {
            Ok(()) => true,
            Err(err) => {
                self.react_object().diagnostics().report(err);
                false
            }
        }
    }
}

/// Plain component used for the `Object` class.
pub struct ObjectComponent {
    object: Rc<ReactiveObject>,
    children: RefCell<Vec<Rc<dyn Component>>>,
}

impl ObjectComponent {
    pub fn new(object: Rc<ReactiveObject>) -> Self {
        ObjectComponent {
            object,
            children: RefCell::new(Vec::new()),
        }
    }
}

impl Component for ObjectComponent {
    fn react_object(&self) -> &Rc<ReactiveObject> {
        &self.object
    }

    fn children(&self) -> Vec<Rc<dyn Component>> {
        self.children.borrow().clone()
    }

    fn add_child(&self, child: Rc<dyn Component>) {
        self.children.borrow_mut().push(child);
    }
}

/// Creates the component for a reactive object.
pub type Allocator = fn(Rc<ReactiveObject>) -> Rc<dyn Component>;

pub fn allocate_object(object: Rc<ReactiveObject>) -> Rc<dyn Component> {
    Rc::new(ObjectComponent::new(object))
}

/// Class name to allocator table, passed into each compile.
#[derive(Clone)]
pub struct ComponentRegistry {
    allocators: HashMap<String, Allocator>,
    fallback: Option<Allocator>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        ComponentRegistry::empty().with_class("Object", allocate_object)
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        ComponentRegistry {
            allocators: HashMap::new(),
            fallback: None,
        }
    }

    pub fn with_class(mut self, class_name: &str, allocator: Allocator) -> Self {
        self.register(class_name, allocator);
        self
    }

    /// Allocator for classes that are not registered.
    pub fn with_fallback(mut self, allocator: Allocator) -> Self {
        self.fallback = Some(allocator);
        self
    }

    pub fn register(&mut self, class_name: &str, allocator: Allocator) {
        self.allocators.insert(class_name.to_string(), allocator);
    }

    pub fn allocator(&self, class_name: &str) -> Result<Allocator, CompileError> {
        self.allocators
            .get(class_name)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| CompileError::UnknownClass(class_name.to_string()))
    }
}

/// Maps a reactive object tree onto a component tree.
pub struct ComponentMapper<'a> {
    registry: &'a ComponentRegistry,
}

impl<'a> ComponentMapper<'a> {
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        ComponentMapper { registry }
    }

    pub fn map(&self, object: &Rc<ReactiveObject>) -> Result<Rc<dyn Component>, CompileError> {
        let allocate = self.registry.allocator(object.class_name())?;
        let component = allocate(object.clone());
        for child in object.children() {
            component.add_child(self.map(&child)?);
        }
        Ok(component)
    }
}

/// Text dump of a component tree with current property values.
pub fn dump_component(component: &dyn Component) -> String {
    let mut out = String::new();
    dump_into(&mut out, component, 0);
    out
}

fn dump_into(out: &mut String, component: &dyn Component, indent: usize) {
    let pad = "  ".repeat(indent);
    let object = component.react_object();
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "{}{}: {} {{",
        pad,
        object.instance_name(),
        object.class_name()
    );
    let _ = writeln!(
        out,
        "{}  propertyName: [{}]",
        pad,
        object.property_names().join(" ")
    );
    for member in &object.frame().members {
        let name = &member.identifier;
        let header = format!("{}  {}: {}", pad, name, member.declared_type);
        match &member.value {
            FrameValue::Frame(_) => match component.search_child(name) {
                Some(child) => dump_into(out, child.as_ref(), indent + 1),
                None => {
                    let _ = writeln!(out, "{}  <Error: No frame: {}>", pad, name);
                }
            },
            FrameValue::Init(_) => {
                let _ = writeln!(out, "{} <init>", header);
            }
            _ => match object.get(name) {
                Some(value) => {
                    let _ = writeln!(out, "{} {}", header, value.describe());
                }
                None => {
                    let _ = writeln!(out, "{} <undefined>", header);
                }
            },
        }
    }
    let _ = writeln!(out, "{}}}", pad);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Frame, Member, Scalar, ValueType};
    use crate::diagnostics::Diagnostics;

    fn tree() -> Rc<ReactiveObject> {
        let mut sub_frame = Frame::new("Box", "sub");
        sub_frame.members.push(Member::new(
            "b",
            ValueType::Int,
            FrameValue::Scalar(Scalar::Int(1)),
        ));
        let mut root_frame = Frame::new("Object", "root");
        root_frame.members.push(Member::new(
            "sub",
            ValueType::Frame("Box".into()),
            FrameValue::Frame(sub_frame.clone()),
        ));
        let diagnostics = Diagnostics::new();
        let root = ReactiveObject::new(&root_frame, "root", diagnostics.clone());
        let sub = ReactiveObject::new(&sub_frame, "root.sub", diagnostics);
        sub.define("b", Value::from(1i64));
        root.add_child(sub);
        root
    }

    #[test]
    fn test_unknown_class_without_fallback() {
        let registry = ComponentRegistry::new();
        let err = ComponentMapper::new(&registry).map(&tree()).err();
        assert_eq!(err, Some(CompileError::UnknownClass("Box".to_string())));
    }

    #[test]
    fn test_mapping_mirrors_tree() {
        let registry = ComponentRegistry::new().with_class("Box", allocate_object);
        let root = ComponentMapper::new(&registry).map(&tree()).unwrap();
        let sub = root.search_child("sub").unwrap();
        assert_eq!(sub.get("b"), Some(Value::from(1i64)));
        assert!(sub.set("b", Value::from(2i64)));
        assert_eq!(sub.react_object().get("b"), Some(Value::from(2i64)));
        assert!(root.search_child("other").is_none());
    }

    #[test]
    fn test_dump() {
        let registry = ComponentRegistry::empty().with_fallback(allocate_object);
        let root = ComponentMapper::new(&registry).map(&tree()).unwrap();
        let text = dump_component(root.as_ref());
        assert!(text.starts_with("root: Object {\n  propertyName: [className instanceName sub]\n"));
        assert!(text.contains("    b: Int 1\n"));
    }
}
