//! Frame compiler
//!
//! Turns a parsed frame tree into live reactive objects. The passes run
//! in a fixed order:
//!
//! 1. build: one object per frame, literals converted to script values,
//!    function bodies evaluated into callables
//! 2. resolve: every listener path argument becomes an [`ObjectPointer`]
//! 3. link: observers registered on every pointed property
//! 4. seed: each listener runs once so its property has a value
//! 5. map: the object tree is wrapped into components
//!
//! Any error aborts the whole compile; no partial tree is returned.

use crate::ast::{Frame, Scalar, Value as FrameValue};
use crate::binding;
use crate::component::{Component, ComponentMapper, ComponentRegistry};
use crate::diagnostics::Diagnostics;
use crate::error::CompileError;
use crate::reactive::{ObjectPointer, ReactiveObject};
use amber_script::{ScriptEngine, Value};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

const TEMP_VARIABLE: &str = "_amber_temp_var";

/// Result of a full compile.
pub struct CompiledProgram {
    pub root: Rc<ReactiveObject>,
    pub component: Rc<dyn Component>,
    pub diagnostics: Diagnostics,
    pub engine: Rc<dyn ScriptEngine>,
}

pub struct FrameCompiler {
    engine: Rc<dyn ScriptEngine>,
    diagnostics: Diagnostics,
    temp_id: Cell<usize>,
}

impl FrameCompiler {
    pub fn new(engine: Rc<dyn ScriptEngine>) -> Self {
        FrameCompiler {
            engine,
            diagnostics: Diagnostics::new(),
            temp_id: Cell::new(0),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn engine(&self) -> &Rc<dyn ScriptEngine> {
        &self.engine
    }

    /// Passes 1 to 4.
    pub fn compile_object(&self, frame: &Frame) -> Result<Rc<ReactiveObject>, CompileError> {
        tracing::debug!("compiling frame {}: {}", frame.instance_name, frame.class_name);
        let root = self.build(frame, frame.instance_name.clone())?;

        let mut objects = HashMap::new();
        collect_paths(&root, &mut objects);
        self.resolve(&root, &objects)?;
        tracing::debug!("resolved listener paths over {} objects", objects.len());

        binding::link_tree(&root, &self.engine, &self.diagnostics);
        binding::seed_tree(&root, &self.engine, &self.diagnostics);
        tracing::debug!(
            "linked and seeded listeners ({} observer errors)",
            self.diagnostics.reported()
        );
        Ok(root)
    }

    /// All passes, then the root becomes a global of the engine under
    /// its instance name.
    pub fn compile(
        &self,
        frame: &Frame,
        registry: &ComponentRegistry,
    ) -> Result<CompiledProgram, CompileError> {
        let root = self.compile_object(frame)?;
        let component = ComponentMapper::new(registry).map(&root)?;
        self.engine.set_named_value(root.instance_name(), root.to_value());
        Ok(CompiledProgram {
            root,
            component,
            diagnostics: self.diagnostics.clone(),
            engine: self.engine.clone(),
        })
    }

    fn build(&self, frame: &Frame, path: String) -> Result<Rc<ReactiveObject>, CompileError> {
        let object = ReactiveObject::new(frame, path, self.diagnostics.clone());
        for member in &frame.members {
            let name = member.identifier.as_str();
            if !object.add_scripted_property_name(name) {
                return Err(CompileError::DuplicateMember {
                    object: object.path().to_string(),
                    name: name.to_string(),
                });
            }
            match &member.value {
                FrameValue::Frame(child_frame) => {
                    let child_path = format!("{}.{}", object.path(), child_frame.instance_name);
                    let child = self.build(child_frame, child_path)?;
                    object.add_child(child);
                }
                FrameValue::Init(_) => {
                    let callable = self.compile_function(&object, name, &member.value)?;
                    object.add_init_function(name, callable);
                }
                FrameValue::Listener(_) => {
                    let callable = self.compile_function(&object, name, &member.value)?;
                    object.set_listener_function(name, callable);
                }
                FrameValue::Event(_) | FrameValue::Procedure(_) => {
                    let callable = self.compile_function(&object, name, &member.value)?;
                    object.define(name, callable);
                }
                literal => object.define(name, to_script_value(literal)),
            }
        }
        Ok(object)
    }

    /// Evaluate a function member into an engine callable.
    fn compile_function(
        &self,
        object: &ReactiveObject,
        name: &str,
        value: &FrameValue,
    ) -> Result<Value, CompileError> {
        let function = value.to_script().ok_or_else(|| {
            CompileError::Internal(format!("{}.{} is not a function", object.path(), name))
        })?;
        let id = self.temp_id.get();
        self.temp_id.set(id + 1);
        let script = format!("{}{} = {}", TEMP_VARIABLE, id, function);

        self.engine.reset_error_count();
        let result = self.engine.evaluate_script(&script);
        let failed = self.engine.error_count() > 0;
        self.engine.reset_error_count();
        let script_error = |error| CompileError::Script {
            object: object.path().to_string(),
            member: name.to_string(),
            error,
        };
        let callable = result.map_err(script_error)?;
        if failed || !callable.is_callable() {
            return Err(CompileError::Internal(format!(
                "{}.{} did not evaluate to a function",
                object.path(),
                name
            )));
        }
        Ok(callable)
    }

    fn resolve(
        &self,
        object: &Rc<ReactiveObject>,
        objects: &HashMap<String, Rc<ReactiveObject>>,
    ) -> Result<(), CompileError> {
        for member in &object.frame().members {
            let FrameValue::Listener(listener) = &member.value else {
                continue;
            };
            let mut pointers = Vec::with_capacity(listener.arguments.len());
            for argument in &listener.arguments {
                let (path, property) = pointer_target(object.path(), &argument.path.elements)?;
                let target = objects
                    .get(&path)
                    .ok_or_else(|| CompileError::UnresolvedPath {
                        listener: format!("{}.{}", object.path(), member.identifier),
                        path: path.clone(),
                    })?;
                pointers.push(ObjectPointer::new(&argument.name, property, target));
            }
            object.set_listener_pointers(&member.identifier, pointers);
        }
        for child in object.children() {
            self.resolve(&child, objects)?;
        }
        Ok(())
    }
}

/// Object path and property name of a path expression evaluated inside
/// the object at `self_path`.
pub fn pointer_target(
    self_path: &str,
    elements: &[String],
) -> Result<(String, String), CompileError> {
    let Some((property, objects)) = elements.split_last().filter(|(_, rest)| !rest.is_empty())
    else {
        return Err(CompileError::InvalidPath(elements.join(".")));
    };
    let mut path = match objects[0].as_str() {
        "self" => self_path.to_string(),
        root => root.to_string(),
    };
    for element in &objects[1..] {
        path.push('.');
        path.push_str(element);
    }
    Ok((path, property.clone()))
}

fn collect_paths(object: &Rc<ReactiveObject>, objects: &mut HashMap<String, Rc<ReactiveObject>>) {
    objects.insert(object.path().to_string(), object.clone());
    for child in object.children() {
        collect_paths(&child, objects);
    }
}

/// Convert a literal into an engine value. Enum members become their
/// integer value.
pub fn to_script_value(value: &FrameValue) -> Value {
    match value {
        FrameValue::Scalar(scalar) => match scalar {
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => Value::Number(*f),
            Scalar::String(s) | Scalar::Url(s) => Value::from(s.as_str()),
            Scalar::Enum { value, .. } => Value::from(*value),
        },
        FrameValue::Array(items) => Value::array(items.iter().map(to_script_value).collect()),
        FrameValue::Dictionary(entries) => Value::object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_script_value(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
        _ => Value::Undefined,
    }
}
