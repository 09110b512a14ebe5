//! Frame model for Amber
//!
//! A parsed source file is a tree of [`Frame`]s. Each frame holds an
//! ordered list of [`Member`]s whose values are literals, function
//! declarations or nested frames.
//!
//! `Display` on a frame prints canonical source that parses back to
//! an identical tree.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a member or literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    Url,
    /// Registered enum type name
    Enum(String),
    /// `Array` (leaf types inferred) or `T [..]` (leaves of type `T`)
    Array(Option<Box<ValueType>>),
    Dictionary(Option<Box<ValueType>>),
    /// Nested frame of the given class
    Frame(String),
    InitFunction,
    EventFunction,
    ListenerFunction,
    ProcedureFunction,
}

impl ValueType {
    /// Keyword that introduces a value of this type in source.
    pub fn keyword(&self) -> String {
        match self {
            ValueType::Bool => "Bool".to_string(),
            ValueType::Int => "Int".to_string(),
            ValueType::Float => "Float".to_string(),
            ValueType::String => "String".to_string(),
            ValueType::Url => "URL".to_string(),
            ValueType::Enum(name) | ValueType::Frame(name) => name.clone(),
            ValueType::Array(None) => "Array".to_string(),
            ValueType::Dictionary(None) => "Dictionary".to_string(),
            ValueType::Array(Some(leaf)) | ValueType::Dictionary(Some(leaf)) => leaf.keyword(),
            ValueType::InitFunction => FunctionKind::Init.keyword().to_string(),
            ValueType::EventFunction => FunctionKind::Event.keyword().to_string(),
            ValueType::ListenerFunction => FunctionKind::Listener.keyword().to_string(),
            ValueType::ProcedureFunction => FunctionKind::Procedure.keyword().to_string(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Array(Some(leaf)) => write!(f, "{}[]", leaf),
            ValueType::Dictionary(Some(leaf)) => write!(f, "{}{{}}", leaf),
            other => write!(f, "{}", other.keyword()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunctionKind {
    Init,
    Event,
    Listener,
    Procedure,
}

impl FunctionKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            FunctionKind::Init => "Init",
            FunctionKind::Event => "Event",
            FunctionKind::Listener => "Listner",
            FunctionKind::Procedure => "Func",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "Init" => Some(FunctionKind::Init),
            "Event" => Some(FunctionKind::Event),
            "Listner" | "Listener" => Some(FunctionKind::Listener),
            "Func" => Some(FunctionKind::Procedure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Url(String),
    Enum {
        type_name: String,
        member: String,
        value: i64,
    },
}

impl Scalar {
    pub fn value_type(&self) -> ValueType {
        match self {
            Scalar::Bool(_) => ValueType::Bool,
            Scalar::Int(_) => ValueType::Int,
            Scalar::Float(_) => ValueType::Float,
            Scalar::String(_) => ValueType::String,
            Scalar::Url(_) => ValueType::Url,
            Scalar::Enum { type_name, .. } => ValueType::Enum(type_name.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::String(s) | Scalar::Url(s) => write_quoted(f, s),
            Scalar::Enum { member, .. } => write!(f, "{}", member),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

/// Positional function parameter, optionally annotated `name: Type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Argument {
    pub name: String,
    pub annotation: Option<ValueType>,
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.annotation {
            Some(t) => write!(f, "{}: {}", self.name, t.keyword()),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Dotted reference such as `self.a` or `root.sub.b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathExpression {
    pub elements: Vec<String>,
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.elements.join("."))
    }
}

/// Listener parameter bound to a path: `name: path.expression`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathArgument {
    pub name: String,
    pub path: PathExpression,
}

impl fmt::Display for PathArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitFunction {
    /// Caller-supplied argument after the implicit `self`
    pub argument: Option<Argument>,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFunction {
    pub arguments: Vec<Argument>,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerFunction {
    pub arguments: Vec<PathArgument>,
    pub return_type: ValueType,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureFunction {
    pub arguments: Vec<Argument>,
    pub return_type: Option<ValueType>,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Value>),
    Dictionary(BTreeMap<String, Value>),
    Init(InitFunction),
    Event(EventFunction),
    Listener(ListenerFunction),
    Procedure(ProcedureFunction),
    Frame(Frame),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Scalar(s) => s.value_type(),
            Value::Array(_) => ValueType::Array(None),
            Value::Dictionary(_) => ValueType::Dictionary(None),
            Value::Init(_) => ValueType::InitFunction,
            Value::Event(_) => ValueType::EventFunction,
            Value::Listener(_) => ValueType::ListenerFunction,
            Value::Procedure(_) => ValueType::ProcedureFunction,
            Value::Frame(frame) => ValueType::Frame(frame.class_name.clone()),
        }
    }

    /// Parameter names of the script function, or `None` for
    /// non-function values. Every kind except procedures receives the
    /// owning object as `self`.
    pub fn script_parameters(&self) -> Option<Vec<String>> {
        let with_self = |rest: Vec<String>| {
            let mut params = vec!["self".to_string()];
            params.extend(rest);
            params
        };
        match self {
            Value::Init(func) => Some(with_self(
                func.argument.iter().map(|a| a.name.clone()).collect(),
            )),
            Value::Event(func) => Some(with_self(
                func.arguments.iter().map(|a| a.name.clone()).collect(),
            )),
            Value::Listener(func) => Some(with_self(
                func.arguments.iter().map(|a| a.name.clone()).collect(),
            )),
            Value::Procedure(func) => {
                Some(func.arguments.iter().map(|a| a.name.clone()).collect())
            }
            _ => None,
        }
    }

    pub fn script_body(&self) -> Option<&str> {
        match self {
            Value::Init(func) => Some(&func.script),
            Value::Event(func) => Some(&func.script),
            Value::Listener(func) => Some(&func.script),
            Value::Procedure(func) => Some(&func.script),
            _ => None,
        }
    }

    /// Anonymous function expression for the engine.
    pub fn to_script(&self) -> Option<String> {
        let params = self.script_parameters()?;
        let body = self.script_body()?;
        Some(format!("function({}) {{\n{}\n}}\n", params.join(", "), body))
    }

    fn fmt_literal(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_literal(f)?;
                }
                write!(f, "]")
            }
            Value::Dictionary(entries) => {
                write!(f, "{{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    item.fmt_literal(f)?;
                }
                write!(f, "}}")
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub identifier: String,
    pub declared_type: ValueType,
    pub value: Value,
    /// Source line (0-indexed)
    #[serde(skip)]
    pub line: usize,
}

impl Member {
    pub fn new(identifier: impl Into<String>, declared_type: ValueType, value: Value) -> Self {
        Member {
            identifier: identifier.into(),
            declared_type,
            value,
            line: 0,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        write!(f, "{}{}: ", pad, self.identifier)?;
        match &self.value {
            Value::Frame(frame) => return frame.fmt_body(f, indent),
            Value::Init(func) => {
                write!(f, "Init")?;
                if let Some(arg) = &func.argument {
                    write!(f, "({})", arg)?;
                }
                write!(f, " %{{{}%}}", func.script)?;
            }
            Value::Event(func) => {
                write!(f, "Event({}) %{{{}%}}", join(&func.arguments), func.script)?;
            }
            Value::Listener(func) => {
                write!(
                    f,
                    "{} Listner({}) %{{{}%}}",
                    func.return_type.keyword(),
                    join(&func.arguments),
                    func.script
                )?;
            }
            Value::Procedure(func) => {
                if let Some(ret) = &func.return_type {
                    write!(f, "{} ", ret.keyword())?;
                }
                write!(f, "Func({}) %{{{}%}}", join(&func.arguments), func.script)?;
            }
            literal => {
                write!(f, "{} ", self.declared_type.keyword())?;
                literal.fmt_literal(f)?;
            }
        }
        writeln!(f)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One declared object: `instance: Class { members }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub class_name: String,
    pub instance_name: String,
    pub members: Vec<Member>,
}

impl Frame {
    pub fn new(class_name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        Frame {
            class_name: class_name.into(),
            instance_name: instance_name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(&self, identifier: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.identifier == identifier)
    }

    /// Nested frames in declaration order.
    pub fn children(&self) -> impl Iterator<Item = &Frame> {
        self.members.iter().filter_map(|m| match &m.value {
            Value::Frame(frame) => Some(frame),
            _ => None,
        })
    }

    fn fmt_body(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{} {{", self.class_name)?;
        for member in &self.members {
            member.fmt_indented(f, indent + 1)?;
        }
        writeln!(f, "{}}}", "  ".repeat(indent))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.instance_name)?;
        self.fmt_body(f, 0)
    }
}
