//! Runtime values.
//!
//! Arrays and objects are shared by reference (`Rc<RefCell<..>>`), so
//! a script that mutates an array it received from the host mutates
//! the host's copy too. Host objects are reached through the
//! [`HostObject`] trait and never borrowed across a call back into the
//! interpreter.

use crate::ast::FunctionDecl;
use crate::error::ScriptResult;
use crate::interpreter::Scope;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Object exposed to scripts by the embedding program.
///
/// Member reads and writes on a `Value::Host` are routed here. `set`
/// may run arbitrary host code (including calls back into the engine).
pub trait HostObject {
    /// Name used by `typeof`-style dumps, e.g. the class name.
    fn type_name(&self) -> String;

    /// Read a member. Absent members read as `Value::Undefined`.
    fn get(&self, name: &str) -> Value;

    /// Write a member.
    fn set(&self, name: &str, value: Value) -> ScriptResult<()>;
}

/// A script function together with the scope it closes over.
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub env: Rc<Scope>,
}

type NativeFn = dyn Fn(&[Value]) -> ScriptResult<Value>;

/// A function implemented in Rust.
pub struct NativeFunction {
    pub name: String,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> ScriptResult<Value> {
        (self.func)(args)
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
    Host(Rc<dyn HostObject>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(entries: BTreeMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    pub fn native<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + 'static,
    {
        Value::Native(Rc::new(NativeFunction {
            name: name.to_string(),
            func: Box::new(func),
        }))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Host(_) => "object",
        }
    }

    /// Reference types compare by identity, primitives by value.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                if matches!(self, Value::Undefined | Value::Null)
                    || matches!(other, Value::Undefined | Value::Null)
                {
                    return false;
                }
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }

    /// Source-like rendering used by dumps: strings are quoted and
    /// containers show their contents.
    pub fn describe(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s),
            Value::Array(items) => {
                let items: Vec<String> = items.borrow().iter().map(|v| v.describe()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(entries) => {
                let entries: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.describe()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// Format a number the way scripts print it: integral values have no
/// fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let items: Vec<String> = items.borrow().iter().map(|v| v.to_string()).collect();
                write!(f, "{}", items.join(","))
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(closure) => write!(
                f,
                "function {}({})",
                closure.decl.name.as_deref().unwrap_or(""),
                closure.decl.params.join(", ")
            ),
            Value::Native(native) => write!(f, "function {}() {{ [native code] }}", native.name),
            Value::Host(host) => write!(f, "[object {}]", host.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::from("5").loose_equals(&Value::from(5i64)));
        assert!(Value::Bool(true).loose_equals(&Value::from(1i64)));
        assert!(!Value::Null.loose_equals(&Value::Bool(false)));
    }

    #[test]
    fn test_arrays_compare_by_identity() {
        let a = Value::array(vec![Value::from(1i64)]);
        let b = Value::array(vec![Value::from(1i64)]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_describe_nested() {
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), Value::array(vec![Value::from("s"), Value::from(1.5)]));
        assert_eq!(Value::object(map).describe(), "{k: [\"s\", 1.5]}");
    }
}
