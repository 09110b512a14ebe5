//! Script engine for Amber function bodies.
//!
//! A small tree-walking interpreter for the JavaScript subset that
//! Amber members are written in. The compiler only talks to it through
//! [`ScriptEngine`], so another engine can be slotted in.

pub mod ast;
pub mod builtin;
pub mod console;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use console::{BufferConsole, Console, StdoutConsole};
pub use engine::ScriptEngine;
pub use error::{ScriptError, ScriptResult};
pub use interpreter::{DEFAULT_MAX_DEPTH, Interpreter, Scope};
pub use value::{HostObject, Value};
