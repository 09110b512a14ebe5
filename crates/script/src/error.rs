//! Script error types.

use std::fmt;

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors raised while parsing or running a script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Malformed script text.
    Syntax { message: String, line: usize },
    /// Read of an undeclared variable.
    Reference(String),
    /// Operation applied to a value of the wrong kind.
    Type(String),
    /// Call depth exceeded.
    Range(String),
    /// Value thrown by a `throw` statement.
    Thrown(String),
    /// Failure reported by a host object.
    Host(String),
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        ScriptError::Syntax {
            message: message.into(),
            line,
        }
    }

    pub fn reference(message: impl Into<String>) -> Self {
        ScriptError::Reference(message.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        ScriptError::Type(message.into())
    }

    /// Error name as a script would see it.
    pub fn name(&self) -> &'static str {
        match self {
            ScriptError::Syntax { .. } => "SyntaxError",
            ScriptError::Reference(_) => "ReferenceError",
            ScriptError::Type(_) => "TypeError",
            ScriptError::Range(_) => "RangeError",
            ScriptError::Thrown(_) => "Error",
            ScriptError::Host(_) => "HostError",
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Syntax { message, line } => {
                write!(f, "SyntaxError: {} at line {}", message, line + 1)
            }
            ScriptError::Reference(msg)
            | ScriptError::Type(msg)
            | ScriptError::Range(msg)
            | ScriptError::Thrown(msg)
            | ScriptError::Host(msg) => write!(f, "{}: {}", self.name(), msg),
        }
    }
}

impl std::error::Error for ScriptError {}
