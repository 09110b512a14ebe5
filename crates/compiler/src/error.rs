//! Error types for parsing, compiling and running Amber programs.

use amber_script::ScriptError;
use std::fmt;

/// Malformed source. Always aborts the parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Line number (0-indexed, printed 1-indexed)
    pub line: usize,
    /// Text of the token the parser stopped at
    pub near: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, near: Option<String>) -> Self {
        ParseError {
            message: message.into(),
            line,
            near,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(near) = &self.near {
            write!(f, " near token {}", near)?;
        }
        write!(f, " at line {}", self.line + 1)
    }
}

impl std::error::Error for ParseError {}

/// Failure while turning a frame tree into reactive objects.
/// Aborts the whole compile.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    DuplicateMember { object: String, name: String },
    /// Path expression with fewer than two elements
    InvalidPath(String),
    UnresolvedPath { listener: String, path: String },
    Script {
        object: String,
        member: String,
        error: ScriptError,
    },
    UnknownClass(String),
    Internal(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::DuplicateMember { object, name } => {
                write!(f, "Multi defined property names: {} in {}", name, object)
            }
            CompileError::InvalidPath(path) => write!(f, "Too short path expression: {}", path),
            CompileError::UnresolvedPath { listener, path } => {
                write!(f, "No object at path {} (listener {})", path, listener)
            }
            CompileError::Script {
                object,
                member,
                error,
            } => write!(f, "Failed to compile {}.{}: {}", object, member, error),
            CompileError::UnknownClass(name) => write!(f, "Unknown class name: {}", name),
            CompileError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CompileError {}

/// Failure of a single observer invocation. Reported, never propagated.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverError {
    MissingProperty {
        object: String,
        property: String,
        listener: String,
    },
    MissingFunction { object: String, listener: String },
    Script {
        object: String,
        listener: String,
        error: ScriptError,
    },
    NoResult { object: String, listener: String },
    /// Write to a property whose observers are still running
    Cycle { object: String, property: String },
    /// Owner or pointed object has been dropped
    Released { listener: String },
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverError::MissingProperty {
                object,
                property,
                listener,
            } => write!(
                f,
                "Property {}.{} is not defined for listener {}",
                object, property, listener
            ),
            ObserverError::MissingFunction { object, listener } => {
                write!(f, "No listener function {} in {}", listener, object)
            }
            ObserverError::Script {
                object,
                listener,
                error,
            } => write!(f, "Listener {}.{} failed: {}", object, listener, error),
            ObserverError::NoResult { object, listener } => {
                write!(f, "Listener {}.{} returned no value", object, listener)
            }
            ObserverError::Cycle { object, property } => write!(
                f,
                "Cyclic update of {}.{} while its observers are running",
                object, property
            ),
            ObserverError::Released { listener } => {
                write!(f, "Object of listener {} has been released", listener)
            }
        }
    }
}

impl std::error::Error for ObserverError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteError {
    Init {
        object: String,
        function: String,
        error: ScriptError,
    },
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::Init {
                object,
                function,
                error,
            } => write!(f, "Init function {}.{} failed: {}", object, function, error),
        }
    }
}

impl std::error::Error for ExecuteError {}

/// Errors of the external data reader.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    NotFound(String),
    Parse(ParseError),
    Unsupported { property: String, kind: String },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::NotFound(id) => write!(f, "No data named {}", id),
            DataError::Parse(e) => write!(f, "{}", e),
            DataError::Unsupported { property, kind } => {
                write!(f, "Unexpected value of property {}: {}", property, kind)
            }
        }
    }
}

impl std::error::Error for DataError {}

impl From<ParseError> for DataError {
    fn from(e: ParseError) -> Self {
        DataError::Parse(e)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Toml(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Toml(e)
    }
}

/// Any error of the compile pipeline.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Compile(CompileError),
    Execute(ExecuteError),
    Data(DataError),
    Config(ConfigError),
    Script(ScriptError),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "Parse error: {}", e),
            Error::Compile(e) => write!(f, "Compile error: {}", e),
            Error::Execute(e) => write!(f, "Execute error: {}", e),
            Error::Data(e) => write!(f, "Data error: {}", e),
            Error::Config(e) => write!(f, "{}", e),
            Error::Script(e) => write!(f, "{}", e),
            Error::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<ExecuteError> for Error {
    fn from(e: ExecuteError) -> Self {
        Error::Execute(e)
    }
}

impl From<DataError> for Error {
    fn from(e: DataError) -> Self {
        Error::Data(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ScriptError> for Error {
    fn from(e: ScriptError) -> Self {
        Error::Script(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Type is required but it is not given", 2, Some("{".into()));
        assert_eq!(
            err.to_string(),
            "Type is required but it is not given near token { at line 3"
        );
    }

    #[test]
    fn test_error_conversion() {
        fn fails() -> Result<(), Error> {
            Err(CompileError::UnknownClass("Button".to_string()))?
        }
        assert!(matches!(fails(), Err(Error::Compile(CompileError::UnknownClass(_)))));
    }
}
