//! Amber Compiler Library
//!
//! Compiles Amber frame declarations into live reactive objects:
//!
//! ```text
//! source -> Parser -> Frame -> FrameCompiler -> ReactiveObject tree
//!        -> ComponentMapper -> Component tree -> ComponentExecutor
//! ```
//!
//! Function bodies are evaluated by a [`ScriptEngine`] from the
//! `amber-script` crate. After execution, writing a property that a
//! listener points at re-runs that listener before the write returns.
//!
//! ```rust,ignore
//! use amberc::{CompilerConfig, run_source};
//!
//! let config = CompilerConfig::new();
//! let program = run_source(source, &config, config.create_engine(), None)?;
//! program.engine.evaluate_script("root.a = 5")?;
//! ```

pub mod ast;
pub mod binding;
pub mod compiler;
pub mod component;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod enums;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod reactive;
pub mod thread;

pub use amber_script::{ScriptEngine, Value as ScriptValue};
pub use ast::{Frame, Member, Value};
pub use compiler::{CompiledProgram, FrameCompiler};
pub use component::{Component, ComponentMapper, ComponentRegistry, dump_component};
pub use config::CompilerConfig;
pub use data::{DataReader, FileResourceLoader, MemoryResourceLoader, ResourceLoader};
pub use diagnostics::Diagnostics;
pub use enums::{EnumTable, EnumType};
pub use error::{
    CompileError, ConfigError, DataError, Error, ExecuteError, ObserverError, ParseError,
};
pub use executor::ComponentExecutor;
pub use parser::{Parser, parse_frame};
pub use reactive::{ObjectPointer, ReactiveObject};
pub use thread::ScriptThread;

use std::rc::Rc;

/// Parse with the enum types registered in `config`.
pub fn parse_source(source: &str, config: &CompilerConfig) -> Result<Frame, ParseError> {
    parse_frame(source, &config.enum_table())
}

/// Parse and compile. Defines `readData` first when a resource
/// directory is configured.
pub fn compile_source(
    source: &str,
    config: &CompilerConfig,
    engine: Rc<dyn ScriptEngine>,
) -> Result<CompiledProgram, Error> {
    let frame = parse_source(source, config)?;

    if let Some(dir) = &config.resource_dir {
        let loader = Rc::new(FileResourceLoader::new(dir));
        let reader = DataReader::new(loader, config.enum_table());
        data::install_library(engine.as_ref(), Rc::new(reader));
    }

    let compiler = FrameCompiler::new(engine);
    Ok(compiler.compile(&frame, &config.component_registry())?)
}

/// Parse, compile and execute.
pub fn run_source(
    source: &str,
    config: &CompilerConfig,
    engine: Rc<dyn ScriptEngine>,
    argument: Option<&ScriptValue>,
) -> Result<CompiledProgram, Error> {
    let program = compile_source(source, config, engine)?;
    let executor = ComponentExecutor::new(program.engine.clone(), program.diagnostics.clone());
    executor.execute(&program.component, argument)?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_source_uses_enums() {
        let config = CompilerConfig::new().with_enum("Align", [("left", 0), ("right", 1)]);
        let frame = parse_source("root: Object { a: Align right }", &config).unwrap();
        assert_eq!(frame.members[0].declared_type.to_string(), "Align");
        assert!(parse_source("root: Object { a: Align right }", &CompilerConfig::new()).is_err());
    }

    #[test]
    fn test_unknown_class_policy() {
        let source = "root: Object { b: Button { } }";
        let config = CompilerConfig::new();
        let err = compile_source(source, &config, config.create_engine()).err();
        assert!(matches!(
            err,
            Some(Error::Compile(CompileError::UnknownClass(ref name))) if name == "Button"
        ));

        let config = config.with_unknown_classes(true);
        let program = compile_source(source, &config, config.create_engine()).unwrap();
        assert_eq!(program.component.children().len(), 1);
    }

    #[test]
    fn test_read_data_with_resource_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("limits.amb"), "limits: Object { max: Int 9 }").unwrap();
        let config = CompilerConfig::new().with_resource_dir(dir.path());
        let program = run_source(
            "root: Object { m: Int 0 go: Init %{ self.m = readData(\"limits\").max ; %} }",
            &config,
            config.create_engine(),
            None,
        )
        .unwrap();
        assert_eq!(program.root.get("m"), Some(ScriptValue::from(9i64)));
    }
}
