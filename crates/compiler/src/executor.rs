//! Executor
//!
//! Runs a compiled component tree once: every Init function first,
//! children before their parent, then one more seeding pass over all
//! listeners. After `execute` returns, the object graph is live and any
//! further `set` propagates through the installed observers.

use crate::binding;
use crate::component::Component;
use crate::diagnostics::Diagnostics;
use crate::error::ExecuteError;
use amber_script::{ScriptEngine, Value};
use std::rc::Rc;

pub struct ComponentExecutor {
    engine: Rc<dyn ScriptEngine>,
    diagnostics: Diagnostics,
}

impl ComponentExecutor {
    pub fn new(engine: Rc<dyn ScriptEngine>, diagnostics: Diagnostics) -> Self {
        ComponentExecutor {
            engine,
            diagnostics,
        }
    }

    /// `argument`, when given, is passed to every Init function after
    /// `self`.
    pub fn execute(
        &self,
        root: &Rc<dyn Component>,
        argument: Option<&Value>,
    ) -> Result<(), ExecuteError> {
        tracing::info!("executing init functions of {}", root.react_object().path());
        self.run_init(root, argument)?;

        tracing::info!("seeding listeners of {}", root.react_object().path());
        binding::seed_tree(root.react_object(), &self.engine, &self.diagnostics);
        Ok(())
    }

    fn run_init(
        &self,
        component: &Rc<dyn Component>,
        argument: Option<&Value>,
    ) -> Result<(), ExecuteError> {
        for child in component.children() {
            self.run_init(&child, argument)?;
        }

        let object = component.react_object();
        for (name, callable) in object.init_functions() {
            let mut args = vec![object.to_value()];
            args.extend(argument.cloned());

            let result = self.engine.call_function(&callable, &args);
            self.engine.reset_error_count();
            let value = result.map_err(|error| ExecuteError::Init {
                object: object.path().to_string(),
                function: name.clone(),
                error,
            })?;
            if value.is_undefined() {
                continue;
            }
            if let Err(err) = object.set(&name, value) {
                self.diagnostics.report(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompiledProgram, FrameCompiler};
    use crate::component::ComponentRegistry;
    use crate::parser::Parser;
    use amber_script::Interpreter;

    fn compile(source: &str) -> CompiledProgram {
        let frame = Parser::new(source).unwrap().parse().unwrap();
        FrameCompiler::new(Rc::new(Interpreter::new()))
            .compile(&frame, &ComponentRegistry::default())
            .unwrap()
    }

    fn executor(program: &CompiledProgram) -> ComponentExecutor {
        ComponentExecutor::new(program.engine.clone(), program.diagnostics.clone())
    }

    #[test]
    fn test_init_result_is_stored() {
        let program = compile("root: Object { start: Init %{ return 3 ; %} }");
        executor(&program).execute(&program.component, None).unwrap();
        assert_eq!(program.root.get("start"), Some(Value::from(3i64)));
    }

    #[test]
    fn test_children_initialize_first() {
        let program = compile(
            "root: Object {
               order: String \"\"
               go: Init %{ root.order = root.order + \"p\" ; %}
               sub: Object { go: Init %{ root.order = root.order + \"c\" ; %} }
             }",
        );
        executor(&program).execute(&program.component, None).unwrap();
        assert_eq!(program.root.get("order"), Some(Value::from("cp")));
    }

    #[test]
    fn test_init_argument() {
        let program = compile("root: Object { v: Int 0 go: Init(arg) %{ self.v = arg * 2 ; %} }");
        executor(&program)
            .execute(&program.component, Some(&Value::from(21i64)))
            .unwrap();
        assert_eq!(program.root.get("v"), Some(Value::from(42i64)));
    }

    #[test]
    fn test_failing_init_aborts() {
        let program = compile("root: Object { go: Init %{ return missing + 1 ; %} }");
        let err = executor(&program)
            .execute(&program.component, None)
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Init { ref function, .. } if function == "go"));
        assert_eq!(program.engine.error_count(), 0);
    }
}
