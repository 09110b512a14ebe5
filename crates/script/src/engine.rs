//! Capability interface used by the Amber compiler.

use crate::error::ScriptResult;
use crate::interpreter::Interpreter;
use crate::value::Value;

/// What the compiler needs from a script engine.
///
/// All methods take `&self` so that host callbacks fired during a call
/// can re-enter the engine. Failed evaluations and calls bump the
/// error count until `reset_error_count` is called.
pub trait ScriptEngine {
    fn evaluate_script(&self, script: &str) -> ScriptResult<Value>;

    fn get_named_value(&self, name: &str) -> Option<Value>;

    fn set_named_value(&self, name: &str, value: Value);

    fn call_function(&self, callable: &Value, args: &[Value]) -> ScriptResult<Value>;

    fn error_count(&self) -> usize;

    fn reset_error_count(&self);
}

impl ScriptEngine for Interpreter {
    fn evaluate_script(&self, script: &str) -> ScriptResult<Value> {
        let result = self.run(script);
        if let Err(err) = &result {
            tracing::debug!("script evaluation failed: {}", err);
            self.record_error();
        }
        result
    }

    fn get_named_value(&self, name: &str) -> Option<Value> {
        self.globals().lookup(name)
    }

    fn set_named_value(&self, name: &str, value: Value) {
        self.globals().declare(name, value);
    }

    fn call_function(&self, callable: &Value, args: &[Value]) -> ScriptResult<Value> {
        let result = self.call(callable, args);
        if let Err(err) = &result {
            tracing::debug!("script call failed: {}", err);
            self.record_error();
        }
        result
    }

    fn error_count(&self) -> usize {
        self.errors()
    }

    fn reset_error_count(&self) {
        self.clear_errors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptError;
    use std::rc::Rc;

    #[test]
    fn test_error_count() {
        let engine: Rc<dyn ScriptEngine> = Rc::new(Interpreter::new());
        assert!(engine.evaluate_script("1 +").is_err());
        assert!(engine.call_function(&Value::from(1i64), &[]).is_err());
        assert_eq!(engine.error_count(), 2);
        engine.reset_error_count();
        assert_eq!(engine.error_count(), 0);
    }

    #[test]
    fn test_named_values_and_calls() {
        let engine = Interpreter::new();
        engine.set_named_value("base", Value::from(10i64));
        let f = engine
            .evaluate_script("tmp = function(a, b) {\n return base + a + b ;\n}\n")
            .unwrap();
        assert!(f.is_callable());
        assert_eq!(engine.get_named_value("tmp"), Some(f.clone()));
        let sum = engine
            .call_function(&f, &[Value::from(2i64), Value::from(3i64)])
            .unwrap();
        assert_eq!(sum, Value::from(15i64));
    }

    #[test]
    fn test_native_errors_propagate() {
        let engine = Interpreter::new();
        engine.set_named_value(
            "fail",
            Value::native("fail", |_| Err(ScriptError::Host("denied".to_string()))),
        );
        let err = engine.evaluate_script("fail()").unwrap_err();
        assert_eq!(err.to_string(), "HostError: denied");
    }
}
