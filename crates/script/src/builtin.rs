//! Global objects available to every script.

use crate::console::Console;
use crate::error::ScriptResult;
use crate::interpreter::Scope;
use crate::value::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

pub fn install(globals: &Scope, console: Rc<dyn Console>) {
    let mut console_object = BTreeMap::new();
    console_object.insert(
        "log".to_string(),
        Value::native("log", move |args| {
            let parts: Vec<String> = args.iter().map(|v| v.to_string()).collect();
            console.log(&parts.join(" "));
            Ok(Value::Undefined)
        }),
    );
    globals.declare("console", Value::object(console_object));
    globals.declare("Math", math_object());
    globals.declare(
        "String",
        Value::native("String", |args| {
            Ok(Value::String(
                args.first().map(|v| v.to_string()).unwrap_or_default(),
            ))
        }),
    );
    globals.declare(
        "Number",
        Value::native("Number", |args| {
            Ok(Value::Number(args.first().map_or(0.0, |v| v.to_number())))
        }),
    );
    globals.declare("NaN", Value::Number(f64::NAN));
    globals.declare("Infinity", Value::Number(f64::INFINITY));
}

fn unary(name: &str, f: fn(f64) -> f64) -> (String, Value) {
    let value = Value::native(name, move |args: &[Value]| -> ScriptResult<Value> {
        let x = args.first().map_or(f64::NAN, |v| v.to_number());
        Ok(Value::Number(f(x)))
    });
    (name.to_string(), value)
}

/// NaN in any argument makes the result NaN.
fn fold(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    args.iter().map(|v| v.to_number()).fold(init, |acc, x| {
        if acc.is_nan() || x.is_nan() {
            f64::NAN
        } else {
            f(acc, x)
        }
    })
}

fn math_object() -> Value {
    let mut math: BTreeMap<String, Value> = [
        unary("abs", f64::abs),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        // rounds half up, like scripts expect
        unary("round", |x| (x + 0.5).floor()),
        unary("sqrt", f64::sqrt),
    ]
    .into_iter()
    .collect();

    math.insert(
        "min".to_string(),
        Value::native("min", |args| Ok(Value::Number(fold(args, f64::INFINITY, f64::min)))),
    );
    math.insert(
        "max".to_string(),
        Value::native("max", |args| Ok(Value::Number(fold(args, f64::NEG_INFINITY, f64::max)))),
    );
    math.insert(
        "pow".to_string(),
        Value::native("pow", |args| {
            let base = args.first().map_or(f64::NAN, |v| v.to_number());
            let exp = args.get(1).map_or(f64::NAN, |v| v.to_number());
            Ok(Value::Number(base.powf(exp)))
        }),
    );
    math.insert("PI".to_string(), Value::Number(std::f64::consts::PI));
    Value::object(math)
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;
    use crate::value::Value;

    fn run(source: &str) -> Value {
        Interpreter::new().run(source).unwrap()
    }

    #[test]
    fn test_math() {
        assert_eq!(run("Math.max(1, 7, 3)"), Value::from(7i64));
        assert_eq!(run("Math.min()"), Value::Number(f64::INFINITY));
        assert_eq!(run("Math.round(2.5)"), Value::from(3i64));
        assert_eq!(run("Math.pow(2, 10)"), Value::from(1024i64));
        assert_eq!(run("Math.abs(-4)"), Value::from(4i64));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(run("String(12) + '!'"), Value::from("12!"));
        assert_eq!(run("Number(' 42 ') + 1"), Value::from(43i64));
        assert!(run("Number('x')").to_number().is_nan());
    }
}
