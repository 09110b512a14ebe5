//! Tree-walking evaluator.
//!
//! Every method takes `&self`: observers fired by a host `set` may
//! call straight back into the interpreter while an outer script is
//! still running. Scope tables are `RefCell`s whose borrows never span
//! an evaluation step.

use crate::ast::{BinaryOp, Expr, FunctionDecl, LogicalOp, Stmt, Target, UnaryOp};
use crate::builtin;
use crate::console::{Console, StdoutConsole};
use crate::error::{ScriptError, ScriptResult};
use crate::parser::parse_program;
use crate::value::{Closure, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Default limit on nested function calls.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// How far past its end an index write may grow an array.
pub const MAX_ARRAY_GROWTH: usize = 1 << 16;

/// Variable table with a link to its enclosing scope.
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn global() -> Rc<Self> {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub fn declare(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Assign to an existing binding. Returns false if none exists.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        {
            let mut vars = self.vars.borrow_mut();
            if let Some(slot) = vars.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }
}

/// How a statement finished.
enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    globals: Rc<Scope>,
    depth: Cell<usize>,
    max_depth: usize,
    errors: Cell<usize>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_console(Rc::new(StdoutConsole))
    }

    pub fn with_console(console: Rc<dyn Console>) -> Self {
        let globals = Scope::global();
        builtin::install(&globals, console);
        Interpreter {
            globals,
            depth: Cell::new(0),
            max_depth: DEFAULT_MAX_DEPTH,
            errors: Cell::new(0),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn globals(&self) -> &Rc<Scope> {
        &self.globals
    }

    pub(crate) fn record_error(&self) {
        self.errors.set(self.errors.get() + 1);
    }

    pub(crate) fn errors(&self) -> usize {
        self.errors.get()
    }

    pub(crate) fn clear_errors(&self) {
        self.errors.set(0);
    }

    /// Run a program and return the value of its last expression
    /// statement.
    pub fn run(&self, source: &str) -> ScriptResult<Value> {
        let program = parse_program(source)?;
        self.hoist(&program, &self.globals);
        let mut last = Value::Undefined;
        for stmt in &program {
            if let Stmt::Expression(expr) = stmt {
                last = self.eval(expr, &self.globals)?;
                continue;
            }
            match self.exec(stmt, &self.globals)? {
                Completion::Return(value) => return Ok(value),
                Completion::Normal | Completion::Break | Completion::Continue => {}
            }
        }
        Ok(last)
    }

    pub fn call(&self, callee: &Value, args: &[Value]) -> ScriptResult<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Native(native) => native.call(args),
            other => Err(ScriptError::type_error(format!(
                "{} is not a function",
                other.describe()
            ))),
        }
    }

    fn call_closure(&self, closure: &Closure, args: &[Value]) -> ScriptResult<Value> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return Err(ScriptError::Range(
                "Maximum call stack size exceeded".to_string(),
            ));
        }
        self.depth.set(depth + 1);

        let scope = Scope::child(&closure.env);
        for (i, param) in closure.decl.params.iter().enumerate() {
            scope.declare(param, args.get(i).cloned().unwrap_or_default());
        }
        let result = self.exec_block(&closure.decl.body, &scope);
        self.depth.set(depth);

        match result? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    fn hoist(&self, body: &[Stmt], scope: &Rc<Scope>) {
        for stmt in body {
            if let Stmt::Function(decl) = stmt {
                let name = decl.name.clone().unwrap_or_default();
                scope.declare(&name, self.make_closure(decl, scope));
            }
        }
    }

    fn make_closure(&self, decl: &Rc<FunctionDecl>, scope: &Rc<Scope>) -> Value {
        Value::Function(Rc::new(Closure {
            decl: decl.clone(),
            env: scope.clone(),
        }))
    }

    fn exec_block(&self, body: &[Stmt], scope: &Rc<Scope>) -> ScriptResult<Completion> {
        self.hoist(body, scope);
        for stmt in body {
            match self.exec(stmt, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec(&self, stmt: &Stmt, scope: &Rc<Scope>) -> ScriptResult<Completion> {
        match stmt {
            Stmt::Expression(expr) => {
                self.eval(expr, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::Let(declarations) => {
                for (name, init) in declarations {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };
                    scope.declare(name, value);
                }
                Ok(Completion::Normal)
            }
            // declared by hoisting
            Stmt::Function(_) => Ok(Completion::Normal),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.is_truthy() {
                    match self.exec(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = Scope::child(scope);
                if let Some(init) = init {
                    self.exec(init, &scope)?;
                }
                loop {
                    if let Some(test) = test
                        && !self.eval(test, &scope)?.is_truthy()
                    {
                        break;
                    }
                    match self.exec(body, &scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &scope)?;
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Block(body) => {
                let scope = Scope::child(scope);
                self.exec_block(body, &scope)
            }
            Stmt::Break => Ok(Completion::Break),
            Stmt::Continue => Ok(Completion::Continue),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                Err(ScriptError::Thrown(value.to_string()))
            }
            Stmt::Empty => Ok(Completion::Normal),
        }
    }

    fn eval(&self, expr: &Expr, scope: &Rc<Scope>) -> ScriptResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Identifier(name) => scope
                .lookup(name)
                .ok_or_else(|| ScriptError::reference(format!("{} is not defined", name))),
            Expr::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval(element, scope)?);
                }
                Ok(Value::array(items))
            }
            Expr::Object(properties) => {
                let mut entries = std::collections::BTreeMap::new();
                for (key, value) in properties {
                    entries.insert(key.clone(), self.eval(value, scope)?);
                }
                Ok(Value::object(entries))
            }
            Expr::Function(decl) => Ok(self.make_closure(decl, scope)),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right, scope),
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op {
                    None => self.eval(value, scope)?,
                    Some(op) => {
                        let current = self.read_target(target, scope)?;
                        let rhs = self.eval(value, scope)?;
                        binary(*op, &current, &rhs)?
                    }
                };
                self.write_target(target, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = self.read_target(target, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_target(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                get_member(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;
                get_index(&object, &index)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, scope),
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, scope: &Rc<Scope>) -> ScriptResult<Value> {
        if op == UnaryOp::TypeOf {
            if let Expr::Identifier(name) = operand
                && scope.lookup(name).is_none()
            {
                return Ok(Value::from("undefined"));
            }
            return Ok(Value::from(self.eval(operand, scope)?.type_of()));
        }
        let value = self.eval(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.is_truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::from(value.type_of()),
        })
    }

    fn eval_call(&self, callee: &Expr, args: &[Expr], scope: &Rc<Scope>) -> ScriptResult<Value> {
        // Array methods are resolved on the receiver.
        if let Expr::Member { object, property } = callee {
            let receiver = self.eval(object, scope)?;
            let args = self.eval_args(args, scope)?;
            if let Value::Array(items) = &receiver {
                match property.as_str() {
                    "push" => {
                        let mut items = items.borrow_mut();
                        items.extend(args);
                        return Ok(Value::Number(items.len() as f64));
                    }
                    "pop" => return Ok(items.borrow_mut().pop().unwrap_or_default()),
                    _ => {}
                }
            }
            let function = get_member(&receiver, property)?;
            return self.call(&function, &args);
        }
        let function = self.eval(callee, scope)?;
        let args = self.eval_args(args, scope)?;
        self.call(&function, &args)
    }

    fn eval_args(&self, args: &[Expr], scope: &Rc<Scope>) -> ScriptResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, scope)).collect()
    }

    fn read_target(&self, target: &Target, scope: &Rc<Scope>) -> ScriptResult<Value> {
        match target {
            Target::Variable(name) => scope
                .lookup(name)
                .ok_or_else(|| ScriptError::reference(format!("{} is not defined", name))),
            Target::Member { object, property } => {
                let object = self.eval(object, scope)?;
                get_member(&object, property)
            }
            Target::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;
                get_index(&object, &index)
            }
        }
    }

    fn write_target(&self, target: &Target, value: Value, scope: &Rc<Scope>) -> ScriptResult<()> {
        match target {
            Target::Variable(name) => {
                // Undeclared assignment creates a global.
                if !scope.assign(name, value.clone()) {
                    self.globals.declare(name, value);
                }
                Ok(())
            }
            Target::Member { object, property } => {
                let object = self.eval(object, scope)?;
                set_member(&object, property, value)
            }
            Target::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;
                if let (Value::Array(items), Value::Number(n)) = (&object, &index) {
                    if *n < 0.0 || n.fract() != 0.0 {
                        return Err(ScriptError::Range(format!("Invalid array index {}", n)));
                    }
                    let mut items = items.borrow_mut();
                    let limit = items.len().saturating_add(MAX_ARRAY_GROWTH);
                    if *n >= limit as f64 {
                        return Err(ScriptError::Range(format!("Invalid array index {}", n)));
                    }
                    let i = *n as usize;
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                    return Ok(());
                }
                set_member(&object, &index.to_string(), value)
            }
        }
    }
}

fn get_member(object: &Value, property: &str) -> ScriptResult<Value> {
    match object {
        Value::Undefined | Value::Null => Err(ScriptError::type_error(format!(
            "Cannot read property '{}' of {}",
            property, object
        ))),
        Value::String(s) if property == "length" => Ok(Value::Number(s.chars().count() as f64)),
        Value::Array(items) if property == "length" => {
            Ok(Value::Number(items.borrow().len() as f64))
        }
        Value::Object(entries) => Ok(entries.borrow().get(property).cloned().unwrap_or_default()),
        // No RefCell of ours is borrowed while the host runs.
        Value::Host(host) => Ok(host.get(property)),
        _ => Ok(Value::Undefined),
    }
}

fn get_index(object: &Value, index: &Value) -> ScriptResult<Value> {
    match (object, index) {
        (Value::Array(items), Value::Number(n)) => {
            if *n < 0.0 || n.fract() != 0.0 {
                return Ok(Value::Undefined);
            }
            Ok(items.borrow().get(*n as usize).cloned().unwrap_or_default())
        }
        (Value::String(s), Value::Number(n)) => Ok(s
            .chars()
            .nth(*n as usize)
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default()),
        _ => get_member(object, &index.to_string()),
    }
}

fn set_member(object: &Value, property: &str, value: Value) -> ScriptResult<()> {
    match object {
        Value::Object(entries) => {
            entries.borrow_mut().insert(property.to_string(), value);
            Ok(())
        }
        Value::Host(host) => host.set(property, value),
        other => Err(ScriptError::type_error(format!(
            "Cannot set property '{}' of {}",
            property,
            other.describe()
        ))),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    let value = match op {
        BinaryOp::Add => {
            let primitive =
                |v: &Value| matches!(v, Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_));
            if !primitive(left) || !primitive(right) {
                Value::String(format!("{}{}", left, right))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Value::Bool(match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEq => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferConsole;

    fn run(source: &str) -> Value {
        Interpreter::new().run(source).unwrap()
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(run("1 + 2 * 3"), Value::from(7i64));
        assert_eq!(run("'a' + 1"), Value::from("a1"));
        assert_eq!(run("7 % 4"), Value::from(3i64));
    }

    #[test]
    fn test_closures_capture_scope() {
        let source = "
            function counter() {
                let n = 0;
                return function() { n += 1; return n; };
            }
            let c = counter();
            c(); c();
            c()
        ";
        assert_eq!(run(source), Value::from(3i64));
    }

    #[test]
    fn test_loops() {
        let source = "
            let total = 0
            for (let i = 0; i < 10; i++) {
                if (i == 5) break;
                if (i % 2 == 0) continue;
                total += i
            }
            let j = 0
            while (j < 3) { j++ }
            total * 10 + j
        ";
        assert_eq!(run(source), Value::from(43i64));
    }

    #[test]
    fn test_arrays_and_objects() {
        let source = "
            let a = [1, 2];
            a.push(3);
            let o = { n: a.length, s: 'xy' };
            o.m = o.s.length;
            a[4] = 9;
            [o.n, o.m, a.length, a[3]]
        ";
        assert_eq!(run(source).describe(), "[3, 2, 5, undefined]");
    }

    #[test]
    fn test_out_of_range_index_write() {
        for index in ["1e20", "1e9", "-1", "1.5"] {
            let source = format!("let a = [1]; a[{}] = 1;", index);
            let err = Interpreter::new().run(&source).unwrap_err();
            assert!(matches!(err, ScriptError::Range(_)), "{}: {:?}", index, err);
        }
        assert_eq!(run("let b = [1]; b[100] = 2; b.length"), Value::from(101i64));
    }

    #[test]
    fn test_undeclared_assignment_creates_global() {
        let interp = Interpreter::new();
        interp.run("function f() { g = 4; } f();").unwrap();
        assert_eq!(interp.globals().lookup("g"), Some(Value::from(4i64)));
    }

    #[test]
    fn test_reference_error() {
        let err = Interpreter::new().run("missing + 1").unwrap_err();
        assert!(matches!(err, ScriptError::Reference(_)));
        assert_eq!(run("typeof missing"), Value::from("undefined"));
    }

    #[test]
    fn test_call_depth_limit() {
        let interp = Interpreter::new().with_max_depth(16);
        let err = interp.run("function f(n) { return f(n + 1); } f(0)").unwrap_err();
        assert!(matches!(err, ScriptError::Range(_)));
        // depth is restored after the failure
        assert_eq!(interp.run("function g() { return 1; } g()").unwrap(), Value::from(1i64));
    }

    #[test]
    fn test_throw() {
        let err = Interpreter::new().run("throw 'boom'").unwrap_err();
        assert_eq!(err, ScriptError::Thrown("boom".to_string()));
    }

    #[test]
    fn test_console_log() {
        let console = Rc::new(BufferConsole::default());
        let interp = Interpreter::with_console(console.clone());
        interp.run("console.log('x', 1 + 1, [1, 2])").unwrap();
        assert_eq!(console.lines(), vec!["x 2 1,2".to_string()]);
    }
}
