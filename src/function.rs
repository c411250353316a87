use std::cell::RefCell;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use crate::control::Signal;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::stmt::Stmt;
use crate::token::Token;
use crate::value::Value;

/// A user-defined function or method: its declaration plus the environment
/// it closed over at definition time.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl Function {
    pub fn new(
        name: Token,
        params: Vec<Token>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Function { name, params, body, closure, is_initializer }
    }

    /// Returns a copy of this method whose closure wraps the instance's
    /// environment, with `this` defined at slot 0 — matching the resolver's
    /// layout for a class scope.
    pub fn bind(&self, this: Value) -> Function {
        let mut environment = Environment::new(Some(Rc::clone(&self.closure)));
        environment.define(this);

        Function {
            name: self.name.clone(),
            params: self.params.clone(),
            body: Rc::clone(&self.body),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }

    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut environment = Environment::new(Some(Rc::clone(&self.closure)));
        for arg in arguments {
            environment.define(arg);
        }

        let environment = Rc::new(RefCell::new(environment));
        let signal = interpreter.execute_block(&self.body, environment)?;

        if self.is_initializer {
            // `init` always yields `this`, which the resolver placed in slot
            // 0 of the method's own closure.
            return Ok(self.closure.borrow().get_at(0, 0));
        }

        match signal {
            Signal::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name.lexeme)
    }
}

/// An anonymous `fun(...) {...}` expression; identical to `Function` except
/// it has no name and can never be an initializer.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub params: Vec<Token>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<RefCell<Environment>>,
}

impl Lambda {
    pub fn new(params: Vec<Token>, body: Rc<Vec<Stmt>>, closure: Rc<RefCell<Environment>>) -> Self {
        Lambda { params, body, closure }
    }

    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut environment = Environment::new(Some(Rc::clone(&self.closure)));
        for arg in arguments {
            environment.define(arg);
        }

        let environment = Rc::new(RefCell::new(environment));
        match interpreter.execute_block(&self.body, environment)? {
            Signal::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
}

impl Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<lambda>")
    }
}

/// A host-implemented function exposed to Lox programs, such as `clock`.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity_count: usize,
    pub function: fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>,
}

impl NativeFunction {
    pub fn arity(&self) -> usize {
        self.arity_count
    }

    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.function)(interpreter, arguments)
    }

    /// The native functions registered into the global scope, in the fixed
    /// order the resolver must also seed `globals_var_indices` with.
    pub fn globals() -> Vec<NativeFunction> {
        vec![
            NativeFunction {
                name: "clock",
                arity_count: 0,
                function: |_, _| {
                    let now = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .expect("system clock is after the Unix epoch")
                        .as_millis();
                    Ok(Value::Number(now as f64))
                },
            },
            NativeFunction {
                name: "input",
                arity_count: 0,
                function: |_, _| {
                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input).map_err(|e| RuntimeError {
                        line: 0,
                        column: 0,
                        message: format!("failed to read from stdin: {e}"),
                    })?;
                    if input.ends_with('\n') {
                        input.pop();
                        if input.ends_with('\r') {
                            input.pop();
                        }
                    }
                    Ok(Value::from(input))
                },
            },
        ]
    }
}

impl Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bind_defines_this_at_slot_zero_of_a_new_closure() {
        let closure = Rc::new(RefCell::new(Environment::default()));
        let function = Function::new(Token::from("greet"), Vec::new(), Rc::new(Vec::new()), closure, false);

        let bound = function.bind(Value::from("an instance"));
        assert_eq!(bound.closure.borrow().get_at(0, 0), Value::from("an instance"));
    }

    #[test]
    fn globals_registers_clock_and_input() {
        let names: Vec<&str> = NativeFunction::globals().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["clock", "input"]);
    }
}
