use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use crate::class::{Class, Instance};
use crate::control::Signal;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::expr::{Expr, ExprVisitor, LiteralValue, NodeId};
use crate::function::{Function, Lambda, NativeFunction};
use crate::stmt::{Stmt, StmtVisitor};
use crate::token::{Token, Type};
use crate::value::{Callable, Value};

fn as_number(value: &Value, token: &Token) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::at(token, "Operand must be a number")),
    }
}

/// Walks the AST, threading a current `environment` pointer and owning the
/// resolver's `(depth, slot)` / global-slot side-tables. Natives and user
/// globals share one flat environment (the "fused" variant of §4.3's
/// native/globals split): native functions occupy the low slots, in the
/// same order the resolver seeds its own global namespace with.
pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<NodeId, (usize, usize)>,
    globals_idx: HashMap<NodeId, usize>,
    native_names: Vec<&'static str>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Builds an interpreter that writes `print` output to `output` instead
    /// of stdout — the hook integration tests use to capture output without
    /// spawning the built binary.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::default()));
        let mut native_names = Vec::new();

        for native in NativeFunction::globals() {
            native_names.push(native.name);
            globals.borrow_mut().define(Value::NativeFunction(Rc::new(native)));
        }

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            globals_idx: HashMap::new(),
            native_names,
            output,
        }
    }

    /// Names of the natives this interpreter registered, in registration
    /// order — the resolver seeds its global namespace with exactly this
    /// list so slot numbers agree without synchronization.
    pub fn native_names(&self) -> Vec<&'static str> {
        self.native_names.clone()
    }

    pub fn resolve(&mut self, id: NodeId, depth: usize, slot: usize) {
        self.locals.insert(id, (depth, slot));
    }

    pub fn resolve_global(&mut self, id: NodeId, slot: usize) {
        self.globals_idx.insert(id, slot);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        stmt.accept(self)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        expr.accept(self)
    }

    /// Saves the current environment, installs `environment`, runs every
    /// statement, and restores the saved environment on every exit path —
    /// normal completion, a runtime error, or a `break`/`return` signal.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Signal, RuntimeError> {
        let previous = Rc::clone(&self.environment);
        self.environment = environment;

        let mut result = Ok(Signal::Normal);
        for statement in statements {
            match self.execute(statement) {
                Ok(Signal::Normal) => continue,
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn lookup_variable(&self, id: NodeId, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(&(depth, slot)) = self.locals.get(&id) {
            Ok(self.environment.borrow().get_at(depth, slot))
        } else if let Some(&slot) = self.globals_idx.get(&id) {
            Ok(self.globals.borrow().get_at(0, slot))
        } else {
            Err(RuntimeError::at(name, format!("Undefined variable '{}'", name.lexeme)))
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprVisitor<Result<Value, RuntimeError>> for Interpreter {
    fn visit_literal_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Literal(literal) = expr else { unreachable!() };

        Ok(match &literal.value {
            LiteralValue::Nil => Value::Nil,
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::String(s) => Value::from(s.clone()),
        })
    }

    fn visit_unary_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Unary(unary) = expr else { unreachable!() };

        let right = self.evaluate(&unary.expr)?;
        match unary.operator.r#type {
            Type::Minus => Ok(Value::Number(-as_number(&right, &unary.operator)?)),
            Type::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!(),
        }
    }

    fn visit_binary_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Binary(binary) = expr else { unreachable!() };

        let left = self.evaluate(&binary.left)?;
        let right = self.evaluate(&binary.right)?;
        let op = &binary.operator;

        match op.r#type {
            Type::Greater => Ok(Value::Bool(as_number(&left, op)? > as_number(&right, op)?)),
            Type::GreaterEqual => Ok(Value::Bool(as_number(&left, op)? >= as_number(&right, op)?)),
            Type::Less => Ok(Value::Bool(as_number(&left, op)? < as_number(&right, op)?)),
            Type::LessEqual => Ok(Value::Bool(as_number(&left, op)? <= as_number(&right, op)?)),
            Type::BangEqual => Ok(Value::Bool(left != right)),
            Type::EqualEqual => Ok(Value::Bool(left == right)),
            Type::Minus => Ok(Value::Number(as_number(&left, op)? - as_number(&right, op)?)),
            Type::Star => Ok(Value::Number(as_number(&left, op)? * as_number(&right, op)?)),
            Type::Slash => {
                let divisor = as_number(&right, op)?;
                if divisor == 0.0 {
                    return Err(RuntimeError::at(op, "Divide by zero"));
                }
                Ok(Value::Number(as_number(&left, op)? / divisor))
            }
            Type::Plus => match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::from(format!("{left}{right}"))),
                _ => Err(RuntimeError::at(op, "Operands must be numbers or strings")),
            },
            // `and`/`or` fold into `Binary`; both operands are always fully
            // evaluated above, so this is a non-short-circuiting departure
            // from standard Lox (see DESIGN.md).
            Type::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
            Type::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
            _ => unreachable!(),
        }
    }

    fn visit_grouping_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Grouping(grouping) = expr else { unreachable!() };
        self.evaluate(&grouping.expr)
    }

    fn visit_ternary_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Ternary(ternary) = expr else { unreachable!() };

        if self.evaluate(&ternary.condition)?.is_truthy() {
            self.evaluate(&ternary.then_branch)
        } else {
            self.evaluate(&ternary.else_branch)
        }
    }

    fn visit_variable_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Variable(variable) = expr else { unreachable!() };
        self.lookup_variable(expr.id(), &variable.name)
    }

    fn visit_assign_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Assign(assign) = expr else { unreachable!() };

        let value = self.evaluate(&assign.value)?;
        let id = expr.id();

        if let Some(&(depth, slot)) = self.locals.get(&id) {
            self.environment.borrow_mut().assign_at(depth, slot, value.clone());
        } else if let Some(&slot) = self.globals_idx.get(&id) {
            self.globals.borrow_mut().assign_at(0, slot, value.clone());
        } else {
            return Err(RuntimeError::at(&assign.name, format!("Undefined variable '{}'", assign.name.lexeme)));
        }

        Ok(value)
    }

    fn visit_expr_list_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::ExprList(list) = expr else { unreachable!() };

        let mut value = Value::Nil;
        for item in &list.exprs {
            value = self.evaluate(item)?;
        }
        Ok(value)
    }

    fn visit_call_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Call(call) = expr else { unreachable!() };

        let callee = self.evaluate(&call.callee)?;

        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.evaluate(argument)?);
        }

        let callable = callee
            .as_callable()
            .ok_or_else(|| RuntimeError::at(&call.paren, "Can only call functions and classes"))?;

        if arguments.len() != callable.arity() {
            return Err(RuntimeError::at(
                &call.paren,
                format!("Expected {} arguments but got {}", callable.arity(), arguments.len()),
            ));
        }

        callable.call(self, arguments)
    }

    fn visit_lambda_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Lambda(lambda) = expr else { unreachable!() };

        let callable = Lambda::new(lambda.params.clone(), Rc::new(lambda.body.clone()), Rc::clone(&self.environment));
        Ok(Value::Lambda(Rc::new(callable)))
    }

    fn visit_get_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Get(get) = expr else { unreachable!() };

        let object = self.evaluate(&get.object)?;
        match object {
            Value::Instance(instance) => Instance::get(&instance, &get.name),
            Value::Class(class) => class
                .borrow()
                .find_static_method(&get.name.lexeme)
                .map(Value::Function)
                .ok_or_else(|| RuntimeError::at(&get.name, format!("Undefined property '{}'", get.name.lexeme))),
            _ => Err(RuntimeError::at(&get.name, "Only instances and classes have properties")),
        }
    }

    fn visit_set_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Set(set) = expr else { unreachable!() };

        let object = self.evaluate(&set.object)?;
        let Value::Instance(instance) = object else {
            return Err(RuntimeError::at(&set.name, "Only instances have fields"));
        };

        let value = self.evaluate(&set.value)?;
        instance.borrow_mut().set(&set.name, value.clone());
        Ok(value)
    }

    fn visit_this_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::This(this) = expr else { unreachable!() };
        self.lookup_variable(expr.id(), &this.keyword)
    }

    fn visit_super_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let Expr::Super(super_expr) = expr else { unreachable!() };

        let (depth, slot) = *self.locals.get(&expr.id()).expect("resolver resolves every 'super' reference");
        let superclass = self.environment.borrow().get_at(depth, slot);
        let Value::Class(superclass) = superclass else {
            unreachable!("resolver guarantees 'super' binds a class")
        };

        // `this` lives one scope inside `super`'s scope, at slot 0.
        let instance = self.environment.borrow().get_at(depth - 1, 0);

        let method = superclass.borrow().find_method(&super_expr.method.lexeme).ok_or_else(|| {
            RuntimeError::at(&super_expr.method, format!("Undefined property '{}'", super_expr.method.lexeme))
        })?;

        Ok(Value::Function(Rc::new(method.bind(instance))))
    }
}

impl StmtVisitor<Result<Signal, RuntimeError>> for Interpreter {
    fn visit_expression_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::Expression(data) = stmt else { unreachable!() };
        self.evaluate(&data.expr)?;
        Ok(Signal::Normal)
    }

    fn visit_print_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::Print(data) = stmt else { unreachable!() };
        let value = self.evaluate(&data.expr)?;
        let _ = writeln!(self.output, "{value}");
        Ok(Signal::Normal)
    }

    fn visit_var_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::Var(var) = stmt else { unreachable!() };

        let value = match &var.initializer {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };
        self.environment.borrow_mut().define(value);
        Ok(Signal::Normal)
    }

    fn visit_block_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::Block(block) = stmt else { unreachable!() };

        let environment = Rc::new(RefCell::new(Environment::new(Some(Rc::clone(&self.environment)))));
        self.execute_block(&block.statements, environment)
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::If(if_stmt) = stmt else { unreachable!() };

        if self.evaluate(&if_stmt.condition)?.is_truthy() {
            self.execute(&if_stmt.then_branch)
        } else if let Some(else_branch) = &if_stmt.else_branch {
            self.execute(else_branch)
        } else {
            Ok(Signal::Normal)
        }
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::While(while_stmt) = stmt else { unreachable!() };

        while self.evaluate(&while_stmt.condition)?.is_truthy() {
            match self.execute(&while_stmt.body)? {
                Signal::Normal => {}
                Signal::Break => break,
                signal @ Signal::Return(_) => return Ok(signal),
            }
        }
        Ok(Signal::Normal)
    }

    fn visit_break_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::Break(_) = stmt else { unreachable!() };
        Ok(Signal::Break)
    }

    fn visit_function_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::Function(function) = stmt else { unreachable!() };

        let callable = Function::new(
            function.name.clone(),
            function.params.clone(),
            Rc::new(function.body.clone()),
            Rc::clone(&self.environment),
            false,
        );
        self.environment.borrow_mut().define(Value::Function(Rc::new(callable)));
        Ok(Signal::Normal)
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::Return(return_stmt) = stmt else { unreachable!() };

        let value = match &return_stmt.value {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };
        Ok(Signal::Return(value))
    }

    fn visit_class_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        let Stmt::Class(class_stmt) = stmt else { unreachable!() };

        let superclass = match &class_stmt.superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value.as_callable() {
                    Some(Callable::Class(c)) => Some(c),
                    _ => {
                        let Expr::Variable(v) = expr else { unreachable!() };
                        return Err(RuntimeError::at(&v.name, "Superclass must be a class"));
                    }
                }
            }
            None => None,
        };

        // Reserve the class's own slot before resolving its body, so methods
        // can refer to the class by name recursively.
        let reserved_slot = self.environment.borrow_mut().define(Value::Nil);

        let mut closure = Rc::clone(&self.environment);
        if let Some(superclass) = &superclass {
            let super_env = Rc::new(RefCell::new(Environment::new(Some(Rc::clone(&closure)))));
            super_env.borrow_mut().define(Value::Class(Rc::clone(superclass)));
            closure = super_env;
        }

        // Methods close over `closure` directly rather than over an extra
        // persisted "this" scope: `Function::bind` supplies the one `this`
        // layer method bodies expect at depth 1 — an additional static layer
        // here would push that depth by one and break `super` lookups in
        // subclasses (see DESIGN.md).
        let mut methods = HashMap::new();
        for method in &class_stmt.methods {
            let Stmt::Function(data) = method else { unreachable!() };
            let is_initializer = data.name.lexeme == "init";
            let function = Function::new(
                data.name.clone(),
                data.params.clone(),
                Rc::new(data.body.clone()),
                Rc::clone(&closure),
                is_initializer,
            );
            methods.insert(data.name.lexeme.clone(), Rc::new(function));
        }

        let mut static_methods = HashMap::new();
        for method in &class_stmt.static_methods {
            let Stmt::Function(data) = method else { unreachable!() };
            let function = Function::new(
                data.name.clone(),
                data.params.clone(),
                Rc::new(data.body.clone()),
                Rc::clone(&closure),
                false,
            );
            static_methods.insert(data.name.lexeme.clone(), Rc::new(function));
        }

        let class = Class::new(class_stmt.name.lexeme.clone(), superclass, methods, static_methods);
        self.environment.borrow_mut().assign_at(0, reserved_slot, Value::Class(Rc::new(RefCell::new(class))));

        Ok(Signal::Normal)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::{GlobalState, Resolver};
    use crate::scanner::Scanner;

    fn run(source: &str) -> (Interpreter, Result<(), RuntimeError>) {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        assert!(scan_errors.is_empty(), "{scan_errors:?}");
        let (statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "{parse_errors:?}");

        let mut interpreter = Interpreter::new();
        let native_names = interpreter.native_names();
        let state = GlobalState::new(&native_names);
        let resolve_errors = Resolver::new(&mut interpreter, state).resolve(&statements);
        assert!(resolve_errors.is_empty(), "{resolve_errors:?}");

        let result = interpreter.interpret(&statements);
        (interpreter, result)
    }

    fn global_at(interpreter: &Interpreter, offset: usize) -> Value {
        interpreter.globals.borrow().get_at(0, interpreter.native_names.len() + offset)
    }

    #[test]
    fn evaluates_arithmetic() {
        let (interpreter, result) = run("var result = 6 - (12 - 24);");
        result.unwrap();
        assert_eq!(global_at(&interpreter, 0), Value::Number(18.0));
    }

    #[test]
    fn string_concatenation() {
        let (interpreter, result) = run("var result = \"Hello\" + \"World\";");
        result.unwrap();
        assert_eq!(global_at(&interpreter, 0), Value::from("HelloWorld"));
    }

    #[test]
    fn string_plus_number_coerces_via_stringify() {
        let (interpreter, result) = run("var result = \"n=\" + 1;");
        result.unwrap();
        assert_eq!(global_at(&interpreter, 0), Value::from("n=1"));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (_, result) = run("var result = 1 / 0;");
        assert!(result.unwrap_err().message.contains("Divide by zero"));
    }

    #[test]
    fn and_or_combine_by_truthiness_without_short_circuiting() {
        let (interpreter, result) = run("var a = true or false; var b = false and true;");
        result.unwrap();
        assert_eq!(global_at(&interpreter, 0), Value::Bool(true));
        assert_eq!(global_at(&interpreter, 1), Value::Bool(false));
    }

    #[test]
    fn ternary_picks_a_branch() {
        let (interpreter, result) = run("var result = 1 < 2 ? \"yes\" : \"no\";");
        result.unwrap();
        assert_eq!(global_at(&interpreter, 0), Value::from("yes"));
    }

    #[test]
    fn comma_expression_yields_last_value() {
        let (interpreter, result) = run("var result = (1, 2, 3);");
        result.unwrap();
        assert_eq!(global_at(&interpreter, 0), Value::Number(3.0));
    }

    #[test]
    fn closures_keep_their_own_counter() {
        let source = "\
            fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }\
            var counter = make();\
            var a = counter();\
            var b = counter();\
            var result = a + b;";
        let (interpreter, result) = run(source);
        result.unwrap();
        assert_eq!(global_at(&interpreter, 4), Value::Number(3.0));
    }

    #[test]
    fn inherited_methods_call_through_super() {
        let source = "\
            class Animal { init(name) { this.name = name; } speak() { return this.name + \" makes a sound\"; } }\
            class Dog < Animal { speak() { return super.speak() + \"!\"; } }\
            var d = Dog(\"Rex\");\
            var result = d.speak();";
        let (interpreter, result) = run(source);
        result.unwrap();
        assert_eq!(global_at(&interpreter, 3), Value::from("Rex makes a sound!"));
    }

    #[test]
    fn break_exits_only_the_innermost_loop() {
        let source = "\
            var count = 0;\
            for (var i = 0; i < 5; i = i + 1) { if (i == 3) break; count = count + 1; }\
            var result = count;";
        let (interpreter, result) = run(source);
        result.unwrap();
        assert_eq!(global_at(&interpreter, 1), Value::Number(3.0));
    }
}
