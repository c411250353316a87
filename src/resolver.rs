use std::collections::HashMap;
use std::mem;

use crate::error::ResolveError;
use crate::expr::{Expr, ExprVisitor, NodeId};
use crate::interpreter::Interpreter;
use crate::stmt::{Stmt, StmtVisitor};
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Lambda,
    Method,
    Static,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// A local variable's resolver-side bookkeeping: its slot in the enclosing
/// environment and whether its initializer has finished evaluating yet.
struct VarEntry {
    slot: usize,
    defined: bool,
}

struct GlobalEntry {
    slot: usize,
    defined: bool,
}

/// The global-slot bookkeeping that must survive across independent
/// `Resolver` instances — one per REPL line — so that a name declared on one
/// line keeps the same slot the interpreter's (equally persistent) global
/// environment already gave it, and a later line can still refer to it.
pub struct GlobalState {
    globals: HashMap<String, GlobalEntry>,
    unused_globals: HashMap<String, Token>,
    next_global_slot: usize,
}

impl GlobalState {
    /// `native_names` must be the names of the interpreter's globals, in the
    /// exact order the interpreter defined them into its global environment,
    /// so slot numbers agree without any synchronization step.
    pub fn new(native_names: &[&str]) -> Self {
        let mut globals = HashMap::new();
        let mut next_global_slot = 0;
        for name in native_names {
            globals.insert((*name).to_string(), GlobalEntry { slot: next_global_slot, defined: true });
            next_global_slot += 1;
        }
        GlobalState { globals, unused_globals: HashMap::new(), next_global_slot }
    }
}

/// The static pass that assigns every `Variable`/`Assignment`/`This`/`Super`
/// node a `(depth, slot)` (or a bare global slot) and records it into the
/// interpreter's side-tables. A fresh `Resolver` is built per top-level
/// program (a whole file, or one REPL line); its `GlobalState` is what
/// carries over between lines.
pub struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    scopes: Vec<HashMap<String, VarEntry>>,
    scope_next_slot: Vec<usize>,
    unused_vars: Vec<HashMap<String, Token>>,
    globals: HashMap<String, GlobalEntry>,
    unused_globals: HashMap<String, Token>,
    next_global_slot: usize,
    errors: Vec<ResolveError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a> Resolver<'a> {
    pub fn new(interpreter: &'a mut Interpreter, state: GlobalState) -> Self {
        Resolver {
            interpreter,
            scopes: Vec::new(),
            scope_next_slot: Vec::new(),
            unused_vars: Vec::new(),
            globals: state.globals,
            unused_globals: state.unused_globals,
            next_global_slot: state.next_global_slot,
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Hands the global-slot bookkeeping back to the driver so the next
    /// `Resolver` (the next REPL line, or `finish`-then-drop in file mode)
    /// can pick up where this one left off.
    pub fn into_global_state(self) -> GlobalState {
        GlobalState {
            globals: self.globals,
            unused_globals: self.unused_globals,
            next_global_slot: self.next_global_slot,
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        expr.accept(self);
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        stmt.accept(self);
    }

    /// Resolves one top-level program (a whole file, or one REPL line).
    /// Local-scope "unused" diagnostics are reported as each block ends;
    /// global ones are not — see `finish`.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Vec<ResolveError> {
        for statement in statements {
            self.resolve_stmt(statement);
        }
        mem::take(&mut self.errors)
    }

    /// Reports every global declared-but-never-read so far. Only meaningful
    /// to call once, after the whole program has been resolved — a REPL
    /// driver that keeps accumulating globals across lines never calls this.
    pub fn finish(&mut self) -> Vec<ResolveError> {
        let mut errors = Vec::new();
        for (name, token) in self.unused_globals.drain() {
            errors.push(ResolveError::at(&token, format!("unused variable '{name}'")));
        }
        errors
    }

    fn resolve_function(&mut self, function: &Stmt, r#type: FunctionType) {
        let Stmt::Function(function) = function else { unreachable!() };

        let enclosing_function = mem::replace(&mut self.current_function, r#type);

        self.begin_scope();
        for param in &function.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve(&function.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_lambda(&mut self, params: &[Token], body: &[Stmt]) {
        let enclosing_function = mem::replace(&mut self.current_function, FunctionType::Lambda);

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
        self.scope_next_slot.push(0);
        self.unused_vars.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
        self.scope_next_slot.pop();
        if let Some(unused) = self.unused_vars.pop() {
            for (name, token) in unused {
                self.errors.push(ResolveError::at(&token, format!("unused variable '{name}'")));
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        if self.scopes.is_empty() {
            self.declare_global(name);
            return;
        }

        let already_declared = self.scopes.last().expect("scope stack not empty").contains_key(&name.lexeme);
        if already_declared {
            self.errors.push(ResolveError::at(
                name,
                format!("'{}' already declared in the same scope", name.lexeme),
            ));
        }

        let slot = {
            let next_slot = self.scope_next_slot.last_mut().expect("scope stack not empty");
            let slot = *next_slot;
            *next_slot += 1;
            slot
        };

        self.scopes
            .last_mut()
            .expect("scope stack not empty")
            .insert(name.lexeme.clone(), VarEntry { slot, defined: false });
        self.unused_vars
            .last_mut()
            .expect("scope stack not empty")
            .insert(name.lexeme.clone(), name.clone());
    }

    fn declare_global(&mut self, name: &Token) {
        if self.globals.contains_key(&name.lexeme) {
            self.errors.push(ResolveError::at(
                name,
                format!("'{}' already declared in global scope", name.lexeme),
            ));
        }

        let slot = self.next_global_slot;
        self.next_global_slot += 1;
        self.globals.insert(name.lexeme.clone(), GlobalEntry { slot, defined: false });
        self.unused_globals.insert(name.lexeme.clone(), name.clone());
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(entry) = scope.get_mut(&name.lexeme) {
                entry.defined = true;
            }
        } else if let Some(entry) = self.globals.get_mut(&name.lexeme) {
            entry.defined = true;
        }
    }

    /// Binds a synthetic name (`this`, `super`) directly into the current
    /// scope at slot 0, skipping the declare/define/unused machinery used
    /// for real variables.
    fn bind_synthetic(&mut self, name: &str) {
        let slot = {
            let next_slot = self.scope_next_slot.last_mut().expect("scope stack not empty");
            let slot = *next_slot;
            *next_slot += 1;
            slot
        };
        self.scopes
            .last_mut()
            .expect("scope stack not empty")
            .insert(name.to_string(), VarEntry { slot, defined: true });
    }

    /// Binds a name reference to its `(depth, slot)` coordinate. `is_read`
    /// controls whether this clears the name from `unused_vars`/
    /// `unused_globals`: an assignment target is a write, not a read, and
    /// must not silence an "unused variable" diagnostic on its own.
    fn resolve_local(&mut self, id: NodeId, name: &Token, is_read: bool) {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(entry) = scope.get(&name.lexeme) {
                let depth = self.scopes.len() - 1 - i;
                self.interpreter.resolve(id, depth, entry.slot);
                if is_read {
                    self.unused_vars[i].remove(&name.lexeme);
                }
                return;
            }
        }

        if let Some(entry) = self.globals.get(&name.lexeme) {
            self.interpreter.resolve_global(id, entry.slot);
            if is_read {
                self.unused_globals.remove(&name.lexeme);
            }
            return;
        }

        self.errors.push(ResolveError::at(name, format!("undefined variable '{}'", name.lexeme)));
    }
}

impl<'a> ExprVisitor<()> for Resolver<'a> {
    fn visit_variable_expr(&mut self, expr: &Expr) {
        let Expr::Variable(variable) = expr else { unreachable!() };

        if let Some(scope) = self.scopes.last() {
            if let Some(entry) = scope.get(&variable.name.lexeme) {
                if !entry.defined {
                    self.errors.push(ResolveError::at(
                        &variable.name,
                        "can't read local variable in its own initializer",
                    ));
                }
            }
        }

        self.resolve_local(expr.id(), &variable.name, true);
    }

    fn visit_assign_expr(&mut self, expr: &Expr) {
        let Expr::Assign(assign) = expr else { unreachable!() };

        self.resolve_expr(&assign.value);
        self.resolve_local(expr.id(), &assign.name, false);
    }

    fn visit_literal_expr(&mut self, expr: &Expr) {
        let Expr::Literal(_) = expr else { unreachable!() };
    }

    fn visit_unary_expr(&mut self, expr: &Expr) {
        let Expr::Unary(unary) = expr else { unreachable!() };

        self.resolve_expr(&unary.expr);
    }

    fn visit_binary_expr(&mut self, expr: &Expr) {
        let Expr::Binary(binary) = expr else { unreachable!() };

        self.resolve_expr(&binary.left);
        self.resolve_expr(&binary.right);
    }

    fn visit_grouping_expr(&mut self, expr: &Expr) {
        let Expr::Grouping(grouping) = expr else { unreachable!() };

        self.resolve_expr(&grouping.expr);
    }

    fn visit_ternary_expr(&mut self, expr: &Expr) {
        let Expr::Ternary(ternary) = expr else { unreachable!() };

        self.resolve_expr(&ternary.condition);
        self.resolve_expr(&ternary.then_branch);
        self.resolve_expr(&ternary.else_branch);
    }

    fn visit_expr_list_expr(&mut self, expr: &Expr) {
        let Expr::ExprList(list) = expr else { unreachable!() };

        for item in &list.exprs {
            self.resolve_expr(item);
        }
    }

    fn visit_call_expr(&mut self, expr: &Expr) {
        let Expr::Call(call) = expr else { unreachable!() };

        self.resolve_expr(&call.callee);
        for argument in &call.arguments {
            self.resolve_expr(argument);
        }
    }

    fn visit_lambda_expr(&mut self, expr: &Expr) {
        let Expr::Lambda(lambda) = expr else { unreachable!() };

        self.resolve_lambda(&lambda.params, &lambda.body);
    }

    fn visit_get_expr(&mut self, expr: &Expr) {
        let Expr::Get(get) = expr else { unreachable!() };

        self.resolve_expr(&get.object);
    }

    fn visit_set_expr(&mut self, expr: &Expr) {
        let Expr::Set(set) = expr else { unreachable!() };

        self.resolve_expr(&set.value);
        self.resolve_expr(&set.object);
    }

    fn visit_this_expr(&mut self, expr: &Expr) {
        let Expr::This(this) = expr else { unreachable!() };

        if self.current_class == ClassType::None {
            self.errors.push(ResolveError::at(&this.keyword, "can't use 'this' outside of a class"));
            return;
        }

        if self.current_function == FunctionType::Static {
            self.errors.push(ResolveError::at(&this.keyword, "can't use 'this' in a static method"));
            return;
        }

        self.resolve_local(expr.id(), &this.keyword, true);
    }

    fn visit_super_expr(&mut self, expr: &Expr) {
        let Expr::Super(super_expr) = expr else { unreachable!() };

        if self.current_class != ClassType::Subclass {
            self.errors.push(ResolveError::at(
                &super_expr.keyword,
                "can't use 'super' outside of a sub class",
            ));
            return;
        }

        self.resolve_local(expr.id(), &super_expr.keyword, true);
    }
}

impl<'a> StmtVisitor<()> for Resolver<'a> {
    fn visit_block_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Block(block) = stmt else { unreachable!() };

        self.begin_scope();
        self.resolve(&block.statements);
        self.end_scope();
    }

    fn visit_var_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Var(var) = stmt else { unreachable!() };

        self.declare(&var.name);
        if let Some(initializer) = &var.initializer {
            self.resolve_expr(initializer);
        }
        self.define(&var.name);
    }

    fn visit_function_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Function(function) = stmt else { unreachable!() };

        self.declare(&function.name);
        self.define(&function.name);

        self.resolve_function(stmt, FunctionType::Function);
    }

    fn visit_expression_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Expression(expr) = stmt else { unreachable!() };

        self.resolve_expr(&expr.expr);
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) {
        let Stmt::If(if_stmt) = stmt else { unreachable!() };

        self.resolve_expr(&if_stmt.condition);
        self.resolve_stmt(&if_stmt.then_branch);
        if let Some(else_branch) = &if_stmt.else_branch {
            self.resolve_stmt(else_branch);
        }
    }

    fn visit_print_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Print(print) = stmt else { unreachable!() };

        self.resolve_expr(&print.expr);
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Return(return_stmt) = stmt else { unreachable!() };

        if self.current_function == FunctionType::None {
            self.errors.push(ResolveError::at(
                &return_stmt.keyword,
                "can only return from functions or methods",
            ));
        }

        if let Some(value) = &return_stmt.value {
            if self.current_function == FunctionType::Initializer {
                self.errors.push(ResolveError::at(
                    &return_stmt.keyword,
                    "cannot return value from an initializer",
                ));
                return;
            }

            self.resolve_expr(value);
        }
    }

    fn visit_break_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Break(_) = stmt else { unreachable!() };
        // Loop nesting is already validated by the parser.
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) {
        let Stmt::While(while_stmt) = stmt else { unreachable!() };

        self.resolve_expr(&while_stmt.condition);
        self.resolve_stmt(&while_stmt.body);
    }

    fn visit_class_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Class(class_stmt) = stmt else { unreachable!() };

        let enclosing_class = mem::replace(&mut self.current_class, ClassType::Class);

        self.declare(&class_stmt.name);
        self.define(&class_stmt.name);

        if let Some(superclass) = &class_stmt.superclass {
            let Expr::Variable(variable) = superclass else { unreachable!() };
            if class_stmt.name.lexeme == variable.name.lexeme {
                self.errors.push(ResolveError::at(&variable.name, "class cannot inherit from itself"));
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.bind_synthetic("super");
        }

        self.begin_scope();
        self.bind_synthetic("this");

        for method in &class_stmt.methods {
            let Stmt::Function(function) = method else { unreachable!() };
            let kind = if function.name.lexeme == "init" { FunctionType::Initializer } else { FunctionType::Method };
            self.resolve_function(method, kind);
        }

        for method in &class_stmt.static_methods {
            self.resolve_function(method, FunctionType::Static);
        }

        self.end_scope();

        if class_stmt.superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }
}
