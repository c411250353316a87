//! `rlox` is a tree-walk interpreter for Lox, a dynamically typed language with lexical scoping,
//! first-class functions, closures and single inheritance. This crate implements the language
//! end-to-end: a [`scanner`](scanner) turns source text into tokens, a [`parser`](parser) builds an
//! AST out of them, a [`resolver`](resolver) statically resolves every variable reference to a
//! `(depth, slot)` coordinate, and an [`interpreter`](interpreter) walks the resolved AST to
//! evaluate it. This project is inspired by the [Crafting Interpreters](https://craftinginterpreters.com/)
//! book by Bob Nystrom.
//!
//! ## Scanning
//! Scanning converts a string of characters into a list of tokens. A token is a single unit of
//! the language — for example, the string `1 + 2` becomes `[Number(1), Plus, Number(2)]`. The
//! scanner is implemented in [`scanner`](scanner) and reports lexical errors as
//! [`ScanError`](error::ScanError): an unterminated string, an unterminated number, or an
//! unrecognized character. Scan errors do not stop scanning — the scanner keeps going so that as
//! many problems as possible surface in one pass.
//!
//! ## Parsing
//! Parsing converts the token list into an abstract syntax tree. The parser is a hand-written
//! recursive descent parser, implemented in [`parser`](parser), producing
//! [`Expressions`](expr::Expr) (pieces of code that produce a [`Value`](value::Value)) and
//! [`Statements`](stmt::Stmt) (pieces of code that perform a side effect, like a variable
//! declaration or an `if`). The parser reports [`ParseError`](error::ParseError)s and, like the
//! scanner, resynchronizes at statement boundaries after an error instead of aborting outright.
//!
//! ## Resolving
//! Resolving is a static pass over the AST that determines, for every variable reference, how
//! many enclosing scopes to walk and which slot to read — the coordinates the interpreter's
//! [`Environment`](environment::Environment) chain will use at runtime. It also catches a handful
//! of errors that are syntactically valid but meaningless, such as reading a variable from within
//! its own initializer. The resolver is implemented in [`resolver`](resolver) and reports
//! [`ResolveError`](error::ResolveError)s.
//!
//! ## Interpreting
//! Interpreting walks the resolved AST and evaluates it, producing [`Value`](value::Value)s and
//! side effects. The interpreter is implemented in [`interpreter`](interpreter) and reports
//! [`RuntimeError`](error::RuntimeError)s for the failures that can only be caught by actually
//! running the program — dividing by zero, calling something that isn't callable, and so on.

pub mod class;
pub mod control;
pub mod environment;
pub mod error;
pub mod expr;
pub mod function;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod stmt;
pub mod token;
pub mod value;

use error::ErrorReporter;
use interpreter::Interpreter;
use parser::Parser;
use resolver::{GlobalState, Resolver};
use scanner::Scanner;

/// The language driver: owns the interpreter's persistent state and the
/// resolver's cross-line global bookkeeping, and reports diagnostics through
/// an owned [`ErrorReporter`] instead of process-global mutable statics. A
/// single `Lox` can run many independent top-level programs — each call to
/// [`run`](Lox::run) resolves and interprets one, with the interpreter's
/// globals (and, in REPL mode, the resolver's slot table) carried over to
/// the next.
///
/// This type never touches `std::fs`, `std::io::stdin`, or a terminal — file
/// reading, REPL line editing and history live in the `rlox` binary, which
/// only ever calls [`run`](Lox::run) and inspects [`reporter`](Lox::reporter).
pub struct Lox {
    interpreter: Interpreter,
    global_state: Option<GlobalState>,
    reporter: ErrorReporter,
}

impl Lox {
    pub fn new() -> Self {
        Lox { interpreter: Interpreter::new(), global_state: None, reporter: ErrorReporter::new() }
    }

    /// Builds a driver whose `print` output goes to `output` instead of
    /// stdout — used by integration tests to capture output in-process.
    pub fn with_output(output: Box<dyn std::io::Write>) -> Self {
        Lox { interpreter: Interpreter::with_output(output), global_state: None, reporter: ErrorReporter::new() }
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    /// Scans, parses, resolves and interprets `source` as one top-level
    /// program. The error flags are reset first, so each call's outcome
    /// reflects only that call — a REPL driver calling this once per line
    /// gets per-line exit-code-worthy state, while a file-mode driver calling
    /// it once for the whole file gets the file's state.
    pub fn run(&mut self, source: &str) {
        self.reporter.reset();

        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        for error in &scan_errors {
            self.reporter.report_compile_error(error);
        }
        if self.reporter.had_compile_error() {
            return;
        }

        let (statements, parse_errors) = Parser::new(tokens).parse();
        for error in &parse_errors {
            self.reporter.report_compile_error(error);
        }
        if self.reporter.had_compile_error() {
            return;
        }

        let native_names = self.interpreter.native_names();
        let state = self.global_state.take().unwrap_or_else(|| GlobalState::new(&native_names));
        let mut resolver = Resolver::new(&mut self.interpreter, state);
        let resolve_errors = resolver.resolve(&statements);
        self.global_state = Some(resolver.into_global_state());
        for error in &resolve_errors {
            self.reporter.report_compile_error(error);
        }
        if self.reporter.had_compile_error() {
            return;
        }

        if let Err(error) = self.interpreter.interpret(&statements) {
            self.reporter.report_runtime_error(&error);
        }
    }

    /// Reports every global declared but never read across every `run` call
    /// so far, then drops the resolver state that tracked them. Meant to be
    /// called exactly once, after a whole file has been run — a REPL calls
    /// `run` per line and never this, since "unused" is not a meaningful
    /// judgment about a global that a later line might still reference.
    pub fn finish(&mut self) {
        let native_names = self.interpreter.native_names();
        let state = self.global_state.take().unwrap_or_else(|| GlobalState::new(&native_names));
        let mut resolver = Resolver::new(&mut self.interpreter, state);
        for error in &resolver.finish() {
            self.reporter.report_compile_error(error);
        }
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}
