use std::cell::Cell;
use std::fmt::Display;

use thiserror::Error;

use crate::token::{Location, Token};

/// Tracks whether a compile-time or a runtime error has been seen during the
/// current run. Owned by the driver (`crate::Lox`) instead of a process-wide
/// mutable static, and reset between REPL lines so previous errors do not
/// leak into the next line's exit-code decision.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    had_compile_error: Cell<bool>,
    had_runtime_error: Cell<bool>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn had_compile_error(&self) -> bool {
        self.had_compile_error.get()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error.get()
    }

    pub fn had_error(&self) -> bool {
        self.had_compile_error() || self.had_runtime_error()
    }

    pub fn reset(&self) {
        self.had_compile_error.set(false);
        self.had_runtime_error.set(false);
    }

    /// Prints a scan, parse or resolve diagnostic and marks the run as having
    /// a compile-time error.
    pub fn report_compile_error(&self, diagnostic: &dyn Diagnostic) {
        diagnostic.report();
        self.had_compile_error.set(true);
    }

    /// Prints a runtime error and marks the run as having a runtime error.
    pub fn report_runtime_error(&self, error: &RuntimeError) {
        eprintln!("{error}");
        self.had_runtime_error.set(true);
    }
}

/// Unifies the compile-time error kinds behind one reporting method; each
/// kind's `Display` already renders the §6 compile-error format.
pub trait Diagnostic: Display {
    fn report(&self) {
        eprintln!("{self}");
    }
}

impl Diagnostic for ScanError {}
impl Diagnostic for ParseError {}
impl Diagnostic for ResolveError {}

/// An error raised by the scanner: an unterminated string, an unterminated
/// number, or an unrecognized character.
#[derive(Debug, Clone, Error)]
#[error("Error: {message} on line {line}, character {column}.")]
pub struct ScanError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ScanError {
    pub fn at(location: Location, message: impl Into<String>) -> Self {
        ScanError { line: location.line, column: location.column, message: message.into() }
    }
}

/// An error raised by the parser while building the AST.
#[derive(Debug, Clone, Error)]
#[error("Error: {message} on line {line}, character {column}.")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        ParseError {
            line: token.location.line,
            column: token.location.column,
            message: message.into(),
        }
    }
}

/// An error raised by the resolver's static pass: scoping and `this`/`super`
/// misuse, unresolvable self-reads, illegal `return`s, and the like.
#[derive(Debug, Clone, Error)]
#[error("Error: {message} on line {line}, character {column}.")]
pub struct ResolveError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ResolveError {
    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        ResolveError {
            line: token.location.line,
            column: token.location.column,
            message: message.into(),
        }
    }
}

/// An error raised while evaluating the AST: type mismatches, undefined
/// properties, division by zero, arity mismatches, and so on. Carries the
/// token at the site of the failure so the driver can report a position.
#[derive(Debug, Clone, Error)]
#[error("{message}\n[line {line}, character {column}]")]
pub struct RuntimeError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl RuntimeError {
    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError {
            line: token.location.line,
            column: token.location.column,
            message: message.into(),
        }
    }
}
