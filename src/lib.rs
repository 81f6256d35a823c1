//! framescheme - a small Scheme evaluator built on an explicit frame chain
//!
//! Programs are evaluated without using the native call stack for Scheme-level
//! recursion. Every pending step of a computation lives in a heap-allocated
//! [`evaluator::frame::Frame`], and a trampoline advances one frame at a time.
//! That gives three properties an ordinary recursive evaluator cannot offer:
//!
//! - recursion depth is bounded by memory, and tail calls run in constant space
//! - `call/cc` captures "the rest of the computation" as plain data, so
//!   continuations are multi-shot and re-entrant
//! - a long evaluation yields to a host [`scheduler::Scheduler`] once its time
//!   slice is used up, so it never blocks other queued work
//!
//! ```scheme
//! (define (f x) (* x x))
//! (f 5)                                   ; => 25
//! (call/cc (lambda (k) (+ 1 (k 10))))     ; => 10
//! (letrec ((fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1)))))))
//!   (fact 5))                             ; => 120
//! ```
//!
//! ## Modules
//!
//! - `ast`: the runtime value hierarchy and its printed form
//! - `symbol`: the process-wide symbol table
//! - `evaluator`: environments, frames, the trampoline and the interpreter
//! - `builtinops`: special forms and primitive procedures
//! - `scheduler`: the cooperative task queue evaluations yield to
//! - `scheme`: S-expression reader

use std::fmt;
use std::time::Duration;

/// Maximum nesting depth accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 256;

/// Wall-clock budget a single trampoline batch may use before it yields
/// back to the scheduler
pub const DEFAULT_TIME_SLICE: Duration = Duration::from_millis(100);

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed dotted pairs)
    InvalidSyntax,
    /// Input ended before the expression was complete (unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, context: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
        }
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context))
    }
}

/// Number of arguments a procedure accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive bounds
    Range(usize, usize),
}

impl Arity {
    /// Check an argument count against this arity
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (qualifier, n) = match *self {
            Arity::Exact(n) => ("exactly", n),
            Arity::AtLeast(n) => ("at least", n),
            Arity::Range(min, max) if max == min + 1 => return write!(f, "{min} or {max} arguments"),
            Arity::Range(min, max) => return write!(f, "{min} to {max} arguments"),
        };
        let plural = if n == 1 { "" } else { "s" };
        write!(f, "{qualifier} {n} argument{plural}")
    }
}

/// Error types for the interpreter
///
/// Every error is terminal for the evaluation that raised it: the pending
/// frame chain is discarded and the error is handed to the completion callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    UnboundVariable(String),
    ArityError {
        expected: Arity,
        got: usize,
        /// Name of the procedure that rejected the call, when it has one
        procedure: Option<String>,
    },
    TypeError(String),
    NotApplicable(String),
    SyntaxError(String),
    EvalError(String),
}

impl Error {
    /// Create an ArityError for an anonymous procedure (closures)
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            procedure: None,
        }
    }

    /// Create an ArityError naming the procedure that was called
    pub fn arity_error_in(procedure: &str, expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            procedure: Some(procedure.to_owned()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundVariable(name) => write!(f, "unbound variable `{name}'"),
            Error::ArityError {
                expected,
                got,
                procedure,
            } => match procedure {
                Some(name) => write!(f, "`{name}' expects {expected}, got {got}"),
                None => write!(f, "expected {expected}, got {got}"),
            },
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::NotApplicable(what) => write!(f, "can't apply {what}"),
            Error::SyntaxError(msg) => write!(f, "Syntax error: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod scheduler;
pub mod scheme;
pub mod symbol;

pub use ast::Value;
pub use evaluator::{Environment, Interpreter, InterpreterConfig};
pub use scheduler::Scheduler;
pub use scheme::{parse_program, parse_scheme};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_wording() {
        let cases = vec![
            (Arity::Exact(1), "exactly 1 argument"),
            (Arity::Exact(2), "exactly 2 arguments"),
            (Arity::Exact(0), "exactly 0 arguments"),
            (Arity::AtLeast(1), "at least 1 argument"),
            (Arity::AtLeast(3), "at least 3 arguments"),
            (Arity::Range(2, 3), "2 or 3 arguments"),
            (Arity::Range(1, 4), "1 to 4 arguments"),
        ];
        for (arity, expected) in cases {
            assert_eq!(arity.to_string(), expected);
        }
    }

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(1));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(1));
        assert!(Arity::AtLeast(1).accepts(7));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Range(2, 3).accepts(3));
        assert!(!Arity::Range(2, 3).accepts(4));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::arity_error_in("cons", Arity::Exact(2), 1).to_string(),
            "`cons' expects exactly 2 arguments, got 1"
        );
        assert_eq!(
            Error::arity_error(Arity::AtLeast(1), 0).to_string(),
            "expected at least 1 argument, got 0"
        );
        assert_eq!(
            Error::UnboundVariable("x".into()).to_string(),
            "unbound variable `x'"
        );
    }

    #[test]
    fn test_parse_error_context_is_truncated() {
        let input = "x".repeat(300);
        let err = ParseError::with_context(ParseErrorKind::InvalidSyntax, "bad", &input, 150);
        let context = err.context.unwrap_or_default();
        assert!(context.starts_with("[...]"));
        assert!(context.ends_with("[...]"));
    }
}
