//! First-class continuations.
//!
//! A continuation holds the frame that was waiting for the result of a
//! `call/cc` expression. Since frames are immutable, invoking it simply
//! delivers a value to a copy of that frame. It may be invoked any number of
//! times, including after the evaluation that created it has finished.

use crate::ast::Value;
use crate::evaluator::frame::{FrameRef, Registers};
use crate::{Arity, Error};
use std::rc::Rc;

pub struct Continuation {
    frame: FrameRef,
}

impl Continuation {
    /// Capture the computation waiting on `frame`
    pub fn capture(frame: &FrameRef) -> Rc<Continuation> {
        Rc::new(Continuation { frame: frame.dup() })
    }
}

pub(crate) fn apply(
    continuation: &Rc<Continuation>,
    frame: &FrameRef,
    args: &Value,
) -> Result<FrameRef, Error> {
    let count = args.list_len();
    let argument = match args.car() {
        Some(argument) if count == 1 => argument,
        _ => return Err(Error::arity_error_in("continuation", Arity::Exact(1), count)),
    };
    frame.eval(
        argument,
        Registers::new()
            .step(reenter)
            .receiver(Value::Continuation(Rc::clone(continuation))),
        Registers::new(),
    )
}

fn reenter(receiver: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let Value::Continuation(continuation) = receiver else {
        return Err(Error::EvalError(format!(
            "continuation re-entry invoked on {}",
            receiver.type_name()
        )));
    };
    log::trace!("re-entering continuation");
    Ok(continuation.frame.resume(frame.val()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interpreter;
    use crate::ast::val;

    fn interpreter() -> Interpreter {
        match Interpreter::new() {
            Ok(interpreter) => interpreter,
            Err(e) => panic!("failed to start interpreter: {e}"),
        }
    }

    #[test]
    fn test_escape_skips_pending_work() {
        let interpreter = interpreter();
        let cases = vec![
            ("(call/cc (lambda (k) (+ 1 (k 10))))", val(10)),
            ("(+ 1 (call/cc (lambda (k) 41)))", val(42)),
            ("(+ 1 (call/cc (lambda (k) (k 41) 0)))", val(42)),
        ];
        for (source, expected) in cases {
            assert_eq!(interpreter.run_source(source), Ok(expected), "{source}");
        }
        assert!(matches!(
            interpreter.run_source("(call/cc call/cc)"),
            Ok(Value::Continuation(_))
        ));
    }

    #[test]
    fn test_continuation_arity() {
        let interpreter = interpreter();
        for source in [
            "(call/cc (lambda (k) (k)))",
            "(call/cc (lambda (k) (k 1 2)))",
        ] {
            match interpreter.run_source(source) {
                Err(e @ Error::ArityError { .. }) => {
                    assert!(e.to_string().starts_with("`continuation' expects exactly 1 argument"));
                }
                other => panic!("{source}: expected arity error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_reentry_after_completion() {
        let interpreter = interpreter();
        let first = interpreter.run_source(
            "(define saved #f)
             (define results '())
             (define (note x) (set! results (cons x results)) x)
             (note (+ 100 (call/cc (lambda (k) (set! saved k) 0))))",
        );
        assert_eq!(first, Ok(val(100)));
        assert_eq!(interpreter.run_source("(saved 1)"), Ok(val(101)));
        assert_eq!(interpreter.run_source("(saved 2)"), Ok(val(102)));
        assert_eq!(
            interpreter.run_source("results"),
            Ok(Value::from([102, 101, 100]))
        );
    }
}
