//! User-defined procedures.
//!
//! Applying a closure evaluates the operands left to right, collecting the
//! results in a list, then binds them into a fresh child of the defining
//! environment and runs the body there. The body's last expression runs in
//! place of the call frame, so calls in tail position do not grow the chain.

use crate::ast::{Pair, Value, nil};
use crate::evaluator::arguments::Arguments;
use crate::evaluator::frame::{FrameRef, Registers};
use crate::evaluator::{Environment, run_sequence};
use crate::Error;
use std::rc::Rc;

pub struct Closure {
    parameters: Arguments,
    body: Value,
    env: Rc<Environment>,
}

impl Closure {
    pub fn new(parameters: &Value, body: Value, env: Rc<Environment>) -> Result<Self, Error> {
        if !matches!(&body, Value::Pair(pair) if !pair.is_null()) {
            return Err(Error::SyntaxError(format!(
                "procedure with parameters `{parameters}' has an empty body"
            )));
        }
        Ok(Closure {
            parameters: Arguments::parse(parameters)?,
            body,
            env,
        })
    }

    /// The parameter list as written
    pub fn parameters(&self) -> &Value {
        self.parameters.definition()
    }
}

pub(crate) fn apply(closure: &Rc<Closure>, frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    frame
        .extend(
            Registers::new()
                .exp(args.clone())
                .step(evaluate_operands)
                .clear_val(),
        )
        .continue_with(
            Registers::new()
                .val(nil())
                .env(Rc::clone(&closure.env))
                .step(enter)
                .receiver(Value::Closure(Rc::clone(closure))),
            Registers::new(),
        )
}

/// Evaluate the remaining operands one at a time. Results so far are kept,
/// newest first, in the value of the pending frame.
fn evaluate_operands(remaining: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let next = frame.next()?;
    let collected = next.val_opt().cloned().unwrap_or_else(nil);
    let collected = match frame.val_opt() {
        Some(value) => Value::Pair(Pair::new(value.clone(), collected)),
        None => collected,
    };

    match (remaining.car(), remaining.cdr()) {
        (Some(operand), Some(rest)) => frame.eval(
            operand,
            Registers::new().exp(rest).step(evaluate_operands),
            Registers::new().val(collected),
        ),
        _ => {
            let values = match collected {
                Value::Pair(pair) => Value::Pair(pair.reverse()),
                other => other,
            };
            Ok(next.resume(values))
        }
    }
}

/// Bind the evaluated operands and run the body in a new scope
fn enter(receiver: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let Value::Closure(closure) = receiver else {
        return Err(Error::EvalError(format!(
            "closure entry invoked on {}",
            receiver.type_name()
        )));
    };
    let env = Environment::extend(&closure.env);
    closure.parameters.bind(&env, &frame.val()?)?;
    Ok(frame.extend(
        Registers::new()
            .env(env)
            .exp(closure.body.clone())
            .step(run_sequence)
            .val(nil()),
    ))
}
