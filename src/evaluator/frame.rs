//! Frames: the heap-resident control stack.
//!
//! A frame records one pending step of a computation: the environment it runs
//! in, the expression it is working on, the value most recently delivered to
//! it, the step function to run next, an optional receiver the step is invoked
//! against, and the frame to resume once it finishes.
//!
//! Frames are never modified after construction. Producing a value builds a
//! fresh copy of the receiving frame with the value filled in, so a chain
//! captured by `call/cc` can be resumed any number of times and always sees
//! the state it had at capture.

use crate::Error;
use crate::ast::Value;
use crate::evaluator::{Environment, evaluate};
use std::rc::Rc;

/// A step function. The first argument is the frame's receiver (its
/// expression unless one was supplied explicitly); the result is the frame to
/// run next.
pub type Step = fn(&Value, &FrameRef) -> Result<FrameRef, Error>;

pub struct Frame {
    env: Rc<Environment>,
    exp: Value,
    val: Option<Value>,
    step: Option<Step>,
    receiver: Option<Value>,
    next: Option<FrameRef>,
}

impl Drop for Frame {
    // Long pending chains are unlinked iteratively.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(FrameRef(frame)) = next {
            match Rc::try_unwrap(frame) {
                Ok(mut frame) => next = frame.next.take(),
                Err(_) => break,
            }
        }
    }
}

/// Shared handle to an immutable frame
#[derive(Clone)]
pub struct FrameRef(Rc<Frame>);

/// Outcome of advancing a single frame
pub enum Bounce {
    Continue(FrameRef),
    Done(Value),
}

/// Field overrides applied when deriving one frame from another. Unset fields
/// are inherited, except the receiver, which is only inherited by
/// [`FrameRef::dup`] and [`FrameRef::resume`].
#[derive(Default, Clone)]
pub struct Registers {
    env: Option<Rc<Environment>>,
    exp: Option<Value>,
    val: Option<Option<Value>>,
    step: Option<Step>,
    receiver: Option<Value>,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(mut self, env: Rc<Environment>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn exp(mut self, exp: Value) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn val(mut self, val: Value) -> Self {
        self.val = Some(Some(val));
        self
    }

    /// Start with no value delivered
    pub fn clear_val(mut self) -> Self {
        self.val = Some(None);
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    pub fn receiver(mut self, receiver: Value) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

impl FrameRef {
    fn new(frame: Frame) -> FrameRef {
        FrameRef(Rc::new(frame))
    }

    /// A return point with no step: whatever value reaches it is the result
    /// of the whole evaluation
    pub fn terminal(env: Rc<Environment>) -> FrameRef {
        FrameRef::new(Frame {
            env,
            exp: Value::Unspecified,
            val: None,
            step: None,
            receiver: None,
            next: None,
        })
    }

    /// A frame that evaluates `exp` and hands the result to `next`
    pub fn start(env: Rc<Environment>, exp: Value, next: FrameRef) -> FrameRef {
        FrameRef::new(Frame {
            env,
            exp,
            val: None,
            step: Some(evaluate),
            receiver: None,
            next: Some(next),
        })
    }

    pub fn env(&self) -> &Rc<Environment> {
        &self.0.env
    }

    pub fn exp(&self) -> &Value {
        &self.0.exp
    }

    /// The value most recently delivered to this frame
    pub fn val(&self) -> Result<Value, Error> {
        self.0
            .val
            .clone()
            .ok_or_else(|| Error::EvalError("frame resumed before a value was produced".into()))
    }

    pub fn val_opt(&self) -> Option<&Value> {
        self.0.val.as_ref()
    }

    /// The object the step function is invoked against
    pub fn receiver(&self) -> &Value {
        self.0.receiver.as_ref().unwrap_or(&self.0.exp)
    }

    pub fn next(&self) -> Result<&FrameRef, Error> {
        self.0
            .next
            .as_ref()
            .ok_or_else(|| Error::EvalError("no pending frame to return to".into()))
    }

    pub fn ptr_eq(&self, other: &FrameRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of frames from this one to the end of the chain
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut frame = self;
        while let Some(next) = &frame.0.next {
            depth += 1;
            frame = next;
        }
        depth
    }

    fn derive(&self, registers: Registers, next: Option<FrameRef>) -> FrameRef {
        let Registers {
            env,
            exp,
            val,
            step,
            receiver,
        } = registers;
        FrameRef::new(Frame {
            env: env.unwrap_or_else(|| Rc::clone(&self.0.env)),
            exp: exp.unwrap_or_else(|| self.0.exp.clone()),
            val: val.unwrap_or_else(|| self.0.val.clone()),
            step: step.or(self.0.step),
            receiver,
            next,
        })
    }

    /// A copy of this frame with `registers` applied
    pub fn extend(&self, registers: Registers) -> FrameRef {
        self.derive(registers, self.0.next.clone())
    }

    /// A copy of this frame that keeps its receiver
    pub fn dup(&self) -> FrameRef {
        self.extend(self.keep_receiver(Registers::new()))
    }

    /// A copy of this frame with `value` delivered to it
    pub fn resume(&self, value: Value) -> FrameRef {
        self.extend(self.keep_receiver(Registers::new().val(value)))
    }

    fn keep_receiver(&self, registers: Registers) -> Registers {
        match (&registers.receiver, &self.0.receiver) {
            (None, Some(receiver)) => registers.receiver(receiver.clone()),
            _ => registers,
        }
    }

    /// Run this frame, then a frame derived from it with `registers`, then
    /// the pending frame patched with `continuation`.
    pub fn continue_with(
        &self,
        registers: Registers,
        continuation: Registers,
    ) -> Result<FrameRef, Error> {
        let next = self.next()?;
        let pending = next.extend(next.keep_receiver(continuation));
        let then = self.derive(registers, Some(pending));
        let receiver = self.0.receiver.clone();
        Ok(FrameRef::new(Frame {
            env: Rc::clone(&self.0.env),
            exp: self.0.exp.clone(),
            val: self.0.val.clone(),
            step: self.0.step,
            receiver,
            next: Some(then),
        }))
    }

    /// Evaluate `exp`, then run the frame described by `registers` with the
    /// result delivered to it.
    pub fn eval(
        &self,
        exp: Value,
        registers: Registers,
        continuation: Registers,
    ) -> Result<FrameRef, Error> {
        self.extend(Registers::new().exp(exp).step(evaluate))
            .continue_with(registers, continuation)
    }

    /// Evaluate `exp` in place of this frame, so its value goes straight to
    /// whatever this frame would have returned to
    pub fn eval_tail(&self, exp: Value) -> FrameRef {
        self.extend(Registers::new().exp(exp).step(evaluate))
    }

    /// Finish this frame with `value`
    pub fn return_value(&self, value: Value) -> Result<FrameRef, Error> {
        Ok(self.next()?.resume(value))
    }

    pub fn return_boolean(&self, value: bool) -> Result<FrameRef, Error> {
        self.return_value(Value::Boolean(value))
    }

    /// Run this frame's step, or report its value when it has none
    pub fn advance(&self) -> Result<Bounce, Error> {
        match self.0.step {
            Some(step) => step(self.receiver(), self).map(Bounce::Continue),
            None => self.val().map(Bounce::Done),
        }
    }
}
