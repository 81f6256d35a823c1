//! The driver loop.
//!
//! A [`Trampoline`] owns the frame to run next and the completion callback.
//! It advances frames until one produces the final value or a step fails. If a
//! batch runs longer than its time slice, the trampoline moves itself into a
//! scheduler task and returns, and the evaluation continues from the same
//! frame when the host runs that task.

use crate::Error;
use crate::ast::Value;
use crate::evaluator::frame::{Bounce, FrameRef};
use crate::scheduler::Scheduler;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Receives the outcome of an evaluation, exactly once
pub type Callback = Box<dyn FnOnce(Result<Value, Error>)>;

pub struct Trampoline {
    frame: FrameRef,
    callback: Callback,
    scheduler: Rc<Scheduler>,
    time_slice: Duration,
}

impl Trampoline {
    pub fn new(
        frame: FrameRef,
        callback: Callback,
        scheduler: Rc<Scheduler>,
        time_slice: Duration,
    ) -> Self {
        Trampoline {
            frame,
            callback,
            scheduler,
            time_slice,
        }
    }

    /// Run one batch. At least one frame is advanced per batch.
    pub fn run(self) {
        let Trampoline {
            mut frame,
            callback,
            scheduler,
            time_slice,
        } = self;
        let started = Instant::now();
        let mut steps: u64 = 0;

        loop {
            match frame.advance() {
                Ok(Bounce::Continue(next)) => frame = next,
                Ok(Bounce::Done(value)) => {
                    log::trace!("evaluation finished after {steps} steps in this slice: {value}");
                    callback(Ok(value));
                    return;
                }
                Err(error) => {
                    log::debug!("evaluation failed: {error}");
                    callback(Err(error));
                    return;
                }
            }
            steps += 1;

            if started.elapsed() > time_slice {
                log::debug!(
                    "time slice of {time_slice:?} used after {steps} steps, yielding to scheduler"
                );
                let queue = Rc::clone(&scheduler);
                queue.defer(move || {
                    Trampoline::new(frame, callback, scheduler, time_slice).run();
                });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::val;
    use crate::evaluator::Environment;
    use crate::scheme::parse_scheme;
    use std::cell::RefCell;

    fn start(source: &str, time_slice: Duration) -> (Rc<Scheduler>, Rc<RefCell<Vec<Result<Value, Error>>>>) {
        let expr = match parse_scheme(source) {
            Ok(expr) => expr,
            Err(e) => panic!("failed to parse {source}: {e}"),
        };
        let env = crate::evaluator::create_global_env();
        let frame = FrameRef::start(Rc::clone(&env), expr, FrameRef::terminal(env));
        let scheduler = Rc::new(Scheduler::new());
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&results);
        Trampoline::new(
            frame,
            Box::new(move |result| sink.borrow_mut().push(result)),
            Rc::clone(&scheduler),
            time_slice,
        )
        .run();
        (scheduler, results)
    }

    #[test]
    fn test_short_evaluation_completes_synchronously() {
        let (scheduler, results) = start("(+ 1 2)", Duration::from_secs(60));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(*results.borrow(), vec![Ok(val(3))]);
    }

    #[test]
    fn test_zero_time_slice_yields_after_every_step() {
        let (scheduler, results) = start("(* (+ 1 2) (- 10 4))", Duration::ZERO);
        assert!(results.borrow().is_empty(), "first batch must yield");
        assert_eq!(scheduler.pending(), 1);

        let batches = 1 + scheduler.run_until_idle();
        assert!(batches > 5, "expected many small batches, got {batches}");
        assert_eq!(*results.borrow(), vec![Ok(val(18))]);
    }

    #[test]
    fn test_error_is_delivered_once() {
        let (scheduler, results) = start("(+ 1 undefined-name)", Duration::ZERO);
        scheduler.run_until_idle();
        assert_eq!(
            *results.borrow(),
            vec![Err(Error::UnboundVariable("undefined-name".into()))]
        );
    }

    #[test]
    fn test_environment_is_shared_across_batches() {
        let env = Environment::new();
        env.define(crate::symbol::Symbol::intern("x"), val(5));
        let frame = FrameRef::start(
            Rc::clone(&env),
            crate::ast::sym("x"),
            FrameRef::terminal(Rc::clone(&env)),
        );
        let scheduler = Rc::new(Scheduler::new());
        let results = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&results);
        Trampoline::new(
            frame,
            Box::new(move |result| *sink.borrow_mut() = Some(result)),
            Rc::clone(&scheduler),
            Duration::ZERO,
        )
        .run();
        scheduler.run_until_idle();
        assert_eq!(*results.borrow(), Some(Ok(val(5))));
    }
}
