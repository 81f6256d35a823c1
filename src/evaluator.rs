//! Environments, expression dispatch and the interpreter entry points.
//!
//! Evaluation never recurses on the native stack. [`Interpreter::evaluate`]
//! builds a two-frame chain (the expression, then a terminal return point)
//! and hands it to a [`Trampoline`]; every further step is a frame produced
//! by the previous one. See [`frame`] for the frame contract.

pub mod arguments;
pub mod closure;
pub mod continuation;
pub mod frame;
pub mod trampoline;

use crate::ast::{Value, nil};
use crate::builtinops::get_builtin_ops;
use crate::scheduler::Scheduler;
use crate::scheme::parse_program;
use crate::symbol::Symbol;
use crate::{DEFAULT_TIME_SLICE, Error};
use frame::{FrameRef, Registers};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;
use trampoline::{Callback, Trampoline};

/// Library procedures defined in Scheme and loaded at startup
const PRELUDE: &str = include_str!("prelude.scm");

/// Environment for variable bindings
#[derive(Default)]
pub struct Environment {
    bindings: RefCell<HashMap<Symbol, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// A new outermost (global) scope
    pub fn new() -> Rc<Self> {
        Rc::new(Environment::default())
    }

    /// A new scope nested inside `parent`
    pub fn extend(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Bind `name` in this scope, replacing any existing local binding
    pub fn define(&self, name: Symbol, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    pub fn lookup(&self, name: &Symbol) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            env = env.parent.as_deref()?;
        }
    }

    /// Assign to the innermost existing binding of `name`. An unbound name is
    /// defined in the global scope instead.
    pub fn mutate(&self, name: Symbol, value: Value) {
        let mut env = self;
        loop {
            let bound = env.bindings.borrow().contains_key(&name);
            match &env.parent {
                Some(parent) if !bound => env = parent.as_ref(),
                _ => {
                    env.define(name, value);
                    return;
                }
            }
        }
    }

    /// Every name visible from this scope, sorted
    pub fn binding_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        let mut env = Some(self);
        while let Some(current) = env {
            names.extend(
                current
                    .bindings
                    .borrow()
                    .keys()
                    .map(|name| name.as_str().to_owned()),
            );
            env = current.parent.as_deref();
        }
        names.into_iter().collect()
    }
}

/// Create a global environment holding `#t`, `#f` and every builtin
pub fn create_global_env() -> Rc<Environment> {
    let env = Environment::new();
    env.define(Symbol::intern("#t"), Value::Boolean(true));
    env.define(Symbol::intern("#f"), Value::Boolean(false));
    for op in get_builtin_ops() {
        env.define(Symbol::intern(op.scheme_id), Value::Procedure(op));
    }
    env
}

impl Value {
    /// Produce this value's result in `frame`
    pub(crate) fn evaluate(&self, frame: &FrameRef) -> Result<FrameRef, Error> {
        match self {
            Value::Symbol(name) => match frame.env().lookup(name) {
                Some(value) => frame.return_value(value),
                None => Err(Error::UnboundVariable(name.as_str().to_owned())),
            },
            Value::Pair(pair) if pair.is_null() => frame.return_value(nil()),
            Value::Pair(pair) => {
                let operator = pair.car().unwrap_or_else(nil);
                frame.eval(
                    operator,
                    Registers::new().exp(self.clone()).step(apply_operator),
                    Registers::new(),
                )
            }
            _ => frame.return_value(self.clone()),
        }
    }

    /// Apply this value to the unevaluated operand list `args`
    pub(crate) fn apply(&self, frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
        match self {
            Value::Procedure(op) => op.apply(frame, args),
            Value::Closure(closure) => closure::apply(closure, frame, args),
            Value::Continuation(continuation) => continuation::apply(continuation, frame, args),
            other => Err(Error::NotApplicable(other.type_name().to_owned())),
        }
    }
}

/// Step that evaluates its receiver
pub(crate) fn evaluate(receiver: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    receiver.evaluate(frame)
}

/// Step run once the operator of a combination has been evaluated
fn apply_operator(form: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let args = form.cdr().unwrap_or_else(nil);
    frame.val()?.apply(frame, &args)
}

/// Step that evaluates a body in order. All but the last expression get a
/// frame of their own; the last replaces this frame.
pub(crate) fn run_sequence(program: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let Some(first) = program.car() else {
        return frame.return_value(frame.val()?);
    };
    match program.cdr() {
        Some(rest @ Value::Pair(_)) if !rest.is_null() => frame.eval(
            first,
            Registers::new().exp(rest).step(run_sequence),
            Registers::new(),
        ),
        _ => Ok(frame.eval_tail(first)),
    }
}

/// Interpreter settings
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// How long one trampoline batch may run before yielding
    pub time_slice: Duration,
    /// Define the Scheme-level library procedures at startup
    pub load_prelude: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            time_slice: DEFAULT_TIME_SLICE,
            load_prelude: true,
        }
    }
}

/// A global environment plus the scheduler its evaluations yield to.
///
/// Cloning is cheap and clones share both.
#[derive(Clone)]
pub struct Interpreter {
    global: Rc<Environment>,
    scheduler: Rc<Scheduler>,
    config: InterpreterConfig,
}

impl Interpreter {
    pub fn new() -> Result<Self, Error> {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Result<Self, Error> {
        Self::with_scheduler(config, Rc::new(Scheduler::new()))
    }

    /// Build an interpreter whose evaluations queue on an existing scheduler
    pub fn with_scheduler(
        config: InterpreterConfig,
        scheduler: Rc<Scheduler>,
    ) -> Result<Self, Error> {
        let interpreter = Interpreter {
            global: create_global_env(),
            scheduler,
            config,
        };
        if interpreter.config.load_prelude {
            let program = parse_program(PRELUDE)?;
            log::debug!("loading prelude ({} definitions)", program.len());
            interpreter.run_program(program)?;
        }
        Ok(interpreter)
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    pub fn global_environment(&self) -> &Rc<Environment> {
        &self.global
    }

    /// Bind a host-provided value in the global scope
    pub fn define_global(&self, name: &str, value: Value) {
        self.global.define(Symbol::intern(name), value);
    }

    /// Evaluate `expr` in the global scope. The first batch runs before this
    /// returns; if it yields, the rest runs from the scheduler. `callback`
    /// receives the result or the first error, exactly once.
    pub fn evaluate<F>(&self, expr: Value, callback: F)
    where
        F: FnOnce(Result<Value, Error>) + 'static,
    {
        self.evaluate_boxed(expr, Box::new(callback));
    }

    fn evaluate_boxed(&self, expr: Value, callback: Callback) {
        log::trace!("evaluating {expr}");
        let end = FrameRef::terminal(Rc::clone(&self.global));
        let frame = FrameRef::start(Rc::clone(&self.global), expr, end);
        Trampoline::new(
            frame,
            callback,
            Rc::clone(&self.scheduler),
            self.config.time_slice,
        )
        .run();
    }

    /// Evaluate each expression of `program` in order and report the last
    /// result, or the first error. An empty program yields
    /// [`Value::Unspecified`].
    pub fn run<F>(&self, program: Vec<Value>, callback: F)
    where
        F: FnOnce(Result<Value, Error>) + 'static,
    {
        self.run_from(program.into(), Value::Unspecified, Box::new(callback));
    }

    fn run_from(&self, mut program: VecDeque<Value>, previous: Value, callback: Callback) {
        let Some(expr) = program.pop_front() else {
            callback(Ok(previous));
            return;
        };
        let interpreter = self.clone();
        self.evaluate_boxed(
            expr,
            Box::new(move |result| match result {
                // Later expressions start from the queue to keep the native stack flat.
                Ok(value) => {
                    let queue = Rc::clone(&interpreter.scheduler);
                    queue.defer(move || interpreter.run_from(program, value, callback));
                }
                Err(error) => callback(Err(error)),
            }),
        );
    }

    /// Evaluate `expr` and drive the scheduler until it finishes
    pub fn eval(&self, expr: &Value) -> Result<Value, Error> {
        let (slot, sink) = result_slot();
        self.evaluate(expr.clone(), sink);
        self.wait_for(&slot)
    }

    /// Run `program` and drive the scheduler until it finishes
    pub fn run_program(&self, program: Vec<Value>) -> Result<Value, Error> {
        let (slot, sink) = result_slot();
        self.run(program, sink);
        self.wait_for(&slot)
    }

    /// Parse and run `source`, returning the value of its last expression
    pub fn run_source(&self, source: &str) -> Result<Value, Error> {
        self.run_program(parse_program(source)?)
    }

    fn wait_for(&self, slot: &ResultSlot) -> Result<Value, Error> {
        loop {
            if let Some(result) = slot.borrow_mut().take() {
                return result;
            }
            if !self.scheduler.run_one() {
                return Err(Error::EvalError(
                    "scheduler went idle before the evaluation finished".into(),
                ));
            }
        }
    }
}

type ResultSlot = Rc<RefCell<Option<Result<Value, Error>>>>;

fn result_slot() -> (ResultSlot, impl FnOnce(Result<Value, Error>) + 'static) {
    let slot: ResultSlot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    (slot, move |result| *sink.borrow_mut() = Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{sym, val};
    use crate::scheme::parse_scheme;
    use crate::{Arity, ParseError, ParseErrorKind};

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        Success(Value),
        SpecificError(&'static str),
        AnyError,
    }
    use TestResult::*;

    fn success<T: Into<Value>>(value: T) -> TestResult {
        Success(value.into())
    }

    fn interpreter() -> Interpreter {
        match Interpreter::new() {
            Ok(interpreter) => interpreter,
            Err(e) => panic!("failed to start interpreter: {e}"),
        }
    }

    fn run_cases(interpreter: &Interpreter, cases: Vec<(&str, TestResult)>) {
        for (i, (source, expected)) in cases.into_iter().enumerate() {
            let result = interpreter.run_source(source);
            match (&result, &expected) {
                (Ok(actual), Success(value)) => {
                    assert_eq!(actual, value, "case #{} {source}", i + 1);
                }
                (Err(e), SpecificError(fragment)) => assert!(
                    e.to_string().contains(fragment),
                    "case #{} {source}: error `{e}' should mention `{fragment}'",
                    i + 1
                ),
                (Err(_), AnyError) => {}
                _ => panic!(
                    "case #{} {source}: expected {expected:?}, got {result:?}",
                    i + 1
                ),
            }
        }
    }

    #[test]
    fn test_end_to_end_scenarios() {
        let interpreter = interpreter();
        run_cases(
            &interpreter,
            vec![
                ("(+ 1 2)", success(3)),
                ("(if (> 3 2) 'yes 'no)", success(sym("yes"))),
                ("(define (f x) (* x x)) (f 5)", success(25)),
                ("(call/cc (lambda (k) (+ 1 (k 10))))", success(10)),
                ("(let ((x 1) (y 2)) (+ x y))", success(3)),
                (
                    "(letrec ((f (lambda (n) (if (= n 0) 1 (* n (f (- n 1))))))) (f 5))",
                    success(120),
                ),
                ("(car '())", SpecificError("`car' expects a pair argument")),
            ],
        );
    }

    #[test]
    fn test_evaluation_basics() {
        let interpreter = interpreter();
        run_cases(
            &interpreter,
            vec![
                ("42", success(42)),
                ("\"text\"", success("text")),
                ("#t", success(true)),
                ("#f", success(false)),
                ("'sym", success(sym("sym"))),
                ("'(1 2 3)", success([1, 2, 3])),
                ("()", success(nil())),
                ("", Success(Value::Unspecified)),
                ("1 2 3", success(3)),
                ("undefined-name", SpecificError("unbound variable `undefined-name'")),
                ("(1 2)", SpecificError("can't apply Number")),
                ("(\"f\")", SpecificError("can't apply String")),
                ("('x)", SpecificError("can't apply Symbol")),
                ("(define x 1) (undefined-fn x)", AnyError),
            ],
        );
    }

    #[test]
    fn test_errors_stop_a_program() {
        let interpreter = interpreter();
        let result = interpreter.run_source("(define a 1) (car 5) (define b 2)");
        assert!(matches!(result, Err(crate::Error::TypeError(_))));
        assert_eq!(interpreter.run_source("a"), Ok(val(1)));
        assert!(matches!(
            interpreter.run_source("b"),
            Err(crate::Error::UnboundVariable(_))
        ));
    }

    #[test]
    fn test_tail_calls_run_in_constant_space() {
        let interpreter = interpreter();
        let result = interpreter.run_source(
            "(define (loop n acc) (if (= n 0) acc (loop (- n 1) (+ acc 1))))
             (loop 100000 0)",
        );
        assert_eq!(result, Ok(val(100000)));

        // mutual recursion through a conditional
        let result = interpreter.run_source(
            "(define (even? n) (if (= n 0) #t (odd? (- n 1))))
             (define (odd? n) (if (= n 0) #f (even? (- n 1))))
             (even? 10001)",
        );
        assert_eq!(result, Ok(val(false)));
    }

    #[test]
    fn test_deep_non_tail_recursion() {
        let interpreter = interpreter();
        let result = interpreter.run_source(
            "(define (count n) (if (= n 0) 0 (+ 1 (count (- n 1)))))
             (count 50000)",
        );
        assert_eq!(result, Ok(val(50000)));
    }

    #[test]
    fn test_environment_scoping() {
        let global = Environment::new();
        let x = Symbol::intern("x");
        let y = Symbol::intern("y");
        global.define(x.clone(), val(1));

        let local = Environment::extend(&global);
        assert_eq!(local.lookup(&x), Some(val(1)));
        local.define(x.clone(), val(2));
        assert_eq!(local.lookup(&x), Some(val(2)), "local definition shadows");
        assert_eq!(global.lookup(&x), Some(val(1)));

        let inner = Environment::extend(&local);
        inner.mutate(x.clone(), val(3));
        assert_eq!(local.lookup(&x), Some(val(3)), "mutation finds nearest binding");
        assert_eq!(global.lookup(&x), Some(val(1)));
        assert_eq!(inner.binding_names(), vec!["x".to_owned()]);

        // assigning an unbound name creates a global binding
        inner.mutate(y.clone(), val(4));
        assert_eq!(global.lookup(&y), Some(val(4)));
        assert!(local.bindings.borrow().get(&y).is_none());
        assert!(global.is_global());
        assert!(!inner.is_global());
    }

    #[test]
    fn test_set_on_unbound_name_defines_globally() {
        let interpreter = interpreter();
        let result = interpreter.run_source(
            "(define (assign) (set! fresh-global-name 7))
             (assign)
             fresh-global-name",
        );
        assert_eq!(result, Ok(val(7)));
    }

    #[test]
    fn test_define_global_and_binding_names() {
        let interpreter = interpreter();
        interpreter.define_global("host-value", val(99));
        assert_eq!(interpreter.run_source("(+ host-value 1)"), Ok(val(100)));

        let names = interpreter.global_environment().binding_names();
        for name in ["car", "call/cc", "map", "host-value", "#t"] {
            assert!(names.iter().any(|n| n == name), "missing {name}");
        }
    }

    #[test]
    fn test_prelude_can_be_disabled() {
        let config = InterpreterConfig {
            load_prelude: false,
            ..InterpreterConfig::default()
        };
        let interpreter = match Interpreter::with_config(config) {
            Ok(interpreter) => interpreter,
            Err(e) => panic!("failed to start interpreter: {e}"),
        };
        assert!(matches!(
            interpreter.run_source("(list 1 2)"),
            Err(crate::Error::UnboundVariable(name)) if name == "list"
        ));
        assert_eq!(interpreter.run_source("(cons 1 '(2))"), Ok(Value::from([1, 2])));
    }

    #[test]
    fn test_callback_api_delivers_once() {
        let interpreter = interpreter();
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&results);
        let expr = match parse_scheme("(+ 20 22)") {
            Ok(expr) => expr,
            Err(e) => panic!("{e}"),
        };
        interpreter.evaluate(expr, move |result| sink.borrow_mut().push(result));
        interpreter.scheduler().run_until_idle();
        assert_eq!(*results.borrow(), vec![Ok(val(42))]);
    }

    #[test]
    fn test_program_forms_run_in_order() {
        let interpreter = interpreter();
        let program = match parse_program(
            "(define seen '()) (set! seen (cons 1 seen)) (set! seen (cons 2 seen)) seen",
        ) {
            Ok(program) => program,
            Err(e) => panic!("{e}"),
        };
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&results);
        interpreter.run(program, move |result| sink.borrow_mut().push(result));
        interpreter.scheduler().run_until_idle();
        assert_eq!(*results.borrow(), vec![Ok(val([2, 1]))]);

        assert_eq!(interpreter.run_program(Vec::new()), Ok(Value::Unspecified));
    }

    #[test]
    fn test_interleaved_evaluations_share_the_scheduler() {
        let config = InterpreterConfig {
            time_slice: Duration::ZERO,
            ..InterpreterConfig::default()
        };
        let interpreter = match Interpreter::with_config(config) {
            Ok(interpreter) => interpreter,
            Err(e) => panic!("failed to start interpreter: {e}"),
        };
        let order = Rc::new(RefCell::new(Vec::new()));
        for (label, source) in [("long", "(fold + 0 (range 0 200))"), ("short", "(+ 1 1)")] {
            let expr = match parse_program(source) {
                Ok(mut program) => program.remove(0),
                Err(e) => panic!("{e}"),
            };
            let sink = Rc::clone(&order);
            interpreter.evaluate(expr, move |result| sink.borrow_mut().push((label, result)));
        }
        interpreter.scheduler().run_until_idle();
        let order = order.borrow();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0], ("short", Ok(val(2))), "short evaluation finishes first");
        assert_eq!(order[1], ("long", Ok(val(20100))));
    }

    #[test]
    fn test_parse_errors_surface_from_run_source() {
        let interpreter = interpreter();
        match interpreter.run_source("(+ 1 2") {
            Err(crate::Error::ParseError(ParseError { kind, .. })) => {
                assert_eq!(kind, ParseErrorKind::Incomplete);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_closure_arity_errors() {
        let interpreter = interpreter();
        interpreter
            .run_source("(define (two a b) a) (define (some a . rest) rest)")
            .unwrap_or_else(|e| panic!("{e}"));
        let cases = vec![
            ("(two 1)", Arity::Exact(2), 1),
            ("(two 1 2 3)", Arity::Exact(2), 3),
            ("(some)", Arity::AtLeast(1), 0),
        ];
        for (source, expected, got) in cases {
            assert_eq!(
                interpreter.run_source(source),
                Err(crate::Error::arity_error(expected, got)),
                "{source}"
            );
        }
        assert_eq!(interpreter.run_source("(some 1)"), Ok(nil()));
        assert_eq!(interpreter.run_source("(some 1 2 3)"), Ok(Value::from([2, 3])));
    }
}
