//! Built-in operations registry.
//!
//! Every builtin, special forms included, is a [`BuiltinOp`] bound in the
//! global environment under its Scheme identifier. All of them receive their
//! operand list unevaluated and decide for themselves what to evaluate and in
//! which order, so `if` and `+` go through the same application path.
//!
//! ```scheme
//! (+ 1 2)                ; => 3
//! (if #f 'yes)           ; => #f
//! (string "n=" 4)        ; => "n=4"
//! (apply cons '(1 (2)))  ; => (1 2)
//! ```
//!
//! ## Operation kinds
//!
//! - **Primitive**: a step function of its own (special forms, list and
//!   string operations, `call/cc`)
//! - **Arithmetic**, **Comparison**, **Equality** and **Relation**: binary
//!   operators sharing one evaluation path; both operands are evaluated left
//!   to right, then combined. All but **Relation** require operands of the
//!   same type.
//! - **TypePredicate**: evaluate one operand and test its type
//!
//! ## Adding New Operations
//!
//! 1. Write the step functions (one to start, one per intermediate value)
//! 2. Add a `BuiltinOp` to `BUILTIN_OPS`
//! 3. Add cases to the tests below

use crate::ast::{NumberType, TypeTag, Value, nil};
use crate::evaluator::closure::Closure;
use crate::evaluator::continuation::Continuation;
use crate::evaluator::frame::{FrameRef, Registers};
use crate::evaluator::{Environment, run_sequence};
use crate::symbol::Symbol;
use crate::{Arity, Error};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

/// Entry point of a primitive: the application frame and the unevaluated
/// operand list
pub type PrimitiveFn = fn(&FrameRef, &Value) -> Result<FrameRef, Error>;

/// How a builtin consumes its operands
#[derive(Clone, Copy)]
pub enum OpKind {
    Primitive(PrimitiveFn),
    /// Numeric operator producing a number
    Arithmetic(fn(NumberType, NumberType) -> NumberType),
    /// Ordering test on two numbers
    Comparison(fn(Ordering) -> bool),
    /// `eqv?` restricted to operands of the same type
    Equality,
    /// Identity test accepting any two operands
    Relation(fn(&Value, &Value) -> bool),
    TypePredicate(TypeTag),
}

/// Definition of a built-in operation
pub struct BuiltinOp {
    /// The Scheme identifier for this operation
    pub scheme_id: &'static str,
    pub op_kind: OpKind,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.scheme_id == other.scheme_id
    }
}

impl fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinOp({})", self.scheme_id)
    }
}

impl BuiltinOp {
    pub(crate) fn apply(&'static self, frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
        match self.op_kind {
            OpKind::Primitive(primitive) => primitive(frame, args),
            OpKind::TypePredicate(_) => {
                let [operand] = exact(self.scheme_id, args)?;
                frame.eval(
                    operand,
                    Registers::new()
                        .step(type_predicate_finish)
                        .receiver(Value::Procedure(self)),
                    Registers::new(),
                )
            }
            _ => {
                let [left, right] = exact(self.scheme_id, args)?;
                frame.eval(
                    left,
                    Registers::new()
                        .exp(right)
                        .step(binary_second)
                        .receiver(Value::Procedure(self)),
                    Registers::new(),
                )
            }
        }
    }

    /// Combine the two evaluated operands of a binary operator
    fn combine(&self, a: &Value, b: &Value) -> Result<Value, Error> {
        if let OpKind::Relation(relation) = self.op_kind {
            return Ok(Value::Boolean(relation(a, b)));
        }
        if std::mem::discriminant(a) != std::mem::discriminant(b) {
            return Err(Error::TypeError(format!(
                "`{}' argument type mismatch",
                self.scheme_id
            )));
        }
        match (self.op_kind, a, b) {
            (OpKind::Arithmetic(op), Value::Number(x), Value::Number(y)) => {
                Ok(Value::Number(op(*x, *y)))
            }
            (OpKind::Comparison(test), Value::Number(x), Value::Number(y)) => {
                Ok(Value::Boolean(x.partial_cmp(y).is_some_and(test)))
            }
            (OpKind::Equality, _, _) => Ok(Value::Boolean(a.is_eqv(b))),
            _ => Err(Error::TypeError(format!(
                "`{}' not supported for {}",
                self.scheme_id,
                a.type_name()
            ))),
        }
    }
}

//
// Shared helpers
//

/// Split an operand list of exactly `N` elements
fn exact<const N: usize>(name: &str, args: &Value) -> Result<[Value; N], Error> {
    let values = args.to_vec();
    let count = values.len();
    <[Value; N]>::try_from(values).map_err(|_| Error::arity_error_in(name, Arity::Exact(N), count))
}

fn misrouted(step: &str, receiver: &Value) -> Error {
    Error::EvalError(format!("{step} invoked on {}", receiver.type_name()))
}

fn builtin(id: &str) -> Result<&'static BuiltinOp, Error> {
    find_scheme_op(id).ok_or_else(|| Error::EvalError(format!("builtin `{id}' is not registered")))
}

//
// Binary operators and type predicates
//

fn binary_second(receiver: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    frame.eval(
        frame.exp().clone(),
        Registers::new()
            .exp(frame.val()?)
            .step(binary_finish)
            .receiver(receiver.clone()),
        Registers::new(),
    )
}

fn binary_finish(receiver: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let Value::Procedure(op) = receiver else {
        return Err(misrouted("binary operator", receiver));
    };
    let result = op.combine(frame.exp(), &frame.val()?)?;
    frame.return_value(result)
}

fn type_predicate_finish(receiver: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    match receiver {
        Value::Procedure(BuiltinOp {
            op_kind: OpKind::TypePredicate(tag),
            ..
        }) => frame.return_boolean(frame.val()?.is_a(*tag)),
        other => Err(misrouted("type predicate", other)),
    }
}

//
// Special forms
//

fn quote(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [datum] = exact("quote", args)?;
    frame.return_value(datum)
}

fn if_form(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let values = args.to_vec();
    match values.as_slice() {
        [test, branches @ ..] if (1..=2).contains(&branches.len()) => frame.eval(
            test.clone(),
            Registers::new()
                .exp(Value::list(branches.to_vec()))
                .step(if_branch),
            Registers::new(),
        ),
        _ => Err(Error::arity_error_in("if", Arity::Range(2, 3), values.len())),
    }
}

fn if_branch(branches: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let test = frame.val()?;
    let branch = if test.is_truthy() {
        branches.car()
    } else {
        branches.cdr().and_then(|alternative| alternative.car())
    };
    match branch {
        Some(branch) => Ok(frame.eval_tail(branch)),
        None => frame.return_value(test),
    }
}

fn define(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let count = args.list_len();
    match args.car() {
        // (define (name . parameters) body...)
        Some(Value::Pair(signature)) if !signature.is_null() => {
            let body = args.cdr().unwrap_or_else(nil);
            if body.is_null() {
                return Err(Error::arity_error_in("define", Arity::AtLeast(2), count));
            }
            let name = signature.car().unwrap_or_else(nil);
            let parameters = signature.cdr().unwrap_or_else(nil);
            let closure = Closure::new(&parameters, body, Rc::clone(frame.env()))?;
            define_finish(
                &name,
                &frame.extend(
                    Registers::new()
                        .exp(name.clone())
                        .val(Value::Closure(Rc::new(closure))),
                ),
            )
        }
        _ => {
            let [name, value] = exact("define", args)?;
            frame.eval(
                value,
                Registers::new().exp(name).step(define_finish),
                Registers::new(),
            )
        }
    }
}

fn define_finish(name: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let Value::Symbol(name) = name else {
        return Err(Error::SyntaxError(format!(
            "`define' name argument must be a symbol, got `{name}'"
        )));
    };
    let value = frame.val()?;
    frame.env().define(name.clone(), value.clone());
    frame.return_value(value)
}

fn set(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [name, value] = exact("set!", args)?;
    if !matches!(name, Value::Symbol(_)) {
        return Err(Error::SyntaxError(
            "first argument of `set!' must be a symbol".into(),
        ));
    }
    frame.eval(
        value,
        Registers::new().exp(name).step(set_finish),
        Registers::new(),
    )
}

fn set_finish(name: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let Value::Symbol(name) = name else {
        return Err(misrouted("set!", name));
    };
    let value = frame.val()?;
    frame.env().mutate(name.clone(), value.clone());
    frame.return_value(value)
}

fn lambda(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    match (args.car(), args.cdr()) {
        (Some(parameters), Some(body)) if !body.is_null() => {
            let closure = Closure::new(&parameters, body, Rc::clone(frame.env()))?;
            frame.return_value(Value::Closure(Rc::new(closure)))
        }
        _ => Err(Error::arity_error_in(
            "lambda",
            Arity::AtLeast(2),
            args.list_len(),
        )),
    }
}

fn begin(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    Ok(frame.extend(
        Registers::new()
            .exp(args.clone())
            .env(Environment::extend(frame.env()))
            .step(run_sequence)
            .val(nil()),
    ))
}

fn and(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    Ok(frame.extend(
        Registers::new()
            .exp(args.clone())
            .step(and_next)
            .val(Value::Boolean(true)),
    ))
}

fn and_next(remaining: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    match (remaining.car(), remaining.cdr()) {
        (Some(first), Some(rest)) => frame.eval(
            first,
            Registers::new().exp(rest).step(and_check),
            Registers::new(),
        ),
        _ => frame.return_value(frame.val()?),
    }
}

fn and_check(remaining: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let value = frame.val()?;
    if value.is_truthy() {
        and_next(remaining, frame)
    } else {
        frame.return_value(value)
    }
}

fn or(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    Ok(frame.extend(
        Registers::new()
            .exp(args.clone())
            .step(or_next)
            .val(Value::Boolean(false)),
    ))
}

fn or_next(remaining: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    match (remaining.car(), remaining.cdr()) {
        (Some(first), Some(rest)) => frame.eval(
            first,
            Registers::new().exp(rest).step(or_check),
            Registers::new(),
        ),
        _ => frame.return_value(frame.val()?),
    }
}

fn or_check(remaining: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let value = frame.val()?;
    if value.is_truthy() {
        frame.return_value(value)
    } else {
        or_next(remaining, frame)
    }
}

struct Bindings {
    names: Vec<Symbol>,
    inits: Vec<Value>,
    body: Value,
}

/// Split `((name init) ...) body...`
fn parse_bindings(form: &str, args: &Value) -> Result<Bindings, Error> {
    let invalid = |binding: &Value| {
        Error::SyntaxError(format!("`{form}' binding `{binding}': syntax is invalid"))
    };
    let Some(bindings) = args.car() else {
        return Err(Error::arity_error_in(form, Arity::AtLeast(2), 0));
    };
    if !bindings.is_a(TypeTag::Pair) {
        return Err(invalid(&bindings));
    }

    let mut names = Vec::new();
    let mut inits = Vec::new();
    for binding in bindings.to_vec() {
        match (binding.car(), binding.cdr().and_then(|rest| rest.car())) {
            (Some(Value::Symbol(name)), Some(init)) => {
                names.push(name);
                inits.push(init);
            }
            _ => return Err(invalid(&binding)),
        }
    }
    Ok(Bindings {
        names,
        inits,
        body: args.cdr().unwrap_or_else(nil),
    })
}

/// `(let ((x a) (y b)) body...)` runs as `((lambda (x y) body...) a b)`
fn let_form(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let Bindings { names, inits, body } = parse_bindings("let", args)?;
    let parameters = Value::list(names.into_iter().map(Value::Symbol).collect());
    let closure = Closure::new(&parameters, body, Rc::clone(frame.env()))?;
    let mut form = vec![Value::Closure(Rc::new(closure))];
    form.extend(inits);
    Ok(frame.eval_tail(Value::list(form)))
}

/// Every name is bound to a placeholder before any initializer runs, then
/// each is assigned in order ahead of the body.
fn letrec(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let Bindings { names, inits, body } = parse_bindings("letrec", args)?;
    let env = Environment::extend(frame.env());
    let assign = Value::Procedure(builtin("set!")?);

    let mut program = Vec::with_capacity(names.len());
    for (name, init) in names.into_iter().zip(inits) {
        env.define(name.clone(), Value::Unspecified);
        program.push(Value::list(vec![assign.clone(), Value::Symbol(name), init]));
    }
    program.extend(body.to_vec());

    Ok(frame.extend(
        Registers::new()
            .exp(Value::list(program))
            .env(env)
            .step(run_sequence)
            .val(nil()),
    ))
}

//
// Procedures
//

fn call_cc(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [receiver] = exact("call/cc", args)?;
    frame.eval(
        receiver,
        Registers::new().step(call_cc_invoke),
        Registers::new(),
    )
}

fn call_cc_invoke(_: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let continuation = Continuation::capture(frame.next()?);
    frame
        .val()?
        .apply(frame, &Value::list(vec![Value::Continuation(continuation)]))
}

fn apply(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [procedure, list] = exact("apply", args)?;
    frame.eval(
        procedure,
        Registers::new().exp(list).step(apply_list),
        Registers::new(),
    )
}

fn apply_list(list: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    frame.eval(
        list.clone(),
        Registers::new().exp(frame.val()?).step(apply_call),
        Registers::new(),
    )
}

fn apply_call(procedure: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let Value::Pair(list) = frame.val()? else {
        return Err(Error::TypeError(
            "`apply' second argument must be a list".into(),
        ));
    };
    // The elements are already values; quote the ones that would not
    // evaluate to themselves.
    let quote = Value::Procedure(builtin("quote")?);
    let operands = list
        .to_vec()
        .into_iter()
        .map(|value| match value {
            Value::Symbol(_) | Value::Pair(_) => Value::list(vec![quote.clone(), value]),
            other => other,
        })
        .collect();
    procedure.apply(frame, &Value::list(operands))
}

fn car(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [pair] = exact("car", args)?;
    frame.eval(pair, Registers::new().step(car_finish), Registers::new())
}

fn car_finish(_: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    match frame.val()? {
        Value::Pair(pair) if !pair.is_null() => frame.return_value(pair.car().unwrap_or_else(nil)),
        _ => Err(Error::TypeError("`car' expects a pair argument".into())),
    }
}

fn cdr(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [pair] = exact("cdr", args)?;
    frame.eval(pair, Registers::new().step(cdr_finish), Registers::new())
}

fn cdr_finish(_: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    match frame.val()? {
        Value::Pair(pair) if !pair.is_null() => frame.return_value(pair.cdr().unwrap_or_else(nil)),
        _ => Err(Error::TypeError("`cdr' expects a pair argument".into())),
    }
}

fn cons(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [head, tail] = exact("cons", args)?;
    frame.eval(
        head,
        Registers::new().exp(tail).step(cons_second),
        Registers::new(),
    )
}

fn cons_second(tail: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    frame.eval(
        tail.clone(),
        Registers::new().exp(frame.val()?).step(cons_finish),
        Registers::new(),
    )
}

fn cons_finish(head: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let pair = crate::ast::Pair::new(head.clone(), frame.val()?);
    frame.return_value(Value::Pair(pair))
}

fn append(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    Ok(frame.extend(
        Registers::new()
            .exp(args.clone())
            .step(append_next)
            .val(nil()),
    ))
}

fn append_next(remaining: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    match (remaining.car(), remaining.cdr()) {
        (Some(first), Some(rest)) => frame.eval(
            first,
            Registers::new()
                .exp(rest)
                .step(append_collect)
                .receiver(frame.val()?),
            Registers::new(),
        ),
        _ => frame.return_value(frame.val()?),
    }
}

fn append_collect(collected: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    let value = frame.val()?;
    let appended = match collected {
        Value::Pair(pair) => Value::Pair(pair.append(&value)),
        other => Value::list(vec![other.clone(), value]),
    };
    Ok(frame.extend(Registers::new().val(appended).step(append_next)))
}

fn not(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [operand] = exact("not", args)?;
    frame.eval(operand, Registers::new().step(not_finish), Registers::new())
}

fn not_finish(_: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    frame.return_boolean(!frame.val()?.is_truthy())
}

fn null(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    let [operand] = exact("null?", args)?;
    frame.eval(operand, Registers::new().step(null_finish), Registers::new())
}

fn null_finish(_: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    frame.return_boolean(frame.val()?.is_null())
}

fn string(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    Ok(frame.extend(
        Registers::new()
            .exp(args.clone())
            .step(string_next)
            .val(Value::string("")),
    ))
}

fn string_next(remaining: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    concat_next(remaining, frame, string_collect, Value::string)
}

fn string_collect(text: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    concat_collect(text, frame, string_next)
}

fn symbol(frame: &FrameRef, args: &Value) -> Result<FrameRef, Error> {
    Ok(frame.extend(
        Registers::new()
            .exp(args.clone())
            .step(symbol_next)
            .val(Value::string("")),
    ))
}

fn symbol_next(remaining: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    concat_next(remaining, frame, symbol_collect, Value::symbol)
}

fn symbol_collect(text: &Value, frame: &FrameRef) -> Result<FrameRef, Error> {
    concat_collect(text, frame, symbol_next)
}

/// Evaluate the next operand of `string` or `symbol`, or finish with the
/// text gathered so far
fn concat_next(
    remaining: &Value,
    frame: &FrameRef,
    collect: fn(&Value, &FrameRef) -> Result<FrameRef, Error>,
    finish: fn(&str) -> Value,
) -> Result<FrameRef, Error> {
    match (remaining.car(), remaining.cdr()) {
        (Some(first), Some(rest)) => frame.eval(
            first,
            Registers::new()
                .exp(rest)
                .step(collect)
                .receiver(frame.val()?),
            Registers::new(),
        ),
        _ => frame.return_value(finish(&frame.val()?.to_text())),
    }
}

fn concat_collect(
    text: &Value,
    frame: &FrameRef,
    next: fn(&Value, &FrameRef) -> Result<FrameRef, Error>,
) -> Result<FrameRef, Error> {
    let joined = text.to_text() + &frame.val()?.to_text();
    Ok(frame.extend(Registers::new().val(Value::from(joined)).step(next)))
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    vec![
        // Special forms
        BuiltinOp {
            scheme_id: "quote",
            op_kind: OpKind::Primitive(quote),
        },
        BuiltinOp {
            scheme_id: "if",
            op_kind: OpKind::Primitive(if_form),
        },
        BuiltinOp {
            scheme_id: "define",
            op_kind: OpKind::Primitive(define),
        },
        BuiltinOp {
            scheme_id: "set!",
            op_kind: OpKind::Primitive(set),
        },
        BuiltinOp {
            scheme_id: "lambda",
            op_kind: OpKind::Primitive(lambda),
        },
        BuiltinOp {
            scheme_id: "begin",
            op_kind: OpKind::Primitive(begin),
        },
        BuiltinOp {
            scheme_id: "and",
            op_kind: OpKind::Primitive(and),
        },
        BuiltinOp {
            scheme_id: "or",
            op_kind: OpKind::Primitive(or),
        },
        BuiltinOp {
            scheme_id: "let",
            op_kind: OpKind::Primitive(let_form),
        },
        BuiltinOp {
            scheme_id: "letrec",
            op_kind: OpKind::Primitive(letrec),
        },
        // Control
        BuiltinOp {
            scheme_id: "call/cc",
            op_kind: OpKind::Primitive(call_cc),
        },
        BuiltinOp {
            scheme_id: "apply",
            op_kind: OpKind::Primitive(apply),
        },
        // Lists
        BuiltinOp {
            scheme_id: "car",
            op_kind: OpKind::Primitive(car),
        },
        BuiltinOp {
            scheme_id: "cdr",
            op_kind: OpKind::Primitive(cdr),
        },
        BuiltinOp {
            scheme_id: "cons",
            op_kind: OpKind::Primitive(cons),
        },
        BuiltinOp {
            scheme_id: "append",
            op_kind: OpKind::Primitive(append),
        },
        BuiltinOp {
            scheme_id: "null?",
            op_kind: OpKind::Primitive(null),
        },
        BuiltinOp {
            scheme_id: "not",
            op_kind: OpKind::Primitive(not),
        },
        // Strings and symbols
        BuiltinOp {
            scheme_id: "string",
            op_kind: OpKind::Primitive(string),
        },
        BuiltinOp {
            scheme_id: "symbol",
            op_kind: OpKind::Primitive(symbol),
        },
        // Identity
        BuiltinOp {
            scheme_id: "eq?",
            op_kind: OpKind::Relation(Value::is_eq),
        },
        BuiltinOp {
            scheme_id: "eqv?",
            op_kind: OpKind::Relation(Value::is_eqv),
        },
        // Arithmetic operations
        BuiltinOp {
            scheme_id: "+",
            op_kind: OpKind::Arithmetic(|a, b| a + b),
        },
        BuiltinOp {
            scheme_id: "-",
            op_kind: OpKind::Arithmetic(|a, b| a - b),
        },
        BuiltinOp {
            scheme_id: "*",
            op_kind: OpKind::Arithmetic(|a, b| a * b),
        },
        BuiltinOp {
            scheme_id: "/",
            op_kind: OpKind::Arithmetic(|a, b| a / b),
        },
        BuiltinOp {
            scheme_id: "%",
            op_kind: OpKind::Arithmetic(|a, b| a % b),
        },
        // Comparison operations
        BuiltinOp {
            scheme_id: "=",
            op_kind: OpKind::Equality,
        },
        BuiltinOp {
            scheme_id: ">",
            op_kind: OpKind::Comparison(Ordering::is_gt),
        },
        BuiltinOp {
            scheme_id: "<",
            op_kind: OpKind::Comparison(Ordering::is_lt),
        },
        BuiltinOp {
            scheme_id: ">=",
            op_kind: OpKind::Comparison(Ordering::is_ge),
        },
        BuiltinOp {
            scheme_id: "<=",
            op_kind: OpKind::Comparison(Ordering::is_le),
        },
        // Type predicates
        BuiltinOp {
            scheme_id: "boolean?",
            op_kind: OpKind::TypePredicate(TypeTag::Boolean),
        },
        BuiltinOp {
            scheme_id: "number?",
            op_kind: OpKind::TypePredicate(TypeTag::Number),
        },
        BuiltinOp {
            scheme_id: "pair?",
            op_kind: OpKind::TypePredicate(TypeTag::Pair),
        },
        BuiltinOp {
            scheme_id: "procedure?",
            op_kind: OpKind::TypePredicate(TypeTag::Procedure),
        },
        BuiltinOp {
            scheme_id: "string?",
            op_kind: OpKind::TypePredicate(TypeTag::String),
        },
        BuiltinOp {
            scheme_id: "symbol?",
            op_kind: OpKind::TypePredicate(TypeTag::Symbol),
        },
    ]
});

/// Lazy static map from scheme_id to BuiltinOp (private - use find_scheme_op)
static BUILTIN_SCHEME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.scheme_id, op)).collect()
});

/// Get all builtin operations (for building the global environment)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its Scheme identifier
pub fn find_scheme_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_SCHEME.get(id).copied()
}
