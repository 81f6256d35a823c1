//! This module defines the runtime value hierarchy. Every piece of data the
//! evaluator touches, including program text after reading, is a [`Value`].
//!
//! Lists are built from mutable two-slot [`Pair`] cells. A pair with both slots
//! unset is the empty list; any two such pairs are `eq?`, so "empty list" is a
//! structural test rather than a singleton. Symbols are interned (see
//! [`crate::symbol`]), strings are shared immutable buffers, and procedures come
//! in three flavours: builtins from the static registry, closures, and captured
//! continuations.
//!
//! Ergonomic helpers [`val`], [`sym`] and [`nil`] build values in code and
//! tests, and `From` conversions cover common Rust literals.

use crate::builtinops::BuiltinOp;
use crate::evaluator::closure::Closure;
use crate::evaluator::continuation::Continuation;
use crate::symbol::Symbol;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Type alias for number values in interpreter
pub type NumberType = f64;

/// Core value type in interpreter
#[derive(Clone)]
pub enum Value {
    Boolean(bool),
    /// Immutable string; identity is the shared buffer
    String(Rc<str>),
    Symbol(Symbol),
    Number(NumberType),
    Pair(Pair),
    /// Builtin procedure or special form from the static registry
    Procedure(&'static BuiltinOp),
    Closure(Rc<Closure>),
    Continuation(Rc<Continuation>),
    /// Placeholder bound by `letrec` before its initializers run, and the
    /// result of an empty program
    Unspecified,
}

/// Variant tags tested by the type predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Boolean,
    String,
    Symbol,
    Number,
    Pair,
    Procedure,
}

#[derive(Default)]
struct PairCell {
    car: Option<Value>,
    cdr: Option<Value>,
}

impl Drop for PairCell {
    // Unlink uniquely owned cells through a worklist, following both slots,
    // so neither long lists nor deeply nested ones exhaust the native stack.
    fn drop(&mut self) {
        let mut pending: Vec<Pair> = Vec::new();
        for slot in [self.car.take(), self.cdr.take()] {
            if let Some(Value::Pair(pair)) = slot {
                pending.push(pair);
            }
        }
        while let Some(pair) = pending.pop() {
            let Ok(cell) = Rc::try_unwrap(pair.0) else {
                continue;
            };
            let mut cell = cell.into_inner();
            for slot in [cell.car.take(), cell.cdr.take()] {
                if let Some(Value::Pair(pair)) = slot {
                    pending.push(pair);
                }
            }
        }
    }
}

/// A mutable cons cell
#[derive(Clone, Default)]
pub struct Pair(Rc<RefCell<PairCell>>);

impl Pair {
    /// A fresh empty list cell
    pub fn empty() -> Pair {
        Pair::default()
    }

    pub fn new(car: Value, cdr: Value) -> Pair {
        Pair(Rc::new(RefCell::new(PairCell {
            car: Some(car),
            cdr: Some(cdr),
        })))
    }

    /// A one-element list whose tail slot is left unset
    #[cfg(test)]
    pub(crate) fn single(car: Value) -> Pair {
        Pair(Rc::new(RefCell::new(PairCell {
            car: Some(car),
            cdr: None,
        })))
    }

    pub fn car(&self) -> Option<Value> {
        self.0.borrow().car.clone()
    }

    pub fn cdr(&self) -> Option<Value> {
        self.0.borrow().cdr.clone()
    }

    /// True when both slots are unset
    pub fn is_null(&self) -> bool {
        let cell = self.0.borrow();
        cell.car.is_none() && cell.cdr.is_none()
    }

    pub fn ptr_eq(&self, other: &Pair) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Build a proper list from a sequence
    pub fn from_vec(values: Vec<Value>) -> Pair {
        values
            .into_iter()
            .rev()
            .fold(Pair::empty(), |tail, value| Pair::new(value, Value::Pair(tail)))
    }

    /// Collect the cars of this list. An improper tail is dropped.
    pub fn to_vec(&self) -> Vec<Value> {
        let mut values = Vec::new();
        let mut pair = Some(self.clone());
        while let Some(current) = pair.take() {
            if current.is_null() {
                break;
            }
            let (car, cdr) = {
                let cell = current.0.borrow();
                (cell.car.clone(), cell.cdr.clone())
            };
            values.push(car.unwrap_or_else(nil));
            if let Some(Value::Pair(next)) = cdr {
                pair = Some(next);
            }
        }
        values
    }

    /// Copy this list's elements followed by `value`'s elements (or `value`
    /// itself when it is not a list) into a fresh list
    pub fn append(&self, value: &Value) -> Pair {
        let mut values = self.to_vec();
        match value {
            Value::Pair(pair) => values.extend(pair.to_vec()),
            other => values.push(other.clone()),
        }
        Pair::from_vec(values)
    }

    /// A fresh list with the elements in reverse order. A non-pair tail is
    /// treated as a final element.
    pub fn reverse(&self) -> Pair {
        let mut result = Pair::empty();
        let mut current = Some(Value::Pair(self.clone()));
        while let Some(value) = current.take() {
            match value {
                Value::Pair(pair) => {
                    if pair.is_null() {
                        break;
                    }
                    result = Pair::new(pair.car().unwrap_or_else(nil), Value::Pair(result));
                    current = pair.cdr();
                }
                other => result = Pair::new(other, Value::Pair(result)),
            }
        }
        result
    }

    /// Number of cells in the spine, stopping at the first non-pair tail
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut current = Some(self.clone());
        while let Some(pair) = current.take() {
            if pair.is_null() {
                break;
            }
            count += 1;
            if let Some(Value::Pair(next)) = pair.cdr() {
                current = Some(next);
            }
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.is_null()
    }

    /// Matches the two-element shape `(quote x)`
    fn quoted(&self) -> Option<Value> {
        let Some(Value::Symbol(head)) = self.car() else {
            return None;
        };
        if head.as_str() != "quote" {
            return None;
        }
        match self.cdr() {
            Some(Value::Pair(rest)) if !rest.is_null() => match rest.cdr() {
                None => rest.car(),
                Some(Value::Pair(tail)) if tail.is_null() => rest.car(),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Pending output while printing a list
enum Piece {
    Datum(Value),
    /// The cell whose car was just printed
    Rest(Pair),
    Text(&'static str),
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Piece::Datum(Value::Pair(self.clone()))];
        while let Some(piece) = stack.pop() {
            match piece {
                Piece::Text(text) => f.write_str(text)?,
                Piece::Datum(Value::Pair(pair)) => {
                    if let Some(quoted) = pair.quoted() {
                        f.write_str("'")?;
                        stack.push(Piece::Datum(quoted));
                    } else if pair.is_null() {
                        f.write_str("()")?;
                    } else {
                        f.write_str("(")?;
                        stack.push(Piece::Rest(pair.clone()));
                        stack.push(Piece::Datum(pair.car().unwrap_or_else(nil)));
                    }
                }
                Piece::Datum(other) => write!(f, "{other}")?,
                Piece::Rest(pair) => match pair.cdr() {
                    Some(Value::Pair(next)) if !next.is_null() => {
                        f.write_str(" ")?;
                        stack.push(Piece::Rest(next.clone()));
                        stack.push(Piece::Datum(next.car().unwrap_or_else(nil)));
                    }
                    Some(Value::Pair(_)) | None => f.write_str(")")?,
                    Some(tail) => {
                        f.write_str(" . ")?;
                        stack.push(Piece::Text(")"));
                        stack.push(Piece::Datum(tail));
                    }
                },
            }
        }
        Ok(())
    }
}

impl Value {
    /// Everything except `#f` counts as true
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false))
    }

    /// Check if a value is the empty list
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Pair(pair) if pair.is_null())
    }

    /// Head of a non-empty pair
    pub fn car(&self) -> Option<Value> {
        match self {
            Value::Pair(pair) if !pair.is_null() => pair.car(),
            _ => None,
        }
    }

    /// Tail of a non-empty pair; an unset tail reads as the empty list
    pub fn cdr(&self) -> Option<Value> {
        match self {
            Value::Pair(pair) if !pair.is_null() => Some(pair.cdr().unwrap_or_else(nil)),
            _ => None,
        }
    }

    /// Number of elements in a list value (0 for non-lists)
    pub fn list_len(&self) -> usize {
        match self {
            Value::Pair(pair) => pair.len(),
            _ => 0,
        }
    }

    /// Identity comparison (`eq?`)
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a.ptr_eq(b),
            (Value::Pair(a), Value::Pair(b)) => a.ptr_eq(b) || (a.is_null() && b.is_null()),
            (Value::Procedure(a), Value::Procedure(b)) => std::ptr::eq(*a, *b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Continuation(a), Value::Continuation(b)) => Rc::ptr_eq(a, b),
            (Value::Unspecified, Value::Unspecified) => true,
            _ => false,
        }
    }

    /// `eq?`, widened to compare the payload of same-typed scalars (`eqv?`)
    pub fn is_eqv(&self, other: &Value) -> bool {
        if self.is_eq(other) {
            return true;
        }
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }

    /// Check the variant tag used by the type predicates
    pub fn is_a(&self, tag: TypeTag) -> bool {
        match tag {
            TypeTag::Boolean => matches!(self, Value::Boolean(_)),
            TypeTag::String => matches!(self, Value::String(_)),
            TypeTag::Symbol => matches!(self, Value::Symbol(_)),
            TypeTag::Number => matches!(self, Value::Number(_)),
            TypeTag::Pair => matches!(self, Value::Pair(_)),
            TypeTag::Procedure => matches!(
                self,
                Value::Procedure(_) | Value::Closure(_) | Value::Continuation(_)
            ),
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Number(_) => "Number",
            Value::Pair(_) => "Pair",
            Value::Procedure(_) => "Procedure",
            Value::Closure(_) => "Closure",
            Value::Continuation(_) => "Continuation",
            Value::Unspecified => "Unspecified",
        }
    }

    /// Text used when a value is spliced into a string: strings and symbols
    /// contribute their raw text, everything else its printed form
    pub fn to_text(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            Value::Symbol(s) => s.as_str().to_owned(),
            other => other.to_string(),
        }
    }

    pub fn string(text: &str) -> Value {
        Value::String(Rc::from(text))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::intern(name))
    }

    /// A proper list of the given values
    pub fn list(values: Vec<Value>) -> Value {
        Value::Pair(Pair::from_vec(values))
    }

    /// The elements of a list value (empty for non-lists)
    pub fn to_vec(&self) -> Vec<Value> {
        match self {
            Value::Pair(pair) => pair.to_vec(),
            _ => Vec::new(),
        }
    }
}

fn fmt_number(n: NumberType, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Integral values print without a fractional part.
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::Pair(pair) => write!(f, "{pair}"),
            Value::Procedure(op) => write!(f, "#<Procedure: {}>", op.scheme_id),
            Value::Closure(closure) => write!(f, "#<Closure: {}>", closure.parameters()),
            Value::Continuation(_) => write!(f, "#<Continuation>"),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Pair(pair) => write!(f, "Pair{pair}"),
            other => write!(f, "{other}"),
        }
    }
}

/// Structural equality, for tests and host code. Scalars compare by payload,
/// lists element-wise, procedures by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        while let Some((a, b)) = pending.pop() {
            let same = match (&a, &b) {
                (Value::Pair(x), Value::Pair(y)) => {
                    if x.ptr_eq(y) {
                        continue;
                    }
                    match (x.is_null(), y.is_null()) {
                        (true, true) => continue,
                        (false, false) => {}
                        _ => return false,
                    }
                    // An unset tail reads as the empty list.
                    pending.push((x.cdr().unwrap_or_else(nil), y.cdr().unwrap_or_else(nil)));
                    pending.push((x.car().unwrap_or_else(nil), y.car().unwrap_or_else(nil)));
                    true
                }
                (Value::Number(x), Value::Number(y)) => x == y,
                (Value::String(x), Value::String(y)) => x == y,
                _ => a.is_eq(&b),
            };
            if !same {
                return false;
            }
        }
        true
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

impl From<Pair> for Value {
    fn from(pair: Pair) -> Self {
        Value::Pair(pair)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(n as NumberType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(|x| x.into()).collect())
    }
}

/// Helper function for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::symbol(name.as_ref())
}

/// Helper function for creating Values from Rust literals
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating a fresh empty list
pub fn nil() -> Value {
    Value::Pair(Pair::empty())
}
