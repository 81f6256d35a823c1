//! Formal parameter lists and argument binding.
//!
//! A parameter list is either a proper list of symbols `(a b c)`, a dotted
//! list `(a b . rest)`, or a bare symbol `args` that collects every argument.

use crate::ast::{TypeTag, Value, nil};
use crate::evaluator::Environment;
use crate::symbol::Symbol;
use crate::{Arity, Error};

#[derive(Debug, Clone)]
pub struct Arguments {
    /// The parameter list as written, kept for printing
    definition: Value,
    fixed: Vec<Symbol>,
    rest: Option<Symbol>,
    /// Fixed parameter count, negated and offset by one when a rest
    /// parameter is present
    arity: isize,
}

impl Arguments {
    pub fn parse(definition: &Value) -> Result<Self, Error> {
        let mut fixed = Vec::new();
        let mut rest = None;
        let mut current = definition.clone();
        loop {
            let next = match &current {
                Value::Symbol(name) => {
                    rest = Some(name.clone());
                    break;
                }
                Value::Pair(pair) if pair.is_null() => break,
                Value::Pair(pair) => {
                    match pair.car() {
                        Some(Value::Symbol(name)) => fixed.push(name),
                        Some(other) => {
                            return Err(Error::SyntaxError(format!(
                                "parameter `{other}' must be a symbol"
                            )));
                        }
                        None => break,
                    }
                    match pair.cdr() {
                        Some(next) => next,
                        None => break,
                    }
                }
                other => {
                    return Err(Error::SyntaxError(format!(
                        "invalid parameter list `{other}'"
                    )));
                }
            };
            current = next;
        }

        let count = fixed.len() as isize;
        let arity = if rest.is_some() { -(count + 1) } else { count };
        Ok(Arguments {
            definition: definition.clone(),
            fixed,
            rest,
            arity,
        })
    }

    pub fn arity(&self) -> Arity {
        let signed = self.signed_arity();
        if signed < 0 {
            Arity::AtLeast((-signed - 1) as usize)
        } else {
            Arity::Exact(signed as usize)
        }
    }

    pub fn signed_arity(&self) -> isize {
        self.arity
    }

    pub fn definition(&self) -> &Value {
        &self.definition
    }

    /// Bind `values` (a list) into `env`, which must be the fresh local frame
    /// of the call
    pub fn bind(&self, env: &Environment, values: &Value) -> Result<(), Error> {
        let mut remaining = values.clone();
        for name in &self.fixed {
            match (remaining.car(), remaining.cdr()) {
                (Some(value), Some(tail)) => {
                    env.define(name.clone(), value);
                    remaining = tail;
                }
                _ => return Err(Error::arity_error(self.arity(), values.list_len())),
            }
        }

        match &self.rest {
            Some(name) => {
                let rest = if remaining.is_a(TypeTag::Pair) {
                    remaining
                } else {
                    nil()
                };
                env.define(name.clone(), rest);
            }
            None if remaining.car().is_some() => {
                return Err(Error::arity_error(self.arity(), values.list_len()));
            }
            None => {}
        }
        Ok(())
    }
}
