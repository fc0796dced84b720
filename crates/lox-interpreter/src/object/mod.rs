mod callable;
mod class;
mod function;
mod instance;
mod native;

use std::fmt::{self, Display, Formatter};
use std::io::Write;

pub use callable::Callable;
pub use class::Class;
pub use function::Function;
use gc::{Finalize, Trace};
pub use instance::Instance;
use lox_common::error::{AttributeError, Result, TypeError};
use lox_common::types::Span;
pub use native::Native;

use crate::Interpreter;

#[derive(Clone, Debug, Finalize, Trace)]
pub enum Object {
    Bool(bool),
    Class(Class),
    Function(Function),
    Instance(Instance),
    Native(Native),
    Nil,
    Number(f64),
    String(String),
}

impl Object {
    /// Truthiness: `nil` and `false` are falsy, everything else is truthy.
    pub fn bool(&self) -> bool {
        !matches!(self, Object::Nil | Object::Bool(false))
    }

    pub fn type_(&self) -> String {
        match self {
            Object::Bool(_) => "bool".to_string(),
            Object::Class(_) => "class".to_string(),
            Object::Function(_) | Object::Native(_) => "function".to_string(),
            Object::Instance(instance) => instance.class().name().to_string(),
            Object::Nil => "nil".to_string(),
            Object::Number(_) => "number".to_string(),
            Object::String(_) => "string".to_string(),
        }
    }

    /// Property access: fields first, then methods along the superclass
    /// chain, bound to the receiver.
    pub fn get(&self, name: &str, span: &Span) -> Result<Object> {
        let instance = match self {
            Object::Instance(instance) => instance,
            _ => {
                return Err((
                    AttributeError::PropertyOnNonInstance { type_: self.type_(), name: name.to_string() }
                        .into(),
                    span.clone(),
                ));
            }
        };

        if let Some(object) = instance.get(name) {
            return Ok(object);
        }

        match instance.class().find_method(name) {
            Some(method) => Ok(method.bind(instance).into()),
            None => Err((
                AttributeError::NoSuchAttribute { type_: self.type_(), name: name.to_string() }.into(),
                span.clone(),
            )),
        }
    }

    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        match self {
            Object::Class(class) => class.call(interpreter, args, span),
            Object::Function(function) => function.call(interpreter, args, span),
            Object::Native(native) => native.call(interpreter, args, span),
            object => Err((TypeError::NotCallable { type_: object.type_() }.into(), span.clone())),
        }
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Object::Bool(true) => write!(f, "True"),
            Object::Bool(false) => write!(f, "False"),
            Object::Class(class) => write!(f, "{class}"),
            Object::Function(function) => write!(f, "{function}"),
            Object::Instance(instance) => write!(f, "{instance}"),
            Object::Native(native) => write!(f, "{native}"),
            Object::Nil => write!(f, "nil"),
            Object::Number(number) => fmt_number(f, *number),
            Object::String(string) => write!(f, "{string}"),
        }
    }
}

/// Shortest round-trip digits with no trailing `.0`. Exponents below -4 or
/// from 16 up switch to scientific notation with a signed, two-digit exponent.
fn fmt_number(f: &mut Formatter<'_>, number: f64) -> fmt::Result {
    if number.is_nan() {
        return write!(f, "nan");
    }
    if number.is_infinite() {
        return write!(f, "{}", if number < 0.0 { "-inf" } else { "inf" });
    }

    let sci = format!("{number:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else { return write!(f, "{number}") };
    match exp.parse::<i32>() {
        Ok(exp) if !(-4..16).contains(&exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            write!(f, "{mantissa}e{sign}{:02}", exp.abs())
        }
        _ => write!(f, "{number}"),
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Bool(b1), Object::Bool(b2)) => b1 == b2,
            (Object::Class(c1), Object::Class(c2)) => c1 == c2,
            (Object::Function(f1), Object::Function(f2)) => f1 == f2,
            (Object::Instance(i1), Object::Instance(i2)) => i1 == i2,
            (Object::Native(n1), Object::Native(n2)) => n1 == n2,
            (Object::Nil, Object::Nil) => true,
            (Object::Number(n1), Object::Number(n2)) => n1 == n2,
            (Object::String(s1), Object::String(s2)) => s1 == s2,
            _ => false,
        }
    }
}
