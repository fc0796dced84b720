use std::fmt::{self, Debug, Display, Formatter};
use std::io::Write;
use std::ops::Deref;
use std::rc::Rc;

use gc::{Finalize, Gc, Trace};
use lox_common::error::Result;
use lox_common::types::Span;
use lox_syntax::ast::StmtFun;

use crate::env::Env;
use crate::interpreter::Flow;
use crate::object::{Callable, Instance, Object};
use crate::Interpreter;

/// A user-defined function or method, closed over the scope it was declared
/// in.
#[derive(Clone, Finalize, Trace)]
pub struct Function(Gc<FunctionImpl>);

impl Function {
    pub fn new(decl: &Rc<StmtFun>, env: &Env, is_init: bool) -> Self {
        Self::with_decl(Rc::clone(decl), env.clone(), is_init)
    }

    fn with_decl(decl: Rc<StmtFun>, env: Env, is_init: bool) -> Self {
        Function(Gc::new(FunctionImpl { decl, env, is_init }))
    }

    /// Returns a copy of this method whose closure has `this` bound to
    /// `instance`.
    pub fn bind(&self, instance: &Instance) -> Function {
        let env = Env::with_parent(&self.env);
        env.define("this", instance.clone().into());
        Self::with_decl(Rc::clone(&self.decl), env, self.is_init)
    }
}

impl Callable for Function {
    fn arity(&self) -> usize {
        self.decl.params.len()
    }

    fn name(&self) -> &str {
        &self.decl.name
    }

    fn call_unchecked<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        _span: &Span,
    ) -> Result<Object> {
        let env = Env::with_parent(&self.env);
        for (param, arg) in self.decl.params.iter().zip(args) {
            env.define(param, arg);
        }
        let flow = interpreter.run_block(&self.decl.body.stmts, env)?;

        // An initializer always yields the instance, whether it ran to the end
        // or left through a bare `return;`.
        if self.is_init {
            return Ok(self.env.get_at(0, "this"));
        }
        Ok(match flow {
            Flow::Return(object) => object,
            Flow::Normal => Object::Nil,
        })
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_init", &self.is_init)
            .finish()
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl Deref for Function {
    type Target = FunctionImpl;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Eq for Function {}

impl From<Function> for Object {
    fn from(function: Function) -> Self {
        Object::Function(function)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Finalize, Trace)]
pub struct FunctionImpl {
    #[unsafe_ignore_trace]
    pub decl: Rc<StmtFun>,
    pub env: Env,
    is_init: bool,
}
