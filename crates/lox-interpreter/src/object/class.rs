use std::fmt::{self, Debug, Display, Formatter};
use std::io::Write;
use std::ops::Deref;

use gc::{Finalize, Gc, Trace};
use lox_common::error::Result;
use lox_common::types::Span;
use rustc_hash::FxHashMap;

use crate::object::{Callable, Function, Instance, Object};
use crate::Interpreter;

#[derive(Clone, Finalize, Trace)]
pub struct Class(Gc<ClassImpl>);

impl Class {
    pub fn new(name: &str, super_: Option<Class>, methods: FxHashMap<String, Function>) -> Self {
        Self(Gc::new(ClassImpl { name: name.to_string(), super_, methods }))
    }

    /// Looks a method up on this class, then on each superclass in turn.
    pub fn find_method(&self, name: &str) -> Option<Function> {
        let mut class = self;
        loop {
            if let Some(method) = class.methods.get(name) {
                return Some(method.clone());
            }
            class = class.super_.as_ref()?;
        }
    }
}

impl Callable for Class {
    fn arity(&self) -> usize {
        match self.find_method("init") {
            Some(function) => function.arity(),
            None => 0,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn call_unchecked<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        let instance = Instance::new(self);
        if let Some(init) = self.find_method("init") {
            init.bind(&instance).call_unchecked(interpreter, args, span)?;
        }
        Ok(instance.into())
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut methods = self.methods.keys().collect::<Vec<_>>();
        methods.sort_unstable();
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("super_", &self.super_.as_ref().map(|super_| super_.name.as_str()))
            .field("methods", &methods)
            .finish()
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Deref for Class {
    type Target = ClassImpl;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Eq for Class {}

impl From<Class> for Object {
    fn from(class: Class) -> Self {
        Object::Class(class)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Finalize, Trace)]
pub struct ClassImpl {
    pub name: String,
    pub super_: Option<Class>,
    pub methods: FxHashMap<String, Function>,
}
