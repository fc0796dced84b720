use std::fmt::{self, Debug, Display, Formatter};

use gc::{Finalize, Gc, GcCell, Trace};
use rustc_hash::FxHashMap;

use crate::object::{Callable, Class, Object};

#[derive(Clone, Finalize, Trace)]
pub struct Instance(Gc<GcCell<InstanceImpl>>);

impl Instance {
    pub fn new(class: &Class) -> Self {
        Self(Gc::new(GcCell::new(InstanceImpl {
            class: class.clone(),
            fields: FxHashMap::default(),
        })))
    }

    pub fn class(&self) -> Class {
        self.0.borrow().class.clone()
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        self.0.borrow().fields.get(name).cloned()
    }

    /// Fields are created on first assignment and shadow methods of the same
    /// name.
    pub fn set(&self, name: &str, value: Object) {
        self.0.borrow_mut().fields.insert(name.to_string(), value);
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let instance = self.0.borrow();
        let mut fields = instance.fields.keys().collect::<Vec<_>>();
        fields.sort_unstable();
        f.debug_struct("Instance")
            .field("class", &instance.class.name())
            .field("fields", &fields)
            .finish()
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class().name())
    }
}

impl Eq for Instance {}

impl From<Instance> for Object {
    fn from(instance: Instance) -> Self {
        Object::Instance(instance)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Finalize, Trace)]
pub struct InstanceImpl {
    pub class: Class,
    pub fields: FxHashMap<String, Object>,
}
