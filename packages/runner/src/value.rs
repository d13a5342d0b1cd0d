//! Runtime values.
//!
//! Attribute resolution is explicit: an instance's own attributes first,
//! then its class, then each base class in turn. At each class, attributes
//! shadow methods.
use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    iter,
    rc::Rc,
};

use strum::{Display, EnumIter, EnumString};

use crate::{environment::Env, syntax_tree::FunctionDef};

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Function>),
    BoundMethod(Rc<BoundMethod>),
    Builtin(Builtin),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
}

impl Value {
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Self::Str(text.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Function(_) => "function",
            Self::BoundMethod(_) => "method",
            Self::Builtin(_) => "builtin_function_or_method",
            Self::Class(_) => "type",
            Self::Instance(instance) => return instance.class().name().to_owned(),
        }
        .to_owned()
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Str(text) => !text.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Function(_)
            | Self::BoundMethod(_)
            | Self::Builtin(_)
            | Self::Class(_)
            | Self::Instance(_) => true,
        }
    }

    /// The integer value, treating `bool` as `int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    /// `==`
    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(lhs), Self::Str(rhs)) => lhs == rhs,
            (Self::List(lhs), Self::List(rhs)) => {
                let (lhs, rhs) = (lhs.borrow(), rhs.borrow());

                lhs.len() == rhs.len() && iter::zip(lhs.iter(), rhs.iter()).all(|(l, r)| l.equals(r))
            }
            _ => match (self.as_int(), other.as_int()) {
                (Some(lhs), Some(rhs)) => lhs == rhs,
                _ => self.is(other),
            },
        }
    }

    /// `is`
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(lhs), Self::Bool(rhs)) => lhs == rhs,
            (Self::Int(lhs), Self::Int(rhs)) => lhs == rhs,
            (Self::Str(lhs), Self::Str(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Self::List(lhs), Self::List(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Self::Function(lhs), Self::Function(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Self::BoundMethod(lhs), Self::BoundMethod(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Self::Builtin(lhs), Self::Builtin(rhs)) => lhs == rhs,
            (Self::Class(lhs), Self::Class(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Self::Instance(lhs), Self::Instance(rhs)) => Rc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(value) => write!(f, "{value:?}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(text) => write!(f, "{text:?}"),
            Self::List(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Self::Function(function) => write!(f, "<function {}>", function.name()),
            Self::BoundMethod(method) => write!(
                f,
                "<bound method {}.{}>",
                method.receiver.class().name(),
                method.function.name()
            ),
            Self::Builtin(builtin) => write!(f, "<built-in function {builtin}>"),
            Self::Class(class) => write!(f, "<class '{}'>", class.name()),
            Self::Instance(instance) => write!(f, "<{} object>", instance.class().name()),
        }
    }
}

/// A user defined function, with the environment it closes over.
pub struct Function {
    def: Rc<FunctionDef>,
    defaults: Vec<Option<Value>>,
    closure: Env,
}

impl Function {
    /// `defaults` has one entry per parameter, evaluated at definition time.
    pub fn new(def: Rc<FunctionDef>, defaults: Vec<Option<Value>>, closure: Env) -> Self {
        Self {
            def,
            defaults,
            closure,
        }
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn def(&self) -> &FunctionDef {
        &self.def
    }

    pub fn default(&self, index: usize) -> Option<&Value> {
        self.defaults.get(index).and_then(Option::as_ref)
    }

    pub fn closure(&self) -> &Env {
        &self.closure
    }
}

pub struct BoundMethod {
    pub receiver: Rc<Instance>,
    pub function: Rc<Function>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Print,
    Str,
    Repr,
    Len,
    Range,
}

pub struct Class {
    name: String,
    base: Option<Rc<Class>>,
    attributes: RefCell<HashMap<String, Value>>,
    methods: HashMap<String, Rc<Function>>,
}

impl Class {
    /// Functions bound in the class body become methods. Everything else is a
    /// class attribute.
    pub fn new(
        name: impl Into<String>,
        base: Option<Rc<Class>>,
        bindings: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let mut attributes = HashMap::new();
        let mut methods = HashMap::new();

        for (binding, value) in bindings {
            match value {
                Value::Function(function) => {
                    methods.insert(binding, function);
                }
                value => {
                    attributes.insert(binding, value);
                }
            }
        }

        Self {
            name: name.into(),
            base,
            attributes: RefCell::new(attributes),
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Rc<Class>> {
        self.base.as_ref()
    }

    /// Walk this class and its bases, most derived first.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut class = Some(self);

        while let Some(current) = class {
            if let Some(value) = current.attributes.borrow().get(name) {
                return Some(value.clone());
            }

            if let Some(method) = current.methods.get(name) {
                return Some(Value::Function(method.clone()));
            }

            class = current.base.as_deref();
        }

        None
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        self.attributes.borrow_mut().insert(name.into(), value);
    }
}

pub struct Instance {
    class: Rc<Class>,
    attributes: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            attributes: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// Instance attributes override the class chain. Functions found on the
    /// class come back bound to this instance.
    pub fn attribute(self: &Rc<Self>, name: &str) -> Option<Value> {
        if let Some(value) = self.attributes.borrow().get(name) {
            return Some(value.clone());
        }

        self.class.lookup(name).map(|value| match value {
            Value::Function(function) => Value::BoundMethod(Rc::new(BoundMethod {
                receiver: self.clone(),
                function,
            })),
            value => value,
        })
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        self.attributes.borrow_mut().insert(name.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{Class, Instance, Value};

    #[test]
    fn instance_overrides_class() {
        let base = Rc::new(Class::new(
            "Base",
            None,
            [("shared".to_owned(), Value::string("base"))],
        ));
        let class = Rc::new(Class::new(
            "Derived",
            Some(base),
            [("own".to_owned(), Value::string("class"))],
        ));
        let instance = Rc::new(Instance::new(class.clone()));

        assert_eq!(text(instance.attribute("shared")), "base");
        assert_eq!(text(instance.attribute("own")), "class");

        instance.set_attribute("own", Value::string("instance"));
        assert_eq!(text(instance.attribute("own")), "instance");
        assert_eq!(text(class.lookup("own")), "class");
        assert!(instance.attribute("missing").is_none());
    }

    #[test]
    fn class_mutation_is_visible_through_instances() {
        let class = Rc::new(Class::new("C", None, Vec::new()));
        let instance = Rc::new(Instance::new(class.clone()));

        class.set_attribute("late", Value::Int(3));

        assert_eq!(instance.attribute("late").and_then(|v| v.as_int()), Some(3));
    }

    #[test]
    fn equality() {
        assert!(Value::Int(1).equals(&Value::Bool(true)));
        assert!(Value::string("a").equals(&Value::string("a")));
        assert!(!Value::string("a").is(&Value::string("a")));
        assert!(Value::list([Value::Int(1)]).equals(&Value::list([Value::Int(1)])));
        assert!(!Value::None.equals(&Value::Int(0)));
    }

    #[test]
    fn truthiness() {
        let falsy = [
            Value::None,
            Value::Bool(false),
            Value::Int(0),
            Value::string(""),
            Value::list(Vec::new()),
        ];

        assert!(falsy.iter().all(|value| !value.truthy()));
        assert!(Value::list([Value::None]).truthy());
    }

    fn text(value: Option<Value>) -> String {
        match value {
            Some(Value::Str(text)) => text.to_string(),
            other => panic!("Expected a string, got {other:?}"),
        }
    }
}
