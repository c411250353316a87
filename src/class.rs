use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::function::Function;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

/// A class declaration: its name, an optional superclass, and its instance
/// and static method tables. Methods are stored behind `Rc` so `find_method`
/// can hand out a cheap clone for `bind`.
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<RefCell<Class>>>,
    pub methods: HashMap<String, Rc<Function>>,
    pub static_methods: HashMap<String, Rc<Function>>,
}

impl Class {
    pub fn new(
        name: String,
        superclass: Option<Rc<RefCell<Class>>>,
        methods: HashMap<String, Rc<Function>>,
        static_methods: HashMap<String, Rc<Function>>,
    ) -> Self {
        Class { name, superclass, methods, static_methods }
    }

    /// Walks this class and then its superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass.as_ref().and_then(|s| s.borrow().find_method(name))
    }

    pub fn find_static_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.static_methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass.as_ref().and_then(|s| s.borrow().find_static_method(name))
    }

    /// Arity of `init`, or 0 if the class has no initializer.
    pub fn arity(&self) -> usize {
        self.find_method("init").map(|m| m.params.len()).unwrap_or(0)
    }

    pub fn construct(
        class: &Rc<RefCell<Class>>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(class))));

        if let Some(initializer) = class.borrow().find_method("init") {
            initializer.bind(Value::Instance(Rc::clone(&instance))).call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A runtime instance of a class: the class it was constructed from plus an
/// unconditionally-writable field map.
pub struct Instance {
    pub class: Rc<RefCell<Class>>,
    pub fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<RefCell<Class>>) -> Self {
        Instance { class, fields: HashMap::new() }
    }

    /// A field hit wins over a method; a method hit is bound to `this`
    /// before being returned.
    pub fn get(instance: &Rc<RefCell<Instance>>, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(field) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(field.clone());
        }

        let method = instance.borrow().class.borrow().find_method(&name.lexeme);
        if let Some(method) = method {
            return Ok(Value::Function(Rc::new(method.bind(Value::Instance(Rc::clone(instance))))));
        }

        Err(RuntimeError::at(name, format!("Undefined property '{}'", name.lexeme)))
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<instance {}>", self.class.borrow().name)
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.borrow().name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn empty_class(name: &str) -> Rc<RefCell<Class>> {
        Rc::new(RefCell::new(Class::new(name.to_string(), None, HashMap::new(), HashMap::new())))
    }

    #[test]
    fn find_method_walks_superclass_chain() {
        let mut methods = HashMap::new();
        methods.insert(
            "speak".to_string(),
            Rc::new(Function::new(
                Token::from("speak"),
                Vec::new(),
                Rc::new(Vec::new()),
                Rc::new(RefCell::new(crate::environment::Environment::default())),
                false,
            )),
        );
        let base = Rc::new(RefCell::new(Class::new("Animal".to_string(), None, methods, HashMap::new())));
        let derived = Class::new("Dog".to_string(), Some(Rc::clone(&base)), HashMap::new(), HashMap::new());

        assert!(derived.find_method("speak").is_some());
        assert!(derived.find_method("bark").is_none());
    }

    #[test]
    fn arity_with_no_initializer_is_zero() {
        let class = empty_class("Empty");
        assert_eq!(class.borrow().arity(), 0);
    }

    #[test]
    fn instance_set_then_get_round_trips_through_fields() {
        let class = empty_class("Box");
        let instance = Rc::new(RefCell::new(Instance::new(class)));
        let name = Token::from("value");

        instance.borrow_mut().set(&name, Value::Number(7.0));
        assert_eq!(Instance::get(&instance, &name).unwrap(), Value::Number(7.0));
    }
}
