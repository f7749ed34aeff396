use crate::evaluator::EvalError;
use crate::source::Span;
use crate::types::{Primitive, PrimitiveFunc, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Shared handle to an environment. Closures and in-flight calls hold these,
/// and `set!` mutates through them.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    outer: Option<EnvRef>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates a global environment holding the primitive library.
    pub fn new_global_populated() -> EnvRef {
        let env_ptr = Environment::new();
        crate::primitives::install(&mut env_ptr.borrow_mut());
        env_ptr
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Creates a call frame pairing `params` with `args` positionally.
    /// Callers check that the lengths agree.
    pub fn bind(params: &[String], args: Vec<Value>, outer_env: EnvRef) -> EnvRef {
        let env_ptr = Environment::new_enclosed(outer_env);
        env_ptr
            .borrow_mut()
            .bindings
            .extend(params.iter().cloned().zip(args));
        env_ptr
    }

    /// Returns the nearest environment in the chain starting at `env` that
    /// binds `name`.
    pub fn find(env: &EnvRef, name: &str) -> Option<EnvRef> {
        let mut current = Rc::clone(env);
        loop {
            let next = {
                let frame = current.borrow();
                if frame.bindings.contains_key(name) {
                    None
                } else {
                    match &frame.outer {
                        Some(outer) => Some(Rc::clone(outer)),
                        None => return None,
                    }
                }
            };
            match next {
                Some(outer) => current = outer,
                None => return Some(current),
            }
        }
    }

    /// Looks a variable up through the whole chain.
    /// `span` is where the variable was referenced, used for error reporting.
    pub fn lookup(env: &EnvRef, name: &str, span: Span) -> Result<Value, EvalError> {
        Environment::find(env, name)
            .and_then(|frame| frame.borrow().get(name))
            .ok_or_else(|| EvalError::UnboundVariable {
                name: name.to_string(),
                span,
            })
    }

    /// Reads a binding of this frame only.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned()
    }

    /// Overwrites a binding of this frame only. Returns false when the frame
    /// doesn't bind `name`.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.bindings.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Helper to add a primitive procedure to the environment.
    pub fn add_primitive(&mut self, name: &'static str, func: PrimitiveFunc) {
        self.define(name, Value::Primitive(Primitive::new(name, func)));
    }

    /// Gets every identifier visible from this environment.
    pub fn identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        let mut outer = self.outer.clone();
        while let Some(env_ptr) = outer {
            let env = env_ptr.borrow();
            identifiers.extend(env.bindings.keys().cloned());
            outer = env.outer.clone();
        }
        identifiers
    }
}
