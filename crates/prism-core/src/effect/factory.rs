//! Table-driven handler construction.

use std::collections::HashMap;

use super::handler::{BlurHandler, ConvertHandler, EffectHandler, ResizeHandler};
use super::registry::{BLUR, CONVERT, RESIZE};

/// Builds a fresh handler instance.
pub type HandlerConstructor = fn() -> Box<dyn EffectHandler>;

/// Maps canonical effect names to handler constructors.
///
/// Adding an effect means registering a constructor; nothing else in the
/// dispatch path changes.
#[derive(Clone, Default)]
pub struct EffectFactory {
    constructors: HashMap<String, HandlerConstructor>,
}

impl EffectFactory {
    /// An empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the blur, convert and resize handlers.
    pub fn builtin() -> Self {
        let mut factory = Self::new();
        factory.register(BLUR, || Box::new(BlurHandler));
        factory.register(CONVERT, || Box::new(ConvertHandler));
        factory.register(RESIZE, || Box::new(ResizeHandler));
        factory
    }

    /// Register a constructor, replacing any previous one for the name.
    pub fn register(&mut self, name: impl Into<String>, constructor: HandlerConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    /// Create a handler for a canonical name; `None` if no handler exists.
    pub fn create(&self, name: &str) -> Option<Box<dyn EffectHandler>> {
        self.constructors.get(name).map(|ctor| ctor())
    }

    /// Whether a handler exists for the name.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for EffectFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectFactory")
            .field("handlers", &self.names())
            .finish()
    }
}
