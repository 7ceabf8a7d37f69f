//! Handler registry keyed by command name.
//!
//! Lifecycle commands are owned by the session and cannot be registered.
//! Duplicate registrations are rejected rather than silently replaced.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{HandlerError, RegistryError};
use crate::protocol::{ResponseEnvelope, is_reserved};

use super::context::HandlerContext;

/// Outcome of a handler invocation.
pub type HandlerResult = Result<ResponseEnvelope, HandlerError>;

/// A registered command handler operating on session state `S`.
pub type Handler<S> = Box<dyn FnMut(&mut S, &mut HandlerContext<'_>) -> HandlerResult>;

/// Registry of command handlers.
pub struct HandlerRegistry<S> {
    handlers: BTreeMap<String, Handler<S>>,
}

impl<S> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }
}

impl<S> fmt::Debug for HandlerRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("commands", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S> HandlerRegistry<S> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Reserved`] for lifecycle names,
    /// [`RegistryError::Duplicate`] when the name is taken, and
    /// [`RegistryError::EmptyName`] for blank names.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> Result<(), RegistryError>
    where
        F: FnMut(&mut S, &mut HandlerContext<'_>) -> HandlerResult + 'static,
    {
        let func: String = name.into();
        if func.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if is_reserved(&func) {
            return Err(RegistryError::Reserved { name: func });
        }
        if self.handlers.contains_key(&func) {
            return Err(RegistryError::Duplicate { name: func });
        }
        self.handlers.insert(func, Box::new(handler));
        Ok(())
    }

    /// Builder-style variant of [`Self::register`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::register`].
    pub fn with<F>(mut self, name: impl Into<String>, handler: F) -> Result<Self, RegistryError>
    where
        F: FnMut(&mut S, &mut HandlerContext<'_>) -> HandlerResult + 'static,
    {
        self.register(name, handler)?;
        Ok(self)
    }

    /// Reports whether a handler exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered command names in sorted order.
    #[must_use]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Reports whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Handler<S>> {
        self.handlers.get_mut(name)
    }
}
