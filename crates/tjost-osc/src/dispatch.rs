//! Ordered method tables keyed by path and format.
//!
//! A [`Method`] matches when its path and format patterns equal the message's, with
//! `None` acting as a wildcard. [`MethodTable::dispatch`] runs the first match only.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::MessageRef;

type Handler<C> = Box<dyn FnMut(&mut C, u64, &MessageRef<'_>) + Send>;

pub struct Method<C> {
    pub path: Option<String>,
    /// Type tags without the leading comma.
    pub format: Option<String>,
    handler: Handler<C>,
}

impl<C> Method<C> {
    pub fn new<F>(path: Option<&str>, format: Option<&str>, handler: F) -> Self
    where
        F: FnMut(&mut C, u64, &MessageRef<'_>) + Send + 'static,
    {
        Self {
            path: path.map(str::to_string),
            format: format.map(|f| f.strip_prefix(',').unwrap_or(f).to_string()),
            handler: Box::new(handler),
        }
    }

    pub fn matches(&self, msg: &MessageRef<'_>) -> bool {
        self.path.as_deref().map_or(true, |p| p == msg.path())
            && self.format.as_deref().map_or(true, |f| f == msg.format())
    }
}

impl<C> core::fmt::Debug for Method<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Method")
            .field("path", &self.path)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Methods in registration order.
pub struct MethodTable<C> {
    methods: Vec<Method<C>>,
}

impl<C> Default for MethodTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MethodTable<C> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
        }
    }

    /// Register a handler. Later registrations only run when no earlier one matches.
    pub fn add<F>(&mut self, path: Option<&str>, format: Option<&str>, handler: F) -> &mut Self
    where
        F: FnMut(&mut C, u64, &MessageRef<'_>) + Send + 'static,
    {
        self.methods.push(Method::new(path, format, handler));
        self
    }

    /// Run the first matching method; returns whether one matched.
    pub fn dispatch(&mut self, ctx: &mut C, time: u64, msg: &MessageRef<'_>) -> bool {
        match self.methods.iter_mut().find(|m| m.matches(msg)) {
            Some(method) => {
                (method.handler)(ctx, time, msg);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
