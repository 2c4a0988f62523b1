//! Per-request scratch space shared across the middleware chain.
//!
//! Instead of an untyped bag, values are stored under typed [`Key`]s: each
//! key declares the type of value it holds, so a middleware reading what
//! another one wrote gets a contract mismatch at compile time, not a
//! runtime surprise.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;

/// A named, typed key into the per-request [`Context`].
///
/// Declare keys as constants shared between the middleware that writes
/// and the one that reads:
///
/// ```
/// use gateling::Key;
/// const REQUEST_ID: Key<u64> = Key::new("request-id");
/// ```
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self { name, _marker: PhantomData }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

/// Mutable key/value bag created empty per request and dropped when the
/// request completes. Owned exclusively by its request's task.
#[derive(Default)]
pub struct Context {
    values: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under the key, returning the previous value if the
    /// key was already set.
    pub fn insert<T: Send + 'static>(&mut self, key: Key<T>, value: T) -> Option<T> {
        self.values
            .insert(key.name, Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn get<T: Send + 'static>(&self, key: Key<T>) -> Option<&T> {
        self.values.get(key.name).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + 'static>(&mut self, key: Key<T>) -> Option<&mut T> {
        self.values.get_mut(key.name).and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T: Send + 'static>(&mut self, key: Key<T>) -> Option<T> {
        self.values.remove(key.name).and_then(|old| old.downcast::<T>().ok()).map(|boxed| *boxed)
    }

    pub fn contains<T>(&self, key: Key<T>) -> bool {
        self.values.contains_key(key.name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
