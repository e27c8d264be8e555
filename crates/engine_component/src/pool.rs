//! Free list of reusable component instances.

use crate::component::Component;
use crate::error::ComponentError;

/// Recycles instances of a pooled component type.
///
/// Instances are reset on their way into the pool, so whatever
/// [`obtain`](ComponentPool::obtain) hands out never carries state from its
/// previous owner.
#[derive(Debug)]
pub struct ComponentPool<T> {
    cache: Vec<T>,
}

impl<T: Component> ComponentPool<T> {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self { cache: Vec::new() }
    }

    /// Take a recycled instance, or construct one if the pool is empty.
    pub fn obtain(&mut self) -> Result<T, ComponentError> {
        match self.cache.pop() {
            Some(component) => Ok(component),
            None => T::instantiate().map_err(|source| ComponentError::Instantiation {
                component: T::type_name(),
                source,
            }),
        }
    }

    /// Reset `component` and keep it for reuse.
    pub fn free(&mut self, mut component: T) {
        component.reset();
        self.cache.push(component);
    }

    /// Number of instances waiting for reuse.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if no instance is waiting for reuse.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<T: Component> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
