//! Component-layer error types.

/// Boxed error returned by component constructors and system teardown.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while creating or addressing components.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The component's constructor failed.
    #[error("failed to instantiate component {component}: {source}")]
    Instantiation {
        /// Name of the component type.
        component: &'static str,
        /// Error reported by the constructor.
        #[source]
        source: BoxError,
    },

    /// A pooled component instance was handed in from outside its pool.
    #[error("component {component} is pooled; create it through its mapper instead of adding an instance")]
    PooledAdd {
        /// Name of the component type.
        component: &'static str,
    },

    /// A typed lookup addressed a store holding a different component type.
    #[error("store for component {component} does not hold the requested type")]
    TypeMismatch {
        /// Name of the component type the store was registered for.
        component: &'static str,
    },
}
