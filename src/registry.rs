//! Process-wide default registry.
//!
//! Recorders built without an explicit registry register on the registry
//! returned by [`default_registry`]. It is created on first use and lives
//! until the process exits; [`Recorder::unregister`](crate::Recorder::unregister)
//! is the only teardown, and it only removes the recorder's own families.

use prometheus::Registry;

/// Shared registry used when none is supplied.
///
/// This is the same registry as [`prometheus::default_registry`], so
/// families registered through the `prometheus` macros show up next to
/// recorder families.
pub fn default_registry() -> &'static Registry {
    prometheus::default_registry()
}

/// Target registry of a recorder.
#[derive(Clone, Copy, Default)]
pub enum Target<'a> {
    /// The process-wide [`default_registry`].
    #[default]
    Default,
    /// A caller-owned registry.
    Custom(&'a Registry),
}

impl<'a> Target<'a> {
    pub fn registry(&self) -> &'a Registry {
        match self {
            Target::Default => default_registry(),
            Target::Custom(registry) => registry,
        }
    }
}

impl<'a> From<&'a Registry> for Target<'a> {
    fn from(registry: &'a Registry) -> Self {
        Target::Custom(registry)
    }
}

impl<'a> From<Option<&'a Registry>> for Target<'a> {
    fn from(registry: Option<&'a Registry>) -> Self {
        registry.map_or(Target::Default, Target::Custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_singleton() {
        assert!(std::ptr::eq(default_registry(), default_registry()));
        assert!(std::ptr::eq(Target::Default.registry(), default_registry()));
    }

    #[test]
    fn test_custom_target() {
        let registry = Registry::new();
        let target = Target::from(&registry);
        assert!(std::ptr::eq(target.registry(), &registry));

        let target = Target::from(None::<&Registry>);
        assert!(std::ptr::eq(target.registry(), default_registry()));
    }
}
