use std::time::Duration;

use phasewise_registry::BUILTINS_PACKAGE;

/// Tunables of a [`crate::Resolver`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use phasewise_resolver::ResolverConfig;
///
/// let config = ResolverConfig::new()
///     .with_lock_poll_interval(Duration::from_millis(1))
///     .with_default_import("std.collections");
/// assert_eq!(config.default_imports, vec!["builtins", "std.collections"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// How often a cancellable lock wait re-checks the cancellation token.
    pub lock_poll_interval: Duration,
    /// Verify the phase invariants of every designation after resolving it.
    pub check_invariants: bool,
    /// Packages star-imported into every unit, searched last.
    pub default_imports: Vec<String>,
    /// Supertype-session items processed between cancellation checks.
    pub cancellation_check_interval: usize,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }

    pub fn with_default_import(mut self, package: impl Into<String>) -> Self {
        self.default_imports.push(package.into());
        self
    }

    /// Replace the default imports entirely.
    pub fn with_default_imports(mut self, packages: Vec<String>) -> Self {
        self.default_imports = packages;
        self
    }

    pub fn with_cancellation_check_interval(mut self, items: usize) -> Self {
        self.cancellation_check_interval = items.max(1);
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lock_poll_interval: Duration::from_millis(10),
            check_invariants: cfg!(debug_assertions),
            default_imports: vec![BUILTINS_PACKAGE.to_string()],
            cancellation_check_interval: 16,
        }
    }
}
