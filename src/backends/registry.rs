// SPDX-License-Identifier: GPL-3.0-only

//! Driver registry
//!
//! Maps uri schemes to driver factories. A factory is either terminal (it
//! opens a device, file or generator) or a decorator (it wraps the source
//! opened from its uri path).

use super::drivers;
use super::source::VideoSource;
use crate::config::VideoConfig;
use crate::errors::{VideoError, VideoResult};
use crate::uri::VideoUri;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Factory for sources that do not wrap another source
pub trait TerminalDriver: Send + Sync {
    fn open(&self, uri: &VideoUri, config: &VideoConfig) -> VideoResult<Box<dyn VideoSource>>;
}

/// Factory for sources that transform an inner source
///
/// The inner source is owned by the decorator once passed in. Dropping it
/// on an error path releases the inner device.
pub trait DecoratorDriver: Send + Sync {
    fn open(
        &self,
        uri: &VideoUri,
        inner: Box<dyn VideoSource>,
        config: &VideoConfig,
    ) -> VideoResult<Box<dyn VideoSource>>;
}

impl<F> TerminalDriver for F
where
    F: Fn(&VideoUri, &VideoConfig) -> VideoResult<Box<dyn VideoSource>> + Send + Sync,
{
    fn open(&self, uri: &VideoUri, config: &VideoConfig) -> VideoResult<Box<dyn VideoSource>> {
        self(uri, config)
    }
}

impl<F> DecoratorDriver for F
where
    F: Fn(&VideoUri, Box<dyn VideoSource>, &VideoConfig) -> VideoResult<Box<dyn VideoSource>>
        + Send
        + Sync,
{
    fn open(
        &self,
        uri: &VideoUri,
        inner: Box<dyn VideoSource>,
        config: &VideoConfig,
    ) -> VideoResult<Box<dyn VideoSource>> {
        self(uri, inner, config)
    }
}

/// Registered factory for one scheme
#[derive(Clone)]
pub enum DriverFactory {
    Terminal(Arc<dyn TerminalDriver>),
    Decorator(Arc<dyn DecoratorDriver>),
}

impl DriverFactory {
    pub fn terminal(driver: impl TerminalDriver + 'static) -> Self {
        DriverFactory::Terminal(Arc::new(driver))
    }

    pub fn decorator(driver: impl DecoratorDriver + 'static) -> Self {
        DriverFactory::Decorator(Arc::new(driver))
    }

    pub fn is_decorator(&self) -> bool {
        matches!(self, DriverFactory::Decorator(_))
    }
}

impl fmt::Debug for DriverFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverFactory::Terminal(_) => write!(f, "Terminal"),
            DriverFactory::Decorator(_) => write!(f, "Decorator"),
        }
    }
}

/// Scheme to factory table
///
/// Registration happens during setup; lookups afterwards are read-only, so a
/// registry shared behind `&` is safe to use from any thread.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in driver enabled at compile time
    pub fn with_default_drivers() -> Self {
        let mut registry = Self::new();
        drivers::register_default_drivers(&mut registry);
        registry
    }

    /// Process-wide registry of built-in drivers
    pub fn global() -> &'static DriverRegistry {
        static GLOBAL: OnceLock<DriverRegistry> = OnceLock::new();
        GLOBAL.get_or_init(DriverRegistry::with_default_drivers)
    }

    /// Register `factory` for `scheme`
    ///
    /// # Panics
    ///
    /// Registering the same scheme twice is a programming error and panics.
    pub fn register(&mut self, scheme: impl Into<String>, factory: DriverFactory) {
        let scheme = scheme.into();
        if self.drivers.contains_key(&scheme) {
            panic!("video driver '{}' registered twice", scheme);
        }
        debug!(scheme = %scheme, kind = ?factory, "Registered video driver");
        self.drivers.insert(scheme, factory);
    }

    pub fn register_terminal(&mut self, scheme: impl Into<String>, driver: impl TerminalDriver + 'static) {
        self.register(scheme, DriverFactory::terminal(driver));
    }

    pub fn register_decorator(
        &mut self,
        scheme: impl Into<String>,
        driver: impl DecoratorDriver + 'static,
    ) {
        self.register(scheme, DriverFactory::decorator(driver));
    }

    /// Look up the factory for `scheme`
    pub fn resolve(&self, scheme: &str) -> VideoResult<&DriverFactory> {
        self.drivers
            .get(scheme)
            .ok_or_else(|| VideoError::UnknownScheme(scheme.to_string()))
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.drivers.contains_key(scheme)
    }

    /// Registered schemes in sorted order
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refuse(_: &VideoUri, _: &VideoConfig) -> VideoResult<Box<dyn VideoSource>> {
        Err(VideoError::ReadFailed("not a real device".into()))
    }

    #[test]
    fn test_resolve_unknown_scheme() {
        let registry = DriverRegistry::new();
        let err = registry.resolve("nope").unwrap_err();
        assert!(matches!(err, VideoError::UnknownScheme(s) if s == "nope"));
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = DriverRegistry::new();
        registry.register_terminal("fake", refuse);
        assert!(registry.contains("fake"));
        assert!(!registry.resolve("fake").unwrap().is_decorator());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let mut registry = DriverRegistry::new();
        registry.register_terminal("fake", refuse);
        registry.register_terminal("fake", refuse);
    }

    #[test]
    fn test_schemes_sorted() {
        let mut registry = DriverRegistry::new();
        registry.register_terminal("zeta", refuse);
        registry.register_terminal("alpha", refuse);
        assert_eq!(registry.schemes(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_default_drivers_present() {
        let registry = DriverRegistry::with_default_drivers();
        for scheme in ["test", "convert", "files", "file"] {
            assert!(registry.contains(scheme), "missing built-in driver {}", scheme);
        }
        assert!(registry.resolve("convert").unwrap().is_decorator());
    }
}
