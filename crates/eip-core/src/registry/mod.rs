//! Plugin-based provider registry
//!
//! The registry allows address providers to be registered dynamically at
//! runtime, avoiding hardcoded if-else chains in the binary.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use eip_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! eip_provider_ec2::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! ```

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{AddressProvider, AddressProviderFactory};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Factories = HashMap<String, Box<dyn AddressProviderFactory>>;

/// Provider registry for plugin-based address provider creation
///
/// The registry maintains a map of provider type names to factory objects,
/// allowing dynamic instantiation of providers based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<Factories>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address provider factory
    ///
    /// Registering a name twice replaces the earlier factory.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use eip_core::registry::ProviderRegistry;
    /// # use eip_core::traits::{AddressProvider, AddressProviderFactory};
    /// # struct MyFactory;
    /// # impl AddressProviderFactory for MyFactory {
    /// #     fn create(&self, config: &eip_core::config::ProviderConfig) -> eip_core::Result<Box<dyn AddressProvider>> { unimplemented!() }
    /// # }
    /// let registry = ProviderRegistry::new();
    /// registry.register_provider("myprovider", Box::new(MyFactory));
    /// ```
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn AddressProviderFactory>,
    ) {
        self.write().insert(name.into(), factory);
    }

    /// Create an address provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn AddressProvider>)`: Created provider instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn AddressProvider>> {
        let provider_type = config.type_name();
        let providers = self.read();

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    fn read(&self) -> RwLockReadGuard<'_, Factories> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Factories> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }
}
