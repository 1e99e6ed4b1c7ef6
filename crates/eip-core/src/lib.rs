// # eip-core
//
// Core library for rotating public addresses across a pool of network interfaces.
//
// ## Architecture Overview
//
// - **AddressProvider**: Trait for the provider calls a rotation is made of
// - **Selector**: Trait for the random choices a rotation makes
// - **Rotator**: Runs allocate → select → disassociate → associate → release
// - **InterfacePool**: The fixed set of interfaces eligible for rotation
// - **ProviderRegistry**: Plugin-based registry for address providers
//
// ## Design Principles
//
// 1. **Sequential**: Each step starts only after the previous one succeeded
// 2. **Fail-Fast**: The first failure aborts the rotation; nothing is retried
// 3. **Injectable Randomness**: Selection goes through a `Selector`
// 4. **Plugin-Based**: Providers are registered dynamically
// 5. **Library-First**: The binary is a thin wrapper around this crate

pub mod traits;
pub mod rotator;
pub mod registry;
pub mod config;
pub mod error;
pub mod pool;
pub mod provider;
pub mod selection;

// Re-export core types for convenience
pub use traits::{AddressProvider, InterfaceId, Operation, Selector};
pub use rotator::{RotationEvent, RotationPlan, RotationReport, Rotator};
pub use registry::ProviderRegistry;
pub use config::{Credentials, ProviderConfig, RotationConfig, RotatorConfig};
pub use error::{Error, Result};
pub use pool::InterfacePool;
pub use provider::MemoryAddressProvider;
pub use selection::RandomSelector;
