// # Address Provider Trait
//
// Defines the interface for managing public addresses via a cloud provider API.
//
// ## Implementations
//
// - EC2: `eip-provider-ec2` crate
// - In-memory: `eip_core::provider::MemoryAddressProvider` (tests, embedding)
//
// ## Usage
//
// ```rust,ignore
// use eip_core::AddressProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* AddressProvider implementation */;
//
//     let allocated = provider.allocate_address().await?;
//     println!("{} -> {}", allocated.allocation_id, allocated.public_ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Identifier of a network interface in the dynamic pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(String);

impl InterfaceId {
    /// Create an interface identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterfaceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for InterfaceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A freshly allocated public address, not yet bound to any interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedAddress {
    /// Provider allocation identifier
    pub allocation_id: String,
    /// The public address that was reserved
    pub public_ip: IpAddr,
}

/// Binding between a public address and a private address slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Provider association identifier
    pub association_id: String,
    /// Allocation identifier of the bound public address
    pub allocation_id: String,
    /// The bound public address
    pub public_ip: IpAddr,
}

/// One private address on an interface, with its public binding if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateAddressSlot {
    /// Interface-local private address
    pub private_ip: IpAddr,
    /// Whether this is the interface's primary private address
    pub primary: bool,
    /// Present only while a public address is bound to this slot
    pub association: Option<Association>,
}

/// Parameters of an associate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociateRequest {
    /// Allocation to bind
    pub allocation_id: String,
    /// Target interface
    pub interface_id: InterfaceId,
    /// Target private address slot on the interface
    pub private_ip: IpAddr,
    /// When false, binding onto an occupied slot must fail instead of
    /// taking the slot over
    pub allow_reassociation: bool,
}

/// The five provider calls a rotation is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Reserve a new public address
    AllocateAddress,
    /// Read an interface's private address slots
    DescribeInterface,
    /// Unbind a public address from its slot
    DisassociateAddress,
    /// Bind a public address to a slot
    AssociateAddress,
    /// Return a public address to the provider
    ReleaseAddress,
}

impl Operation {
    /// The operation name as used by the provider API
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AllocateAddress => "AllocateAddress",
            Operation::DescribeInterface => "DescribeInterface",
            Operation::DisassociateAddress => "DisassociateAddress",
            Operation::AssociateAddress => "AssociateAddress",
            Operation::ReleaseAddress => "ReleaseAddress",
        }
    }

    /// Whether the operation changes provider state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::DescribeInterface)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for cloud address provider implementations
///
/// Each method maps to exactly one provider API call.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Retries
///
/// Providers never retry. A failed call is returned as an error and the
/// `Rotator` aborts the rotation; operators re-run the tool.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    /// Reserve a new public address for VPC use
    async fn allocate_address(&self) -> Result<AllocatedAddress, crate::Error>;

    /// List the private address slots of an interface
    ///
    /// # Returns
    ///
    /// - `Ok(slots)`: every private address on the interface, each with its
    ///   association if one exists
    /// - `Err(Error::NotFound)`: the interface does not exist
    async fn describe_interface(
        &self,
        interface_id: &InterfaceId,
    ) -> Result<Vec<PrivateAddressSlot>, crate::Error>;

    /// Unbind a public address using its association identifier
    async fn disassociate_address(&self, association_id: &str) -> Result<(), crate::Error>;

    /// Bind an allocated address to an interface slot
    ///
    /// # Returns
    ///
    /// The identifier of the new association
    async fn associate_address(&self, request: &AssociateRequest) -> Result<String, crate::Error>;

    /// Return an allocation to the provider's pool
    async fn release_address(&self, allocation_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing address providers from configuration
pub trait AddressProviderFactory: Send + Sync {
    /// Create an AddressProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn AddressProvider>, crate::Error>;
}
