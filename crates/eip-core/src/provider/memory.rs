// # Memory Address Provider
//
// In-memory implementation of AddressProvider.
//
// ## Purpose
//
// Simulates a provider account: interfaces with private address slots, and
// public address allocations that can be bound to those slots. Useful for
// testing rotation logic and for embedding without a cloud account.
//
// ## Rules
//
// The simulation follows VPC address semantics:
// - Allocation fails once the account address limit is reached
// - Binding onto an occupied slot fails unless reassociation is allowed
// - Releasing an address that is still bound fails
// - Unknown interfaces, allocations and associations are `NotFound`
//
// ## Fault Injection
//
// Any operation can be made to fail or to hang forever, and every call is
// recorded so tests can assert on sequencing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::address_provider::{
    AddressProvider, AllocatedAddress, AssociateRequest, Association, InterfaceId, Operation,
    PrivateAddressSlot,
};

/// Default account limit on allocated addresses
const DEFAULT_ADDRESS_LIMIT: usize = 16;

const PROVIDER_NAME: &str = "memory";

/// In-memory address provider
///
/// Clones share the same simulated account, so a test can keep a handle for
/// inspection while the `Rotator` owns another.
///
/// # Example
///
/// ```rust,no_run
/// use eip_core::provider::MemoryAddressProvider;
/// use eip_core::traits::AddressProvider;
/// use std::net::IpAddr;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let private_ip: IpAddr = "10.0.0.5".parse()?;
///     let public_ip: IpAddr = "1.2.3.4".parse()?;
///
///     let provider = MemoryAddressProvider::new();
///     provider.add_interface("eni-1", &[private_ip]).await;
///     provider
///         .bind_existing("eni-1", private_ip, "eipalloc-1", public_ip)
///         .await?;
///
///     let slots = provider.describe_interface(&"eni-1".into()).await?;
///     assert!(slots[0].association.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressProvider {
    inner: Arc<RwLock<Account>>,
}

/// Simulated provider account
#[derive(Debug, Default)]
struct Account {
    /// Interfaces and their private address slots, in slot order
    interfaces: HashMap<InterfaceId, Vec<IpAddr>>,
    /// Allocations by allocation id
    addresses: HashMap<String, AddressRecord>,
    /// Allocations handed out before generated ones
    queued: Vec<AllocatedAddress>,
    /// Maximum number of live allocations
    limit: Option<usize>,
    /// Counter for generated identifiers
    next_id: u32,
    /// Operations that fail, with their error message
    failures: HashMap<Operation, String>,
    /// Operations that never complete
    hangs: Vec<Operation>,
    /// Every call made, in order
    calls: Vec<Operation>,
}

#[derive(Debug, Clone)]
struct AddressRecord {
    public_ip: IpAddr,
    binding: Option<Binding>,
}

#[derive(Debug, Clone)]
struct Binding {
    association_id: String,
    interface_id: InterfaceId,
    private_ip: IpAddr,
}

impl Account {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_ADDRESS_LIMIT)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn binding_at(&self, interface_id: &InterfaceId, private_ip: IpAddr) -> Option<(&str, &AddressRecord)> {
        self.addresses.iter().find_map(|(allocation_id, record)| {
            record
                .binding
                .as_ref()
                .filter(|b| &b.interface_id == interface_id && b.private_ip == private_ip)
                .map(|_| (allocation_id.as_str(), record))
        })
    }
}

impl MemoryAddressProvider {
    /// Create an empty simulated account
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interface with the given private address slots
    ///
    /// The first slot is reported as the primary address.
    pub async fn add_interface(&self, interface_id: impl Into<InterfaceId>, private_ips: &[IpAddr]) {
        let mut account = self.inner.write().await;
        account
            .interfaces
            .insert(interface_id.into(), private_ips.to_vec());
    }

    /// Create an allocation already bound to an interface slot
    ///
    /// Returns the generated association id.
    pub async fn bind_existing(
        &self,
        interface_id: impl Into<InterfaceId>,
        private_ip: IpAddr,
        allocation_id: impl Into<String>,
        public_ip: IpAddr,
    ) -> Result<String, Error> {
        let id = self.next_association_id().await;
        self.bind_existing_with_id(interface_id, private_ip, allocation_id, public_ip, id.clone())
            .await?;
        Ok(id)
    }

    /// Create an allocation bound to an interface slot under a chosen association id
    pub async fn bind_existing_with_id(
        &self,
        interface_id: impl Into<InterfaceId>,
        private_ip: IpAddr,
        allocation_id: impl Into<String>,
        public_ip: IpAddr,
        association_id: impl Into<String>,
    ) -> Result<(), Error> {
        let interface_id = interface_id.into();
        let mut account = self.inner.write().await;

        let slots = account
            .interfaces
            .get(&interface_id)
            .ok_or_else(|| Error::not_found(format!("Interface {}", interface_id)))?;
        if !slots.contains(&private_ip) {
            return Err(Error::invalid_input(format!(
                "{} is not a private address of {}",
                private_ip, interface_id
            )));
        }
        if account.binding_at(&interface_id, private_ip).is_some() {
            return Err(Error::invalid_input(format!(
                "{} on {} is already bound",
                private_ip, interface_id
            )));
        }

        account.addresses.insert(
            allocation_id.into(),
            AddressRecord {
                public_ip,
                binding: Some(Binding {
                    association_id: association_id.into(),
                    interface_id,
                    private_ip,
                }),
            },
        );
        Ok(())
    }

    /// Hand out this allocation on the next allocate call
    pub async fn queue_allocation(&self, allocation_id: impl Into<String>, public_ip: IpAddr) {
        let mut account = self.inner.write().await;
        account.queued.push(AllocatedAddress {
            allocation_id: allocation_id.into(),
            public_ip,
        });
    }

    /// Set the account limit on live allocations
    pub async fn set_address_limit(&self, limit: usize) {
        self.inner.write().await.limit = Some(limit);
    }

    /// Make every call of `operation` fail with `message`
    pub async fn fail_on(&self, operation: Operation, message: impl Into<String>) {
        self.inner
            .write()
            .await
            .failures
            .insert(operation, message.into());
    }

    /// Make every call of `operation` wait forever
    pub async fn hang_on(&self, operation: Operation) {
        self.inner.write().await.hangs.push(operation);
    }

    /// Calls made so far, in order
    pub async fn calls(&self) -> Vec<Operation> {
        self.inner.read().await.calls.clone()
    }

    /// Calls made so far that change account state
    pub async fn mutating_calls(&self) -> Vec<Operation> {
        self.calls()
            .await
            .into_iter()
            .filter(Operation::is_mutating)
            .collect()
    }

    /// Public address currently bound to an interface slot
    pub async fn public_ip_at(&self, interface_id: &InterfaceId, private_ip: IpAddr) -> Option<IpAddr> {
        let account = self.inner.read().await;
        account
            .binding_at(interface_id, private_ip)
            .map(|(_, record)| record.public_ip)
    }

    /// Whether an allocation is still held by the account
    pub async fn is_allocated(&self, allocation_id: &str) -> bool {
        self.inner.read().await.addresses.contains_key(allocation_id)
    }

    /// Number of live allocations
    pub async fn allocation_count(&self) -> usize {
        self.inner.read().await.addresses.len()
    }

    async fn next_association_id(&self) -> String {
        let n = self.inner.write().await.next_id();
        format!("eipassoc-{:08x}", n)
    }

    /// Record a call and apply any injected fault
    async fn enter(&self, operation: Operation) -> Result<(), Error> {
        let hang = {
            let mut account = self.inner.write().await;
            account.calls.push(operation);
            if let Some(message) = account.failures.get(&operation) {
                return Err(Error::provider(PROVIDER_NAME, message.clone()));
            }
            account.hangs.contains(&operation)
        };

        if hang {
            tracing::debug!("{} hanging by request", operation);
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl AddressProvider for MemoryAddressProvider {
    async fn allocate_address(&self) -> Result<AllocatedAddress, Error> {
        self.enter(Operation::AllocateAddress).await?;
        let mut account = self.inner.write().await;

        if account.addresses.len() >= account.limit() {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!(
                    "AddressLimitExceeded: The maximum number of addresses ({}) has been reached",
                    account.limit()
                ),
            ));
        }

        let allocated = if account.queued.is_empty() {
            let n = account.next_id();
            let [_, _, hi, lo] = n.to_be_bytes();
            AllocatedAddress {
                allocation_id: format!("eipalloc-{:08x}", n),
                public_ip: IpAddr::V4(Ipv4Addr::new(198, 51, hi, lo)),
            }
        } else {
            account.queued.remove(0)
        };

        account.addresses.insert(
            allocated.allocation_id.clone(),
            AddressRecord {
                public_ip: allocated.public_ip,
                binding: None,
            },
        );

        Ok(allocated)
    }

    async fn describe_interface(
        &self,
        interface_id: &InterfaceId,
    ) -> Result<Vec<PrivateAddressSlot>, Error> {
        self.enter(Operation::DescribeInterface).await?;
        let account = self.inner.read().await;

        let private_ips = account
            .interfaces
            .get(interface_id)
            .ok_or_else(|| Error::not_found(format!("Interface {}", interface_id)))?;

        let slots = private_ips
            .iter()
            .enumerate()
            .map(|(index, private_ip)| PrivateAddressSlot {
                private_ip: *private_ip,
                primary: index == 0,
                association: account.binding_at(interface_id, *private_ip).and_then(
                    |(allocation_id, record)| {
                        record.binding.as_ref().map(|binding| Association {
                            association_id: binding.association_id.clone(),
                            allocation_id: allocation_id.to_string(),
                            public_ip: record.public_ip,
                        })
                    },
                ),
            })
            .collect();

        Ok(slots)
    }

    async fn disassociate_address(&self, association_id: &str) -> Result<(), Error> {
        self.enter(Operation::DisassociateAddress).await?;
        let mut account = self.inner.write().await;

        let record = account
            .addresses
            .values_mut()
            .find(|record| {
                record
                    .binding
                    .as_ref()
                    .is_some_and(|b| b.association_id == association_id)
            })
            .ok_or_else(|| Error::not_found(format!("Association {}", association_id)))?;

        record.binding = None;
        Ok(())
    }

    async fn associate_address(&self, request: &AssociateRequest) -> Result<String, Error> {
        self.enter(Operation::AssociateAddress).await?;
        let mut account = self.inner.write().await;

        let slots = account
            .interfaces
            .get(&request.interface_id)
            .ok_or_else(|| Error::not_found(format!("Interface {}", request.interface_id)))?;
        if !slots.contains(&request.private_ip) {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!(
                    "InvalidParameterValue: {} is not assigned to {}",
                    request.private_ip, request.interface_id
                ),
            ));
        }

        let occupant = account
            .binding_at(&request.interface_id, request.private_ip)
            .map(|(allocation_id, _)| allocation_id.to_string());

        let record = account
            .addresses
            .get(&request.allocation_id)
            .ok_or_else(|| Error::not_found(format!("Allocation {}", request.allocation_id)))?;

        if !request.allow_reassociation && (occupant.is_some() || record.binding.is_some()) {
            return Err(Error::provider(
                PROVIDER_NAME,
                "Resource.AlreadyAssociated: the address or the target slot is already associated",
            ));
        }

        let association_id = format!("eipassoc-{:08x}", account.next_id());

        if let Some(occupant) = occupant
            && let Some(displaced) = account.addresses.get_mut(&occupant)
        {
            displaced.binding = None;
        }

        if let Some(record) = account.addresses.get_mut(&request.allocation_id) {
            record.binding = Some(Binding {
                association_id: association_id.clone(),
                interface_id: request.interface_id.clone(),
                private_ip: request.private_ip,
            });
        }

        Ok(association_id)
    }

    async fn release_address(&self, allocation_id: &str) -> Result<(), Error> {
        self.enter(Operation::ReleaseAddress).await?;
        let mut account = self.inner.write().await;

        let record = account
            .addresses
            .get(allocation_id)
            .ok_or_else(|| Error::not_found(format!("Allocation {}", allocation_id)))?;

        if record.binding.is_some() {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("InvalidIPAddress.InUse: {} is still associated", allocation_id),
            ));
        }

        account.addresses.remove(allocation_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
