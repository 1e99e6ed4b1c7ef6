//! Address rotator
//!
//! The Rotator replaces one public address on one interface of the dynamic
//! pool per invocation:
//!
//! ```text
//!   AllocateAddress ──► pick interface ──► DescribeInterface ──► pick slot
//!                                                                    │
//!   ReleaseAddress(old) ◄── AssociateAddress(new) ◄── DisassociateAddress(old)
//! ```
//!
//! Every step depends on the previous one, so the pipeline stops at the
//! first failure. Nothing is retried; the operator re-runs the tool.
//!
//! A failure after allocation leaves the new address allocated but unused.
//! That allocation is named in a warning so it can be released by hand.

use crate::config::RotatorConfig;
use crate::error::{Error, Result};
use crate::traits::selector::pick;
use crate::traits::{
    AddressProvider, AllocatedAddress, AssociateRequest, Association, InterfaceId, Operation,
    Selector,
};
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

/// Events emitted by the Rotator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationEvent {
    /// Rotation started
    Started {
        pool_size: usize,
    },

    /// New public address reserved
    AddressAllocated {
        allocation_id: String,
        public_ip: IpAddr,
    },

    /// Interface chosen from the pool
    InterfaceSelected {
        interface_id: InterfaceId,
    },

    /// Association chosen for replacement
    SlotSelected {
        interface_id: InterfaceId,
        private_ip: IpAddr,
        public_ip: IpAddr,
    },

    /// Old address unbound from its slot
    AddressDisassociated {
        interface_id: InterfaceId,
        association_id: String,
        public_ip: IpAddr,
    },

    /// New address bound to the vacated slot
    AddressAssociated {
        interface_id: InterfaceId,
        private_ip: IpAddr,
        public_ip: IpAddr,
        association_id: String,
    },

    /// Old address returned to the provider
    AddressReleased {
        allocation_id: String,
        public_ip: IpAddr,
    },

    /// Rotation finished
    Completed {
        interface_id: InterfaceId,
        old_public_ip: IpAddr,
        new_public_ip: IpAddr,
    },

    /// Dry run finished
    Planned {
        interface_id: InterfaceId,
        private_ip: IpAddr,
        public_ip: IpAddr,
    },

    /// Rotation aborted
    Failed {
        /// Step that failed, if the failure came from a provider call
        operation: Option<Operation>,
        error: String,
    },
}

/// Outcome of a successful rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    /// The interface that was updated
    pub interface_id: InterfaceId,
    /// The private address slot whose public address changed
    pub private_ip: IpAddr,
    /// Public address that was replaced and released
    pub old_public_ip: IpAddr,
    /// Public address now bound to the slot
    pub new_public_ip: IpAddr,
    /// Allocation that was released
    pub old_allocation_id: String,
    /// Allocation now bound to the slot
    pub new_allocation_id: String,
    /// Association of the new address
    pub new_association_id: String,
}

/// What a rotation would replace, computed without changing anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    /// Interface that would be updated
    pub interface_id: InterfaceId,
    /// Slot whose public address would change
    pub private_ip: IpAddr,
    /// Public address that would be replaced
    pub old_public_ip: IpAddr,
    /// Association that would be removed
    pub association_id: String,
    /// Allocation that would be released
    pub allocation_id: String,
}

/// The slot chosen for replacement
#[derive(Debug, Clone)]
struct Target {
    interface_id: InterfaceId,
    private_ip: IpAddr,
    association: Association,
}

/// Address rotator
///
/// ## Lifecycle
///
/// 1. Create with [`Rotator::new()`]
/// 2. Call [`Rotator::rotate()`] (or [`Rotator::plan()`] for a dry run)
///
/// ## Concurrency
///
/// A rotation is one strictly sequential chain of provider calls. Two
/// rotations against the same pool at the same time can race on the same
/// interface; callers must not run them concurrently.
pub struct Rotator {
    /// Provider the calls go to
    provider: Box<dyn AddressProvider>,

    /// Source of the interface and slot choices
    selector: Box<dyn Selector>,

    /// Interfaces eligible for rotation
    pool: Vec<InterfaceId>,

    /// Deadline for a whole rotation
    timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<RotationEvent>,
}

impl Rotator {
    /// Create a new rotator
    ///
    /// # Returns
    ///
    /// A tuple of (rotator, event_receiver) where event_receiver yields rotation events
    pub fn new(
        provider: Box<dyn AddressProvider>,
        selector: Box<dyn Selector>,
        config: RotatorConfig,
    ) -> Result<(Self, mpsc::Receiver<RotationEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.rotation.event_channel_capacity);

        let rotator = Self {
            provider,
            selector,
            pool: config.pool.dynamic,
            timeout: config.rotation.timeout(),
            event_tx: tx,
        };

        Ok((rotator, rx))
    }

    /// Override the rotation deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Interfaces eligible for rotation
    pub fn pool(&self) -> &[InterfaceId] {
        &self.pool
    }

    /// Replace one public address on one randomly chosen interface
    ///
    /// # Returns
    ///
    /// - `Ok(RotationReport)`: the old address is released and the new one
    ///   is bound to the same private address slot
    /// - `Err(Error::Precondition)`: the chosen interface has no associated
    ///   address; nothing was disassociated, associated or released
    /// - `Err(Error::Step)`: a provider call failed; later steps were not attempted
    /// - `Err(Error::Timeout)`: the deadline passed; later steps were not attempted
    pub async fn rotate(&self) -> Result<RotationReport> {
        self.emit_event(RotationEvent::Started {
            pool_size: self.pool.len(),
        });

        let result = self.with_deadline(self.run_rotation()).await;

        match &result {
            Ok(report) => {
                info!(
                    "Interface {} has been updated: {} -> {}",
                    report.interface_id, report.old_public_ip, report.new_public_ip
                );
                self.emit_event(RotationEvent::Completed {
                    interface_id: report.interface_id.clone(),
                    old_public_ip: report.old_public_ip,
                    new_public_ip: report.new_public_ip,
                });
            }
            Err(e) => self.report_failure(e),
        }

        result
    }

    /// Choose the interface and slot a rotation would replace, without
    /// allocating or changing anything
    pub async fn plan(&self) -> Result<RotationPlan> {
        let result = self.with_deadline(self.select_target()).await;

        match result {
            Ok(target) => {
                let plan = RotationPlan {
                    interface_id: target.interface_id,
                    private_ip: target.private_ip,
                    old_public_ip: target.association.public_ip,
                    association_id: target.association.association_id,
                    allocation_id: target.association.allocation_id,
                };
                info!(
                    "Would replace {} on {} ({})",
                    plan.old_public_ip, plan.interface_id, plan.private_ip
                );
                self.emit_event(RotationEvent::Planned {
                    interface_id: plan.interface_id.clone(),
                    private_ip: plan.private_ip,
                    public_ip: plan.old_public_ip,
                });
                Ok(plan)
            }
            Err(e) => {
                self.report_failure(&e);
                Err(e)
            }
        }
    }

    async fn run_rotation(&self) -> Result<RotationReport> {
        let allocated = self
            .provider
            .allocate_address()
            .await
            .map_err(|e| self.step_error(Operation::AllocateAddress, e))?;

        info!(
            "Allocated {} ({})",
            allocated.public_ip, allocated.allocation_id
        );
        self.emit_event(RotationEvent::AddressAllocated {
            allocation_id: allocated.allocation_id.clone(),
            public_ip: allocated.public_ip,
        });

        self.replace(&allocated).await.inspect_err(|e| {
            if e.operation() != Some(Operation::ReleaseAddress) {
                warn!(
                    "Allocation {} ({}) is allocated but unused; release it manually",
                    allocated.allocation_id, allocated.public_ip
                );
            }
        })
    }

    /// Swap `allocated` in for a randomly chosen association
    async fn replace(&self, allocated: &AllocatedAddress) -> Result<RotationReport> {
        let Target {
            interface_id,
            private_ip,
            association,
        } = self.select_target().await?;

        self.provider
            .disassociate_address(&association.association_id)
            .await
            .map_err(|e| self.step_error(Operation::DisassociateAddress, e))?;

        info!(
            "Disassociated {} from {} ({})",
            association.public_ip, interface_id, private_ip
        );
        self.emit_event(RotationEvent::AddressDisassociated {
            interface_id: interface_id.clone(),
            association_id: association.association_id.clone(),
            public_ip: association.public_ip,
        });

        let request = AssociateRequest {
            allocation_id: allocated.allocation_id.clone(),
            interface_id: interface_id.clone(),
            private_ip,
            allow_reassociation: false,
        };
        debug!("Associate request: {:?}", request);

        let new_association_id = self
            .provider
            .associate_address(&request)
            .await
            .map_err(|e| {
                warn!(
                    "{} on {} was left without a public address",
                    private_ip, interface_id
                );
                self.step_error(Operation::AssociateAddress, e)
            })?;

        info!(
            "Associated {} with {} ({})",
            allocated.public_ip, interface_id, private_ip
        );
        self.emit_event(RotationEvent::AddressAssociated {
            interface_id: interface_id.clone(),
            private_ip,
            public_ip: allocated.public_ip,
            association_id: new_association_id.clone(),
        });

        self.provider
            .release_address(&association.allocation_id)
            .await
            .map_err(|e| {
                warn!(
                    "Allocation {} ({}) was disassociated but not released; release it manually",
                    association.allocation_id, association.public_ip
                );
                self.step_error(Operation::ReleaseAddress, e)
            })?;

        info!(
            "Released {} ({})",
            association.public_ip, association.allocation_id
        );
        self.emit_event(RotationEvent::AddressReleased {
            allocation_id: association.allocation_id.clone(),
            public_ip: association.public_ip,
        });

        Ok(RotationReport {
            interface_id,
            private_ip,
            old_public_ip: association.public_ip,
            new_public_ip: allocated.public_ip,
            old_allocation_id: association.allocation_id,
            new_allocation_id: allocated.allocation_id.clone(),
            new_association_id,
        })
    }

    /// Pick an interface, then pick one of its associated slots
    async fn select_target(&self) -> Result<Target> {
        let interface_id = pick(self.selector.as_ref(), &self.pool)
            .cloned()
            .ok_or_else(|| Error::config("Interface pool is empty"))?;

        debug!("Selected interface {}", interface_id);
        self.emit_event(RotationEvent::InterfaceSelected {
            interface_id: interface_id.clone(),
        });

        let slots = self
            .provider
            .describe_interface(&interface_id)
            .await
            .map_err(|e| self.step_error(Operation::DescribeInterface, e))?;

        let associated: Vec<(IpAddr, &Association)> = slots
            .iter()
            .filter_map(|slot| slot.association.as_ref().map(|a| (slot.private_ip, a)))
            .collect();

        debug!(
            "Interface {} has {} private address(es), {} associated",
            interface_id,
            slots.len(),
            associated.len()
        );

        let (private_ip, association) = pick(self.selector.as_ref(), &associated)
            .copied()
            .ok_or_else(|| {
                Error::precondition(format!(
                    "Interface {} has no associated public address",
                    interface_id
                ))
            })?;

        debug!(
            "Selected {} ({}) on {}",
            association.public_ip, private_ip, interface_id
        );
        self.emit_event(RotationEvent::SlotSelected {
            interface_id: interface_id.clone(),
            private_ip,
            public_ip: association.public_ip,
        });

        Ok(Target {
            interface_id,
            private_ip,
            association: association.clone(),
        })
    }

    /// Run `operation` under the rotation deadline
    async fn with_deadline<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }

    /// Tag a provider error with the step that produced it
    fn step_error(&self, operation: Operation, source: Error) -> Error {
        error!(
            "{} failed ({}): {}",
            operation,
            self.provider.provider_name(),
            source
        );
        Error::step(operation, source)
    }

    fn report_failure(&self, error: &Error) {
        match error {
            Error::Timeout(_) => {
                error!("{}; remaining steps abandoned", error);
                warn!("Check the pool for allocated but unassociated addresses");
            }
            Error::Step { .. } => {}
            _ => error!("Rotation aborted: {}", error),
        }

        self.emit_event(RotationEvent::Failed {
            operation: error.operation(),
            error: error.to_string(),
        });
    }

    /// Emit a rotation event
    fn emit_event(&self, event: RotationEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, RotatorConfig};
    use crate::pool::InterfacePool;
    use crate::provider::MemoryAddressProvider;
    use crate::selection::RandomSelector;

    fn config(interfaces: &[&str]) -> RotatorConfig {
        RotatorConfig::new(
            InterfacePool::new(interfaces.iter().copied()),
            ProviderConfig::Custom {
                factory: "memory".to_string(),
                config: serde_json::json!({}),
            },
        )
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = Rotator::new(
            Box::new(MemoryAddressProvider::new()),
            Box::new(RandomSelector::seeded(1)),
            config(&[]),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_single_slot_rotation() {
        let provider = MemoryAddressProvider::new();
        provider.add_interface("eni-1", &[ip("10.0.0.5")]).await;
        provider
            .bind_existing("eni-1", ip("10.0.0.5"), "eipalloc-old", ip("1.2.3.4"))
            .await
            .unwrap();

        let (rotator, mut events) = Rotator::new(
            Box::new(provider.clone()),
            Box::new(RandomSelector::seeded(3)),
            config(&["eni-1"]),
        )
        .unwrap();

        let report = rotator.rotate().await.unwrap();
        assert_eq!(report.old_public_ip, ip("1.2.3.4"));
        assert_eq!(
            provider.public_ip_at(&"eni-1".into(), ip("10.0.0.5")).await,
            Some(report.new_public_ip)
        );
        assert!(!provider.is_allocated("eipalloc-old").await);

        assert_eq!(
            events.recv().await,
            Some(RotationEvent::Started { pool_size: 1 })
        );
    }

    #[tokio::test]
    async fn test_events_dropped_when_receiver_closed() {
        let provider = MemoryAddressProvider::new();
        provider.add_interface("eni-1", &[ip("10.0.0.5")]).await;
        provider
            .bind_existing("eni-1", ip("10.0.0.5"), "eipalloc-old", ip("1.2.3.4"))
            .await
            .unwrap();

        let (rotator, events) = Rotator::new(
            Box::new(provider),
            Box::new(RandomSelector::seeded(3)),
            config(&["eni-1"]),
        )
        .unwrap();
        drop(events);

        assert!(rotator.rotate().await.is_ok());
    }

    #[test]
    fn test_rotation_event_equality() {
        let event = RotationEvent::InterfaceSelected {
            interface_id: "eni-1".into(),
        };
        assert_eq!(event.clone(), event);
    }
}
