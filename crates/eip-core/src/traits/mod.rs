//! Core traits for address rotation
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressProvider`]: Allocate, bind, unbind and release public addresses
//! - [`Selector`]: Source of the random choices a rotation makes

pub mod address_provider;
pub mod selector;

pub use address_provider::{
    AddressProvider, AddressProviderFactory, AllocatedAddress, AssociateRequest, Association,
    InterfaceId, Operation, PrivateAddressSlot,
};
pub use selector::Selector;
