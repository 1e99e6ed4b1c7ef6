// # Address Provider Implementations
//
// Providers that live in the core crate. Cloud providers ship as their own
// crates (see `eip-provider-ec2`).

pub mod memory;

pub use memory::MemoryAddressProvider;
