//! GATT (Generic Attribute Profile) object model
//!
//! Services, characteristics and descriptors as reported by the worker's
//! discovery commands, and the per-connection cache that holds them.

pub mod cache;
pub mod types;

#[cfg(test)]
mod tests;

pub use cache::DiscoveryCache;
pub use types::{Characteristic, CharacteristicProperties, Descriptor, Service};
