//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StorePort`: Accounts, assets, and telemetry records

mod store_port;

pub use store_port::{StoreError, StorePort};

#[cfg(test)]
pub(crate) mod fakes;
