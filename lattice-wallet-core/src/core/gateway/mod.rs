//! Backend gateway to the ledger node(s)
//!
//! This module contains the node transport, the failover client with its
//! typed RPC helpers, and structural response validation.

pub mod client;
pub mod responses;
pub mod transport;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export all public items from submodules
pub use client::*;
pub use responses::*;
pub use transport::*;
pub use validation::*;
