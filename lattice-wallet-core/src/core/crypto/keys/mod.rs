//! Key management for the wallet core
//!
//! Seed handling, per-index key derivation, block signatures and the
//! account address codec.

pub mod address;
pub mod secure_private_key;
pub mod secure_seed;

// Re-export all public items from submodules
pub use address::*;
pub use secure_private_key::*;
pub use secure_seed::*;
