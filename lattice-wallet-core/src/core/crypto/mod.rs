//! Cryptographic functionality for the wallet core
//!
//! This module provides hashing, key management, block signing and
//! password-based encryption of wallet secrets.
//!
//! SECURITY: secret material (seeds, private keys, derived encryption keys)
//! is held in zeroizing containers and never implements Debug or Clone.

pub mod keys;
pub mod encryption;
pub mod hashing;
pub mod signer;

// Re-export all public items from submodules
pub use keys::*;
pub use encryption::*;
pub use hashing::*;
pub use signer::*;
