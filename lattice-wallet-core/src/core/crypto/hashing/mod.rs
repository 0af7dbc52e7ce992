//! Hashing functionality for the wallet core
//!
//! All ledger hashing is blake2b at different digest lengths: 32 bytes for
//! block hashes and key derivation, 8 bytes for proof-of-work difficulty,
//! 5 bytes for address checksums.

pub mod hash_manager;

pub use hash_manager::*;
