//! Encryption functionality for the wallet core
//!
//! This module handles password-based AES-256-GCM encryption of wallet seeds
//! and imported keys.

pub mod encryption_manager;
pub mod encrypted_data;

// Re-export all public items from submodules
pub use encryption_manager::*;
pub use encrypted_data::*;
