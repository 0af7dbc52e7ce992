//! Domain layer - entities and repositories
//!
//! This module contains the accounts, wallets, blocks and pending transfers
//! the synchronization engine operates on.

pub mod entities;
pub mod repositories;

// Re-export domain components
pub use entities::*;
pub use repositories::*;
