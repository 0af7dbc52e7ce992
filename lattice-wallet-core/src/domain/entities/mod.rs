//! Domain entities and value objects
//!
//! This module contains the core domain entities that represent
//! accounts, wallets, blocks and pending transfers.

pub mod account;
pub mod block;
pub mod receivable;
pub mod wallet;

// Re-export entities
pub use account::*;
pub use block::*;
pub use receivable::*;
pub use wallet::*;
