//! Account ledger state
//!
//! Owns the held wallets and their accounts, reconciles them against the
//! node, and routes user operations and feed confirmations through the
//! block builder and the receivable queue.

pub mod events;
pub mod state;

pub use events::*;
pub use state::*;
