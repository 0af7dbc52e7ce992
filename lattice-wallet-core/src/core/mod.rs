//! Core wallet functionality
//!
//! This module contains the sync and transaction-lifecycle engine: node
//! access, proof-of-work, the realtime feed, block construction, the
//! receivable queue, the account ledger state and wallet management.

pub mod crypto;
pub mod gateway;
pub mod work;
pub mod feed;
pub mod blocks;
pub mod receivable;
pub mod ledger;
pub mod wallet;
