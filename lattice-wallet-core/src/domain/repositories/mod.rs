//! Domain repositories
//!
//! This module contains repository traits for data access.

pub mod wallet_repository;

// Re-export repositories
pub use wallet_repository::*;
