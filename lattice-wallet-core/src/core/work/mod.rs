//! Proof-of-work cache
//!
//! Tokens are keyed by work root (the frontier hash, or the public key of
//! an unopened account) and tagged with the tier they satisfy.

pub mod cache;
pub mod generator;

pub use cache::*;
pub use generator::*;
