//! Realtime confirmation feed
//!
//! Keeps the subscribed account set, replays it on every connection and
//! emits confirmed blocks. De-duplication against the pull path is the
//! consumer's job.

pub mod client;
pub mod messages;
pub mod transport;
pub mod websocket;

pub use client::*;
pub use messages::*;
pub use transport::*;
pub use websocket::*;
