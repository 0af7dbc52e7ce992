//! Socket collaborator behind the realtime feed

use async_trait::async_trait;
use serde_json::Value;

use crate::shared::WalletResult;

/// Opens push connections to the node's feed endpoint
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn connect(&self, url: &str) -> WalletResult<Box<dyn FeedConnection>>;
}

/// An open, message-oriented connection
#[async_trait]
pub trait FeedConnection: Send {
    async fn send(&mut self, message: Value) -> WalletResult<()>;

    /// Next inbound message; `None` once the connection closed
    async fn next(&mut self) -> Option<WalletResult<Value>>;
}
