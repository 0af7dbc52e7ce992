//! WebSocket feed transport carrying JSON text frames

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::transport::{FeedConnection, FeedTransport};
use crate::shared::error::WalletError;
use crate::shared::WalletResult;

pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl FeedTransport for WebSocketTransport {
    async fn connect(&self, url: &str) -> WalletResult<Box<dyn FeedConnection>> {
        let (stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| WalletError::network(format!("Feed handshake with {} timed out", url)))?
            .map_err(|e| WalletError::network(format!("Feed handshake with {} failed: {}", url, e)))?;
        debug!("Feed handshake with {} answered {}", url, response.status());
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnection for WebSocketConnection {
    async fn send(&mut self, message: Value) -> WalletResult<()> {
        self.stream
            .send(Message::Text(message.to_string().into()))
            .await
            .map_err(|e| WalletError::network(format!("Feed write failed: {}", e)))
    }

    async fn next(&mut self) -> Option<WalletResult<Value>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(WalletError::network(format!("Feed read failed: {}", e)))),
            };
            let parsed = match frame {
                Message::Text(text) => serde_json::from_str::<Value>(&text),
                Message::Binary(bytes) => serde_json::from_slice::<Value>(&bytes),
                Message::Close(_) => return None,
                // Pings are answered by the protocol layer
                _ => continue,
            };
            match parsed {
                Ok(message) => return Some(Ok(message)),
                Err(e) => warn!("Skipping malformed feed frame: {}", e),
            }
        }
    }
}
