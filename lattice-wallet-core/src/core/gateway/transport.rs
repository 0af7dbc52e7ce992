//! Transport used by the gateway to reach a ledger node

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::shared::constants::HTTP_TOO_MANY_REQUESTS;
use crate::shared::error::WalletError;
use crate::shared::types::{NodeEndpoint, OfflineReason};

/// Why a single request attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("rate limited by node")]
    RateLimited,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportFailure {
    pub fn offline_reason(&self) -> OfflineReason {
        match self {
            TransportFailure::RateLimited => OfflineReason::RateLimited,
            _ => OfflineReason::Unreachable,
        }
    }
}

/// One JSON request/response exchange with a node
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn post(&self, endpoint: &NodeEndpoint, body: &Value) -> Result<Value, TransportFailure>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, WalletError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn post(&self, endpoint: &NodeEndpoint, body: &Value) -> Result<Value, TransportFailure> {
        let mut request = self.client.post(&endpoint.url).json(body);
        if let Some(token) = &endpoint.token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportFailure::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == HTTP_TOO_MANY_REQUESTS {
            return Err(TransportFailure::RateLimited);
        }
        if !status.is_success() {
            return Err(TransportFailure::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportFailure::Malformed(e.to_string()))
    }
}
