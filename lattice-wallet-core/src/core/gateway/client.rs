//! Backend gateway: endpoint failover, retry and response validation

use log::{debug, info, warn};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::responses::*;
use super::transport::{NodeTransport, TransportFailure};
use super::validation::validate_response;
use crate::domain::entities::StateBlock;
use crate::shared::constants::{DEFAULT_NODE_ENDPOINTS, MAX_REQUEST_ATTEMPTS, REQUEST_RETRY_DELAY_MS};
use crate::shared::error::WalletError;
use crate::shared::types::{
    Address, BlockHash, BlockSubtype, NodeEndpoint, NodeStatus, OfflineReason, Raw, ServerMode,
};
use crate::shared::WalletResult;

/// Endpoint selection policy
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub mode: ServerMode,
    /// Candidates rotated through in automatic mode
    pub endpoints: Vec<NodeEndpoint>,
    /// The single pinned endpoint used in custom mode
    pub custom_endpoint: Option<NodeEndpoint>,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            mode: ServerMode::Auto,
            endpoints: DEFAULT_NODE_ENDPOINTS.iter().map(|url| NodeEndpoint::new(*url)).collect(),
            custom_endpoint: None,
            max_attempts: MAX_REQUEST_ATTEMPTS,
            retry_delay: Duration::from_millis(REQUEST_RETRY_DELAY_MS),
        }
    }
}

/// JSON request/response client to the ledger node(s)
pub struct BackendGateway {
    transport: Arc<dyn NodeTransport>,
    settings: GatewaySettings,
    current: AtomicUsize,
    status: watch::Sender<NodeStatus>,
}

impl BackendGateway {
    pub fn new(transport: Arc<dyn NodeTransport>, settings: GatewaySettings) -> WalletResult<Self> {
        match settings.mode {
            ServerMode::Auto if settings.endpoints.is_empty() => {
                return Err(WalletError::config("Automatic mode needs at least one endpoint"));
            }
            ServerMode::Custom if settings.custom_endpoint.is_none() => {
                return Err(WalletError::config("Custom mode needs a custom endpoint"));
            }
            _ => {}
        }
        if settings.max_attempts == 0 {
            return Err(WalletError::config("max_attempts must be at least 1"));
        }

        let (status, _) = watch::channel(NodeStatus::Loading);
        Ok(Self {
            transport,
            settings,
            current: AtomicUsize::new(0),
            status,
        })
    }

    pub fn status(&self) -> NodeStatus {
        *self.status.borrow()
    }

    /// Late subscribers observe the last published status
    pub fn subscribe_status(&self) -> watch::Receiver<NodeStatus> {
        self.status.subscribe()
    }

    pub fn mode(&self) -> ServerMode {
        self.settings.mode
    }

    pub fn current_endpoint(&self) -> &NodeEndpoint {
        match (&self.settings.mode, &self.settings.custom_endpoint) {
            (ServerMode::Custom, Some(endpoint)) => endpoint,
            _ => {
                let endpoints = &self.settings.endpoints;
                &endpoints[self.current.load(Ordering::SeqCst) % endpoints.len()]
            }
        }
    }

    fn set_status(&self, next: NodeStatus) {
        let changed = self.status.send_if_modified(|status| {
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        });
        if changed {
            info!("Node status is now {:?}", next);
        }
    }

    /// Post `{"action": action, ..params}` to the current endpoint
    pub async fn call(&self, action: &str, params: Value) -> WalletResult<Value> {
        let body = request_body(action, params)?;
        match self.settings.mode {
            ServerMode::Custom => self.call_pinned(action, &body).await,
            ServerMode::Auto => self.call_with_failover(action, &body).await,
        }
    }

    async fn attempt(
        &self,
        endpoint: &NodeEndpoint,
        action: &str,
        body: &Value,
    ) -> Result<Value, TransportFailure> {
        let response = self.transport.post(endpoint, body).await?;
        validate_response(action, &response).map_err(TransportFailure::Malformed)?;
        Ok(response)
    }

    async fn call_pinned(&self, action: &str, body: &Value) -> WalletResult<Value> {
        let endpoint = self.current_endpoint();
        match self.attempt(endpoint, action, body).await {
            Ok(response) => {
                self.set_status(NodeStatus::Online);
                Ok(response)
            }
            Err(failure) => {
                warn!("{} failed against pinned endpoint {}: {}", action, endpoint.url, failure);
                self.set_status(NodeStatus::Offline(failure.offline_reason()));
                Err(WalletError::offline(format!("{}: {}", action, failure)))
            }
        }
    }

    async fn call_with_failover(&self, action: &str, body: &Value) -> WalletResult<Value> {
        let endpoints = &self.settings.endpoints;
        let max_attempts = self.settings.max_attempts;
        let mut reason = OfflineReason::Unreachable;

        for attempt in 1..=max_attempts {
            let index = self.current.load(Ordering::SeqCst) % endpoints.len();
            let endpoint = &endpoints[index];

            match self.attempt(endpoint, action, body).await {
                Ok(response) => {
                    if attempt > 1 {
                        info!("{} succeeded against {} after {} attempts", action, endpoint.url, attempt);
                    }
                    self.set_status(NodeStatus::Online);
                    return Ok(response);
                }
                Err(failure) => {
                    warn!(
                        "{} failed against {} (attempt {}/{}): {}",
                        action, endpoint.url, attempt, max_attempts, failure
                    );
                    reason = failure.offline_reason();
                    self.current.store((index + 1) % endpoints.len(), Ordering::SeqCst);
                    if attempt < max_attempts && !self.settings.retry_delay.is_zero() {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }

        self.set_status(NodeStatus::Offline(reason));
        Err(WalletError::offline(format!(
            "{} failed after {} attempts",
            action, max_attempts
        )))
    }

    pub async fn account_info(&self, account: &str) -> WalletResult<Option<AccountInfo>> {
        let response = self
            .call("account_info", json!({ "account": account, "representative": true }))
            .await?;
        match node_error(&response) {
            Some("Account not found") => Ok(None),
            Some(error) => Err(WalletError::network(format!("account_info: {}", error))),
            None => parse_account_info(&response).map(Some),
        }
    }

    pub async fn accounts_balances(
        &self,
        accounts: &[Address],
    ) -> WalletResult<HashMap<Address, AccountBalance>> {
        let response = self.call("accounts_balances", json!({ "accounts": accounts })).await?;
        if let Some(error) = node_error(&response) {
            return Err(WalletError::network(format!("accounts_balances: {}", error)));
        }
        Ok(parse_balances(&response))
    }

    pub async fn accounts_frontiers(
        &self,
        accounts: &[Address],
    ) -> WalletResult<HashMap<Address, BlockHash>> {
        let response = self.call("accounts_frontiers", json!({ "accounts": accounts })).await?;
        if let Some(error) = node_error(&response) {
            return Err(WalletError::network(format!("accounts_frontiers: {}", error)));
        }
        parse_frontiers(&response)
    }

    /// Confirmed receivable blocks at or above `threshold`, with source accounts
    pub async fn accounts_receivable(
        &self,
        accounts: &[Address],
        threshold: Raw,
        count: u32,
    ) -> WalletResult<HashMap<Address, Vec<ReceivableEntry>>> {
        let response = self
            .call(
                "accounts_receivable",
                json!({
                    "accounts": accounts,
                    "count": count.to_string(),
                    "threshold": threshold.to_string(),
                    "source": true,
                    "sorting": true,
                    "include_only_confirmed": true,
                }),
            )
            .await?;
        if let Some(error) = node_error(&response) {
            return Err(WalletError::network(format!("accounts_receivable: {}", error)));
        }
        parse_receivable(&response)
    }

    /// Block contents by hash. Unknown hashes are absent from the map.
    pub async fn blocks_info(&self, hashes: &[BlockHash]) -> WalletResult<HashMap<BlockHash, BlockInfo>> {
        let hashes: Vec<String> = hashes.iter().map(BlockHash::to_hex).collect();
        let response = self
            .call("blocks_info", json!({ "hashes": hashes, "json_block": true }))
            .await?;
        match node_error(&response) {
            Some(error) if error.contains("not found") => Ok(HashMap::new()),
            Some(error) => Err(WalletError::network(format!("blocks_info: {}", error))),
            None => parse_blocks_info(&response),
        }
    }

    /// Submit a finished block; a node-level error is a rejection
    pub async fn process(&self, block: &StateBlock, subtype: BlockSubtype) -> WalletResult<BlockHash> {
        let response = self
            .call(
                "process",
                json!({
                    "json_block": true,
                    "subtype": subtype.as_str(),
                    "block": block.to_json(),
                }),
            )
            .await?;
        if let Some(error) = node_error(&response) {
            return Err(WalletError::rejected(error));
        }
        response
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| WalletError::rejected("process reply has no hash"))?
            .parse()
    }

    pub async fn work_generate(&self, root: &BlockHash, difficulty: u64) -> WalletResult<u64> {
        debug!("Requesting remote work for {}", root);
        let response = self
            .call(
                "work_generate",
                json!({ "hash": root.to_hex(), "difficulty": format!("{:016x}", difficulty) }),
            )
            .await?;
        if let Some(error) = node_error(&response) {
            return Err(WalletError::network(format!("work_generate: {}", error)));
        }
        let work = response.get("work").and_then(Value::as_str).unwrap_or_default();
        u64::from_str_radix(work, 16)
            .map_err(|e| WalletError::network(format!("work_generate returned invalid work: {}", e)))
    }

    pub async fn block_count(&self) -> WalletResult<BlockCount> {
        let response = self.call("block_count", Value::Null).await?;
        if let Some(error) = node_error(&response) {
            return Err(WalletError::network(format!("block_count: {}", error)));
        }
        Ok(parse_block_count(&response))
    }

    pub async fn confirmation_quorum(&self) -> WalletResult<ConfirmationQuorum> {
        let response = self.call("confirmation_quorum", Value::Null).await?;
        if let Some(error) = node_error(&response) {
            return Err(WalletError::network(format!("confirmation_quorum: {}", error)));
        }
        Ok(parse_quorum(&response))
    }

    pub async fn version(&self) -> WalletResult<NodeVersion> {
        let response = self.call("version", Value::Null).await?;
        if let Some(error) = node_error(&response) {
            return Err(WalletError::network(format!("version: {}", error)));
        }
        Ok(serde_json::from_value(response)?)
    }
}

fn request_body(action: &str, params: Value) -> WalletResult<Value> {
    let mut body = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(WalletError::internal(format!(
                "{} params must be an object, got {}",
                action, other
            )))
        }
    };
    body.insert("action".to_string(), Value::String(action.to_string()));
    Ok(Value::Object(body))
}
