//! Scripted in-memory node for tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::client::{BackendGateway, GatewaySettings};
use super::transport::{NodeTransport, TransportFailure};
use crate::core::crypto::keys::{encode_address, SecurePrivateKey};
use crate::domain::entities::StateBlock;
use crate::shared::types::{Address, BlockHash, BlockSubtype, NodeEndpoint, PublicKey, ServerMode};

type Handler = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Serves canned replies per action and records every request
#[derive(Default)]
pub struct ScriptedTransport {
    handlers: Mutex<HashMap<String, Handler>>,
    once: Mutex<HashMap<String, VecDeque<Value>>>,
    failures: Mutex<HashMap<String, TransportFailure>>,
    requests: Mutex<Vec<(String, Value)>>,
    latency: Mutex<Duration>,
    reply_delays: Mutex<HashMap<String, Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, action: &str, response: Value) {
        self.respond_with(action, move |_| response.clone());
    }

    pub fn respond_with(&self, action: &str, handler: impl Fn(&Value) -> Value + Send + Sync + 'static) {
        self.handlers.lock().unwrap().insert(action.to_string(), Arc::new(handler));
    }

    /// Queued reply served before the persistent one
    pub fn respond_once(&self, action: &str, response: Value) {
        self.once
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn fail_endpoint(&self, url: &str, failure: TransportFailure) {
        self.failures.lock().unwrap().insert(url.to_string(), failure);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Answer `action` from the state at request time but deliver the
    /// reply only after `delay`
    pub fn delay_replies(&self, action: &str, delay: Duration) {
        self.reply_delays.lock().unwrap().insert(action.to_string(), delay);
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn bodies(&self, action: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .map(|(_, body)| body)
            .filter(|body| body["action"] == action)
            .collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.bodies(action).len()
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    async fn post(&self, endpoint: &NodeEndpoint, body: &Value) -> Result<Value, TransportFailure> {
        self.requests.lock().unwrap().push((endpoint.url.clone(), body.clone()));

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(failure) = self.failures.lock().unwrap().get(&endpoint.url) {
            return Err(failure.clone());
        }

        let action = body["action"].as_str().unwrap_or_default().to_string();
        let queued = self.once.lock().unwrap().get_mut(&action).and_then(VecDeque::pop_front);
        let reply = match queued {
            Some(reply) => reply,
            None => {
                let handler = self.handlers.lock().unwrap().get(&action).cloned();
                match handler {
                    Some(handler) => handler(body),
                    None => json!({ "error": format!("unscripted action {}", action) }),
                }
            }
        };

        let delay = self.reply_delays.lock().unwrap().get(&action).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(reply)
    }
}

/// Single-endpoint gateway without retry delay
pub fn scripted_gateway(transport: Arc<ScriptedTransport>) -> BackendGateway {
    let settings = GatewaySettings {
        mode: ServerMode::Auto,
        endpoints: vec![NodeEndpoint::new("http://node.test")],
        custom_endpoint: None,
        max_attempts: 3,
        retry_delay: Duration::ZERO,
    };
    BackendGateway::new(transport, settings).unwrap()
}

/// `blocks_info` reply carrying the given confirmed blocks
pub fn blocks_info_reply(blocks: &[(&StateBlock, BlockSubtype)]) -> Value {
    let mut entries = serde_json::Map::new();
    for (block, subtype) in blocks {
        entries.insert(
            block.hash().to_hex(),
            json!({
                "block_account": encode_address(&block.account),
                "amount": "0",
                "balance": block.balance.to_string(),
                "subtype": subtype.as_str(),
                "confirmed": "true",
                "local_timestamp": "1700000000",
                "contents": block.to_json(),
            }),
        );
    }
    json!({ "blocks": entries })
}

/// `process` handler accepting any well-formed block under its own hash
pub fn accept_blocks(transport: &ScriptedTransport) {
    transport.respond_with("process", |body| match StateBlock::from_json(&body["block"]) {
        Ok(block) => json!({ "hash": block.hash().to_hex() }),
        Err(e) => json!({ "error": e.to_string() }),
    });
}

struct Chain {
    frontier: BlockHash,
    balance: u128,
    representative: PublicKey,
}

/// In-memory lattice answering the reconciliation and submission actions.
/// Accepted sends to known accounts become receivable; receives consume them.
#[derive(Default)]
pub struct FakeNode {
    chains: Mutex<HashMap<Address, Chain>>,
    blocks: Mutex<HashMap<BlockHash, (StateBlock, BlockSubtype)>>,
    receivable: Mutex<HashMap<Address, Vec<(BlockHash, u128, Address)>>>,
}

impl FakeNode {
    pub fn install(transport: &ScriptedTransport) -> Arc<Self> {
        let node = Arc::new(Self::default());

        let n = node.clone();
        transport.respond_with("accounts_balances", move |body| n.balances(body));
        let n = node.clone();
        transport.respond_with("accounts_frontiers", move |body| n.frontiers(body));
        let n = node.clone();
        transport.respond_with("accounts_receivable", move |body| n.receivable(body));
        let n = node.clone();
        transport.respond_with("account_info", move |body| n.account_info(body));
        let n = node.clone();
        transport.respond_with("blocks_info", move |body| n.blocks_info(body));
        let n = node.clone();
        transport.respond_with("process", move |body| n.process(body));
        node
    }

    /// Open `key`'s account with a signed block holding `balance`
    pub fn open_account(&self, key: &SecurePrivateKey, balance: u128, representative: PublicKey) -> StateBlock {
        let mut block = StateBlock {
            account: key.public_key(),
            previous: BlockHash::ZERO,
            representative,
            balance,
            link: BlockHash([0xEE; 32]),
            signature: None,
            work: None,
        };
        block.signature = Some(key.sign(&block.hash()));
        self.store(block.clone(), BlockSubtype::Open);
        block
    }

    pub fn add_receivable(&self, destination: &str, hash: BlockHash, amount: u128, source: &str) {
        self.receivable
            .lock()
            .unwrap()
            .entry(destination.to_string())
            .or_default()
            .push((hash, amount, source.to_string()));
    }

    pub fn remove_receivable(&self, hash: &BlockHash) {
        for entries in self.receivable.lock().unwrap().values_mut() {
            entries.retain(|(pending, _, _)| pending != hash);
        }
    }

    pub fn balance(&self, address: &str) -> Option<u128> {
        self.chains.lock().unwrap().get(address).map(|chain| chain.balance)
    }

    pub fn frontier(&self, address: &str) -> Option<BlockHash> {
        self.chains.lock().unwrap().get(address).map(|chain| chain.frontier)
    }

    fn store(&self, block: StateBlock, subtype: BlockSubtype) {
        let hash = block.hash();
        self.chains.lock().unwrap().insert(
            encode_address(&block.account),
            Chain { frontier: hash, balance: block.balance, representative: block.representative },
        );
        self.blocks.lock().unwrap().insert(hash, (block, subtype));
    }

    fn addresses(body: &Value) -> Vec<String> {
        body["accounts"]
            .as_array()
            .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn pending_total(&self, address: &str) -> u128 {
        self.receivable
            .lock()
            .unwrap()
            .get(address)
            .map(|entries| entries.iter().map(|(_, amount, _)| amount).sum())
            .unwrap_or(0)
    }

    fn balances(&self, body: &Value) -> Value {
        let mut balances = serde_json::Map::new();
        for address in Self::addresses(body) {
            let balance = self.balance(&address).unwrap_or(0);
            balances.insert(
                address.clone(),
                json!({
                    "balance": balance.to_string(),
                    "receivable": self.pending_total(&address).to_string(),
                }),
            );
        }
        json!({ "balances": balances })
    }

    fn frontiers(&self, body: &Value) -> Value {
        let chains = self.chains.lock().unwrap();
        let mut frontiers = serde_json::Map::new();
        for address in Self::addresses(body) {
            if let Some(chain) = chains.get(&address) {
                frontiers.insert(address, json!(chain.frontier.to_hex()));
            }
        }
        json!({ "frontiers": frontiers })
    }

    fn receivable(&self, body: &Value) -> Value {
        let threshold: u128 = body["threshold"].as_str().and_then(|s| s.parse().ok()).unwrap_or(0);
        let pending = self.receivable.lock().unwrap();
        let mut blocks = serde_json::Map::new();
        for address in Self::addresses(body) {
            let mut entries = serde_json::Map::new();
            for (hash, amount, source) in pending.get(&address).into_iter().flatten() {
                if *amount >= threshold {
                    entries.insert(hash.to_hex(), json!({ "amount": amount.to_string(), "source": source }));
                }
            }
            if !entries.is_empty() {
                blocks.insert(address, Value::Object(entries));
            }
        }
        if blocks.is_empty() {
            json!({ "blocks": "" })
        } else {
            json!({ "blocks": blocks })
        }
    }

    fn account_info(&self, body: &Value) -> Value {
        let address = body["account"].as_str().unwrap_or_default();
        match self.chains.lock().unwrap().get(address) {
            Some(chain) => json!({
                "frontier": chain.frontier.to_hex(),
                "balance": chain.balance.to_string(),
                "representative": encode_address(&chain.representative),
                "block_count": "1",
            }),
            None => json!({ "error": "Account not found" }),
        }
    }

    fn blocks_info(&self, body: &Value) -> Value {
        let blocks = self.blocks.lock().unwrap();
        let mut found: Vec<(&StateBlock, BlockSubtype)> = Vec::new();
        for hash in body["hashes"].as_array().into_iter().flatten().filter_map(Value::as_str) {
            match hash.parse::<BlockHash>().ok().and_then(|h| blocks.get(&h)) {
                Some((block, subtype)) => found.push((block, *subtype)),
                None => return json!({ "error": "Block not found" }),
            }
        }
        blocks_info_reply(&found)
    }

    fn process(&self, body: &Value) -> Value {
        let block = match StateBlock::from_json(&body["block"]) {
            Ok(block) => block,
            Err(e) => return json!({ "error": e.to_string() }),
        };
        let subtype: BlockSubtype = match body["subtype"].as_str().unwrap_or_default().parse() {
            Ok(subtype) => subtype,
            Err(e) => return json!({ "error": e.to_string() }),
        };
        let address = encode_address(&block.account);
        let expected_previous = self.frontier(&address).unwrap_or(BlockHash::ZERO);
        if block.previous != expected_previous {
            return json!({ "error": "Fork" });
        }

        match subtype {
            BlockSubtype::Send => {
                let destination = encode_address(&PublicKey(block.link.0));
                let amount = self.balance(&address).unwrap_or(0) - block.balance;
                self.add_receivable(&destination, block.hash(), amount, &address);
            }
            BlockSubtype::Receive | BlockSubtype::Open => {
                let mut pending = self.receivable.lock().unwrap();
                let entries = pending.entry(address.clone()).or_default();
                let before = entries.len();
                entries.retain(|(hash, _, _)| *hash != block.link);
                if entries.len() == before {
                    return json!({ "error": "Unreceivable" });
                }
            }
            _ => {}
        }

        let hash = block.hash();
        self.store(block, subtype);
        json!({ "hash": hash.to_hex() })
    }
}
