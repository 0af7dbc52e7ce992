//! Typed views of node replies

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::shared::error::WalletError;
use crate::shared::types::{raw_string, Address, BlockHash, BlockSubtype, Raw};
use crate::shared::utils::raw_from_json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub frontier: BlockHash,
    #[serde(with = "raw_string")]
    pub balance: Raw,
    pub representative: Option<Address>,
    pub block_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountBalance {
    pub balance: Raw,
    pub receivable: Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivableEntry {
    pub hash: BlockHash,
    pub amount: Raw,
    pub source: Option<Address>,
}

/// One entry of a `blocks_info` reply
#[derive(Debug, Clone, PartialEq)]
pub struct BlockInfo {
    pub block_account: Address,
    pub amount: Raw,
    pub balance: Raw,
    pub subtype: Option<BlockSubtype>,
    pub confirmed: bool,
    /// Seconds since the epoch
    pub local_timestamp: Option<u64>,
    /// The block as the node serialized it (`json_block: true`)
    pub contents: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCount {
    pub count: u64,
    pub unchecked: u64,
    pub cemented: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmationQuorum {
    pub quorum_delta: Raw,
    pub online_stake_total: Raw,
    pub peers_stake_total: Raw,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeVersion {
    pub rpc_version: String,
    pub protocol_version: String,
    pub node_vendor: String,
}

/// Message of a node-level `{"error": ..}` reply
pub fn node_error(response: &Value) -> Option<&str> {
    response.get("error").and_then(Value::as_str)
}

/// Numbers travel as decimal strings
pub(crate) fn u64_field(value: &Value, field: &str) -> Option<u64> {
    match value.get(field)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn raw_field(value: &Value, field: &str) -> Raw {
    value.get(field).and_then(raw_from_json).unwrap_or(0)
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn parse_account_info(response: &Value) -> Result<AccountInfo, WalletError> {
    let frontier = response
        .get("frontier")
        .and_then(Value::as_str)
        .ok_or_else(|| WalletError::network("account_info reply has no frontier"))?
        .parse()?;
    Ok(AccountInfo {
        frontier,
        balance: raw_field(response, "balance"),
        representative: str_field(response, "representative"),
        block_count: u64_field(response, "block_count").unwrap_or(0),
    })
}

pub(crate) fn parse_balances(response: &Value) -> HashMap<Address, AccountBalance> {
    let mut balances = HashMap::new();
    if let Some(entries) = response.get("balances").and_then(Value::as_object) {
        for (address, entry) in entries {
            // Older nodes report "pending" instead of "receivable"
            let receivable = entry
                .get("receivable")
                .or_else(|| entry.get("pending"))
                .and_then(raw_from_json)
                .unwrap_or(0);
            balances.insert(
                address.clone(),
                AccountBalance { balance: raw_field(entry, "balance"), receivable },
            );
        }
    }
    balances
}

pub(crate) fn parse_frontiers(response: &Value) -> Result<HashMap<Address, BlockHash>, WalletError> {
    let mut frontiers = HashMap::new();
    if let Some(entries) = response.get("frontiers").and_then(Value::as_object) {
        for (address, hash) in entries {
            if let Some(hash) = hash.as_str() {
                frontiers.insert(address.clone(), hash.parse()?);
            }
        }
    }
    Ok(frontiers)
}

pub(crate) fn parse_receivable(
    response: &Value,
) -> Result<HashMap<Address, Vec<ReceivableEntry>>, WalletError> {
    let mut receivable = HashMap::new();
    let Some(accounts) = response.get("blocks").and_then(Value::as_object) else {
        return Ok(receivable);
    };

    for (address, blocks) in accounts {
        let mut entries = Vec::new();
        match blocks {
            // source: true
            Value::Object(map) => {
                for (hash, details) in map {
                    let (amount, source) = match details {
                        Value::Object(_) => (raw_field(details, "amount"), str_field(details, "source")),
                        other => (raw_from_json(other).unwrap_or(0), None),
                    };
                    entries.push(ReceivableEntry { hash: hash.parse()?, amount, source });
                }
            }
            // plain list of hashes
            Value::Array(hashes) => {
                for hash in hashes.iter().filter_map(Value::as_str) {
                    entries.push(ReceivableEntry { hash: hash.parse()?, amount: 0, source: None });
                }
            }
            _ => {}
        }
        receivable.insert(address.clone(), entries);
    }
    Ok(receivable)
}

pub(crate) fn parse_blocks_info(response: &Value) -> Result<HashMap<BlockHash, BlockInfo>, WalletError> {
    let mut blocks = HashMap::new();
    if let Some(entries) = response.get("blocks").and_then(Value::as_object) {
        for (hash, entry) in entries {
            let info = BlockInfo {
                block_account: str_field(entry, "block_account").unwrap_or_default(),
                amount: raw_field(entry, "amount"),
                balance: raw_field(entry, "balance"),
                subtype: entry
                    .get("subtype")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok()),
                confirmed: match entry.get("confirmed") {
                    Some(Value::Bool(b)) => *b,
                    Some(Value::String(s)) => s == "true",
                    _ => false,
                },
                local_timestamp: u64_field(entry, "local_timestamp"),
                contents: entry.get("contents").cloned().unwrap_or(Value::Null),
            };
            blocks.insert(hash.parse()?, info);
        }
    }
    Ok(blocks)
}

pub(crate) fn parse_block_count(response: &Value) -> BlockCount {
    BlockCount {
        count: u64_field(response, "count").unwrap_or(0),
        unchecked: u64_field(response, "unchecked").unwrap_or(0),
        cemented: u64_field(response, "cemented").unwrap_or(0),
    }
}

pub(crate) fn parse_quorum(response: &Value) -> ConfirmationQuorum {
    ConfirmationQuorum {
        quorum_delta: raw_field(response, "quorum_delta"),
        online_stake_total: raw_field(response, "online_stake_total"),
        peers_stake_total: raw_field(response, "peers_stake_total"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH: &str = "991CF190094C00F0B68E2E5F75F6BEE95A2E0BD93CEAA4A6734DB9F19B728948";

    #[test]
    fn test_parse_balances_accepts_pending_field() {
        let reply = json!({"balances": {
            "nano_a": {"balance": "100", "receivable": "5"},
            "nano_b": {"balance": "7", "pending": "3"},
        }});
        let balances = parse_balances(&reply);
        assert_eq!(balances["nano_a"], AccountBalance { balance: 100, receivable: 5 });
        assert_eq!(balances["nano_b"], AccountBalance { balance: 7, receivable: 3 });
    }

    #[test]
    fn test_parse_receivable_with_source() {
        let reply = json!({"blocks": {
            "nano_a": { HASH: {"amount": "42", "source": "nano_src"} },
            "nano_b": "",
        }});
        let receivable = parse_receivable(&reply).unwrap();
        let entries = &receivable["nano_a"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hash.to_hex(), HASH);
        assert_eq!(entries[0].amount, 42);
        assert_eq!(entries[0].source.as_deref(), Some("nano_src"));
        assert!(!receivable.contains_key("nano_b"));
    }

    #[test]
    fn test_parse_receivable_empty_string() {
        assert!(parse_receivable(&json!({"blocks": ""})).unwrap().is_empty());
    }

    #[test]
    fn test_parse_blocks_info() {
        let reply = json!({"blocks": { HASH: {
            "block_account": "nano_a",
            "amount": "10",
            "balance": "90",
            "subtype": "send",
            "confirmed": "true",
            "local_timestamp": "1700000000",
            "contents": {"type": "state"},
        }}});
        let blocks = parse_blocks_info(&reply).unwrap();
        let info = blocks.values().next().unwrap();
        assert_eq!(info.subtype, Some(BlockSubtype::Send));
        assert!(info.confirmed);
        assert_eq!(info.local_timestamp, Some(1_700_000_000));
        assert_eq!(info.balance, 90);
    }

    #[test]
    fn test_parse_block_count() {
        let count = parse_block_count(&json!({"count": "1000", "unchecked": "10", "cemented": "990"}));
        assert_eq!(count, BlockCount { count: 1000, unchecked: 10, cemented: 990 });
    }

    #[test]
    fn test_node_error() {
        assert_eq!(node_error(&json!({"error": "Account not found"})), Some("Account not found"));
        assert_eq!(node_error(&json!({"count": "1"})), None);
    }
}
