//! Feed wire messages

use serde_json::{json, Value};

use crate::shared::constants::FEED_CONFIRMATION_TOPIC;
use crate::shared::types::{Address, BlockHash, BlockSubtype, Raw};
use crate::shared::utils::raw_from_json;

/// A confirmed block pushed by the node
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationMessage {
    /// Account whose chain the block extends
    pub account: Address,
    pub hash: BlockHash,
    pub amount: Raw,
    pub subtype: Option<BlockSubtype>,
    /// Destination of a send
    pub link_as_account: Option<Address>,
    /// Seconds since the epoch
    pub timestamp: Option<u64>,
    pub block: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected,
    Disconnected,
    Confirmation(ConfirmationMessage),
}

pub fn subscribe_command(accounts: &[Address]) -> Value {
    json!({
        "action": "subscribe",
        "topic": FEED_CONFIRMATION_TOPIC,
        "ack": true,
        "options": { "accounts": accounts },
    })
}

pub fn unsubscribe_command(accounts: &[Address]) -> Value {
    json!({
        "action": "unsubscribe",
        "topic": FEED_CONFIRMATION_TOPIC,
        "ack": true,
        "options": { "accounts": accounts },
    })
}

pub fn keepalive_command() -> Value {
    json!({ "action": "ping" })
}

/// Parse an inbound message. Anything other than a well-formed
/// confirmation (acks, pongs) yields `None`.
pub fn parse_confirmation(message: &Value) -> Option<ConfirmationMessage> {
    if message.get("topic").and_then(Value::as_str) != Some(FEED_CONFIRMATION_TOPIC) {
        return None;
    }
    let body = message.get("message")?;
    let block = body.get("block").cloned().unwrap_or(Value::Null);

    let timestamp = match message.get("time") {
        Some(Value::String(ms)) => ms.parse::<u64>().ok(),
        Some(Value::Number(ms)) => ms.as_u64(),
        _ => None,
    }
    .map(|ms| ms / 1000);

    Some(ConfirmationMessage {
        account: body.get("account")?.as_str()?.to_string(),
        hash: body.get("hash")?.as_str()?.parse().ok()?,
        amount: body.get("amount").and_then(raw_from_json).unwrap_or(0),
        subtype: block
            .get("subtype")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        link_as_account: block
            .get("link_as_account")
            .and_then(Value::as_str)
            .map(str::to_string),
        timestamp,
        block,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "991CF190094C00F0B68E2E5F75F6BEE95A2E0BD93CEAA4A6734DB9F19B728948";

    #[test]
    fn test_parse_confirmation() {
        let message = json!({
            "topic": "confirmation",
            "time": "1700000000123",
            "message": {
                "account": "nano_sender",
                "amount": "10",
                "hash": HASH,
                "block": {
                    "type": "state",
                    "subtype": "send",
                    "link_as_account": "nano_receiver",
                },
            },
        });
        let confirmation = parse_confirmation(&message).unwrap();
        assert_eq!(confirmation.account, "nano_sender");
        assert_eq!(confirmation.amount, 10);
        assert_eq!(confirmation.subtype, Some(BlockSubtype::Send));
        assert_eq!(confirmation.link_as_account.as_deref(), Some("nano_receiver"));
        assert_eq!(confirmation.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn test_ignores_other_topics() {
        assert!(parse_confirmation(&json!({"ack": "subscribe"})).is_none());
        assert!(parse_confirmation(&json!({"topic": "vote", "message": {}})).is_none());
    }

    #[test]
    fn test_subscribe_command_shape() {
        let command = subscribe_command(&["nano_a".to_string()]);
        assert_eq!(command["action"], "subscribe");
        assert_eq!(command["topic"], "confirmation");
        assert_eq!(command["options"]["accounts"][0], "nano_a");
    }
}
