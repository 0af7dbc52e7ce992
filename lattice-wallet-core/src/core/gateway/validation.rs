//! Structural validation of node responses
//!
//! A response that fails validation is treated exactly like a transport
//! failure. A node-level `{"error": ..}` reply is structurally valid; the
//! typed helpers interpret it.

use serde_json::Value;

use crate::shared::constants::{HASH_SIZE, WORK_HEX_LENGTH};
use crate::shared::utils::is_hex_of_len;

pub fn validate_response(action: &str, response: &Value) -> Result<(), String> {
    let object = response
        .as_object()
        .ok_or_else(|| format!("{} response is not a JSON object", action))?;

    if object.contains_key("error") {
        return Ok(());
    }

    match action {
        "work_generate" => require_hex(response, "work", WORK_HEX_LENGTH),
        "process" => require_hex(response, "hash", HASH_SIZE * 2),
        "accounts_balances" => require_object(response, "balances"),
        "blocks_info" => require_object(response, "blocks"),
        "accounts_frontiers" => require_object_or_empty(response, "frontiers"),
        "accounts_receivable" => require_object_or_empty(response, "blocks"),
        "account_info" => {
            require_hex(response, "frontier", HASH_SIZE * 2)?;
            require_present(response, "balance")
        }
        "block_count" => require_present(response, "count"),
        _ => Ok(()),
    }
}

fn require_present(response: &Value, field: &str) -> Result<(), String> {
    match response.get(field) {
        Some(Value::Null) | None => Err(format!("missing field '{}'", field)),
        Some(_) => Ok(()),
    }
}

fn require_hex(response: &Value, field: &str, len: usize) -> Result<(), String> {
    match response.get(field).and_then(Value::as_str) {
        Some(value) if is_hex_of_len(value, len) => Ok(()),
        Some(value) => Err(format!("field '{}' is not {} hex characters: {:?}", field, len, value)),
        None => Err(format!("missing field '{}'", field)),
    }
}

fn require_object(response: &Value, field: &str) -> Result<(), String> {
    match response.get(field) {
        Some(Value::Object(_)) => Ok(()),
        _ => Err(format!("field '{}' is not an object", field)),
    }
}

/// Batch queries answer with an empty string when nothing matched
fn require_object_or_empty(response: &Value, field: &str) -> Result<(), String> {
    match response.get(field) {
        Some(Value::Object(_)) => Ok(()),
        Some(Value::String(s)) if s.is_empty() => Ok(()),
        _ => Err(format!("field '{}' is not an object", field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_work_must_be_sixteen_hex_characters() {
        assert!(validate_response("work_generate", &json!({"work": "2bf29ef00786a6bc"})).is_ok());
        assert!(validate_response("work_generate", &json!({"work": "2bf29ef0"})).is_err());
        assert!(validate_response("work_generate", &json!({"work": "zzf29ef00786a6bc"})).is_err());
        assert!(validate_response("work_generate", &json!({})).is_err());
    }

    #[test]
    fn test_process_requires_hash() {
        let hash = "A".repeat(64);
        assert!(validate_response("process", &json!({ "hash": hash })).is_ok());
        assert!(validate_response("process", &json!({"hash": "ABC"})).is_err());
    }

    #[test]
    fn test_node_error_is_valid() {
        assert!(validate_response("process", &json!({"error": "Fork"})).is_ok());
        assert!(validate_response("account_info", &json!({"error": "Account not found"})).is_ok());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(validate_response("version", &json!("ok")).is_err());
        assert!(validate_response("version", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_batch_queries() {
        assert!(validate_response("accounts_balances", &json!({"balances": {}})).is_ok());
        assert!(validate_response("accounts_balances", &json!({"balance": "1"})).is_err());
        assert!(validate_response("accounts_receivable", &json!({"blocks": ""})).is_ok());
        assert!(validate_response("accounts_frontiers", &json!({"frontiers": {}})).is_ok());
        assert!(validate_response("blocks_info", &json!({"blocks": ""})).is_err());
    }
}
