//! State block entity
//!
//! Every operation (send, receive, open, change) is expressed as a state
//! block whose `link` field carries the operation-specific value.

use serde_json::{json, Value};

use crate::core::crypto::hashing::blake2b_256;
use crate::core::crypto::keys::{decode_address, encode_address, verify_signature};
use crate::shared::constants::{SIGNATURE_SIZE, STATE_BLOCK_PREAMBLE, WORK_HEX_LENGTH};
use crate::shared::error::WalletError;
use crate::shared::types::{BlockHash, PublicKey, Raw};
use crate::shared::utils::{is_hex_of_len, parse_raw};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBlock {
    pub account: PublicKey,
    pub previous: BlockHash,
    pub representative: PublicKey,
    pub balance: Raw,
    /// Destination key for sends, source hash for receives, zero for changes
    pub link: BlockHash,
    pub signature: Option<[u8; SIGNATURE_SIZE]>,
    pub work: Option<u64>,
}

impl StateBlock {
    /// Hash over the canonical encoding, excluding signature and work
    pub fn hash(&self) -> BlockHash {
        BlockHash(blake2b_256(&[
            &STATE_BLOCK_PREAMBLE[..],
            &self.account.as_bytes()[..],
            &self.previous.as_bytes()[..],
            &self.representative.as_bytes()[..],
            &self.balance.to_be_bytes()[..],
            &self.link.as_bytes()[..],
        ]))
    }

    /// The value proof-of-work is computed against
    pub fn work_root(&self) -> BlockHash {
        if self.previous.is_zero() {
            self.account.into()
        } else {
            self.previous
        }
    }

    pub fn is_open(&self) -> bool {
        self.previous.is_zero()
    }

    pub fn verify_signature(&self, key: &PublicKey) -> bool {
        match &self.signature {
            Some(signature) => verify_signature(key, &self.hash(), signature),
            None => false,
        }
    }

    /// Node JSON representation (`json_block: true`)
    pub fn to_json(&self) -> Value {
        json!({
            "type": "state",
            "account": encode_address(&self.account),
            "previous": self.previous.to_hex(),
            "representative": encode_address(&self.representative),
            "balance": self.balance.to_string(),
            "link": self.link.to_hex(),
            "link_as_account": encode_address(&PublicKey(self.link.0)),
            "signature": self.signature.map(hex::encode_upper).unwrap_or_default(),
            "work": self.work.map(|w| format!("{:016x}", w)).unwrap_or_default(),
        })
    }

    /// Parse a node JSON block. Rejects anything that is not a well-formed
    /// state block.
    pub fn from_json(value: &Value) -> Result<Self, WalletError> {
        let field = |name: &'static str| str_field(value, name);

        if field("type")? != "state" {
            return Err(WalletError::validation("Block is not a state block"));
        }

        let signature = match value.get("signature").and_then(Value::as_str) {
            Some(s) if !s.is_empty() => {
                let mut bytes = [0u8; SIGNATURE_SIZE];
                hex::decode_to_slice(s, &mut bytes)?;
                Some(bytes)
            }
            _ => None,
        };

        let work = match value.get("work").and_then(Value::as_str) {
            Some(w) if !w.is_empty() => {
                if !is_hex_of_len(w, WORK_HEX_LENGTH) {
                    return Err(WalletError::validation("Block work must be 16 hex characters"));
                }
                Some(
                    u64::from_str_radix(w, 16)
                        .map_err(|e| WalletError::validation(format!("Invalid work: {}", e)))?,
                )
            }
            _ => None,
        };

        Ok(Self {
            account: decode_address(field("account")?)?,
            previous: field("previous")?.parse()?,
            representative: decode_address(field("representative")?)?,
            balance: parse_raw(field("balance")?)?,
            link: field("link")?.parse()?,
            signature,
            work,
        })
    }
}

fn str_field<'a>(value: &'a Value, name: &str) -> Result<&'a str, WalletError> {
    value
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| WalletError::validation(format!("Block is missing '{}'", name)))
}
