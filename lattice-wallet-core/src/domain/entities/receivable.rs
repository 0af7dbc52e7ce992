//! Pending incoming transfer

use serde::{Deserialize, Serialize};

use crate::shared::types::{raw_string, Address, BlockHash, Raw};

/// An unclaimed transfer recorded on the sender's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivableBlock {
    /// Hash of the send block, used as the receive block's link
    pub hash: BlockHash,
    pub destination: Address,
    #[serde(with = "raw_string")]
    pub amount: Raw,
    pub source: Address,
    /// Seconds since the epoch the node first saw the send, when known
    pub timestamp: Option<u64>,
    /// Insertion order, assigned by the receivable queue
    #[serde(default)]
    pub sequence: u64,
}

impl ReceivableBlock {
    pub fn new(hash: BlockHash, destination: Address, amount: Raw, source: Address) -> Self {
        Self {
            hash,
            destination,
            amount,
            source,
            timestamp: None,
            sequence: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<u64>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
