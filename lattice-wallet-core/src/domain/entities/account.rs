//! Account entity
//!
//! An account is derived by exactly one wallet and carries the ledger view
//! the reconciliation cycle keeps current.

use serde::{Deserialize, Serialize};

use crate::core::crypto::keys::encode_address;
use crate::shared::types::{raw_string, Address, BlockHash, PublicKey, Raw, WalletId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: Address,
    pub index: u32,
    pub public_key: PublicKey,
    #[serde(with = "raw_string")]
    pub balance: Raw,
    /// Sum of pending incoming transfers at or above the receive minimum
    #[serde(with = "raw_string")]
    pub receivable: Raw,
    /// Hash of the latest block, `None` until the account is opened
    pub frontier: Option<BlockHash>,
    pub representative: Option<Address>,
    pub wallet_id: WalletId,
    /// Whether the owning wallet's private material is locked
    pub locked: bool,
}

impl Account {
    pub fn new(wallet_id: impl Into<WalletId>, index: u32, public_key: PublicKey) -> Self {
        Self {
            address: encode_address(&public_key),
            index,
            public_key,
            balance: 0,
            receivable: 0,
            frontier: None,
            representative: None,
            wallet_id: wallet_id.into(),
            locked: false,
        }
    }

    pub fn is_opened(&self) -> bool {
        self.frontier.is_some()
    }

    /// Root the next block's proof-of-work is computed against
    pub fn work_root(&self) -> BlockHash {
        self.frontier.unwrap_or_else(|| self.public_key.into())
    }
}
