use std::time::Duration;

use crate::domain::entities::{ReceivableBlock, Wallet};
use crate::shared::constants::{DEFAULT_MINIMUM_RECEIVE_RAW, RECEIVABLE_FETCH_COUNT, RECEIVE_BATCH_DELAY_MS};
use crate::shared::error::WalletError;
use crate::shared::types::{Address, BlockHash, BlockSubtype, NodeStatus, Raw, ReceivePolicy, WalletId};

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub receive_policy: ReceivePolicy,
    /// Transfers below this amount are neither tracked nor received
    pub minimum_receive: Raw,
    pub receivable_fetch_count: u32,
    pub receive_batch_delay: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            receive_policy: ReceivePolicy::default(),
            minimum_receive: DEFAULT_MINIMUM_RECEIVE_RAW,
            receivable_fetch_count: RECEIVABLE_FETCH_COUNT,
            receive_batch_delay: Duration::from_millis(RECEIVE_BATCH_DELAY_MS),
        }
    }
}

/// Notifications for consumers of the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    BalancesUpdated { balance: Raw, receivable: Raw },
    Receivable(ReceivableBlock),
    ReceivableDropped(BlockHash),
    BlockSubmitted { account: Address, hash: BlockHash, subtype: BlockSubtype },
    ReceiveFailed(WalletError),
    ReceivingSuspended,
    WalletLocked(WalletId),
    WalletUnlocked(WalletId),
    ActiveWalletChanged(Option<WalletId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Completed { new_receivables: usize },
    /// Another reload was in flight; no request was issued
    Coalesced,
    /// The node is unreachable; last known balances are kept
    Offline,
    /// Wallets or accounts changed while fetching; results were discarded
    Stale,
    Failed(WalletError),
}

/// What a feed event did to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Ignored,
    Duplicate,
    Receivable(ReceivableBlock),
    Reloaded(ReloadOutcome),
}

/// Read-only view of the aggregate state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub wallets: Vec<Wallet>,
    pub active_wallet: Option<WalletId>,
    pub balance: Raw,
    pub receivable: Raw,
    pub policy: ReceivePolicy,
    pub node_status: NodeStatus,
}

impl LedgerSnapshot {
    pub fn active(&self) -> Option<&Wallet> {
        let id = self.active_wallet.as_ref()?;
        self.wallets.iter().find(|wallet| &wallet.id == id)
    }
}
