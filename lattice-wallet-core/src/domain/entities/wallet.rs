//! Wallet entity and its persisted export form

use serde::{Deserialize, Serialize};

use crate::core::crypto::encryption::EncryptedData;
use crate::domain::entities::Account;
use crate::shared::error::WalletError;
use crate::shared::types::{Address, WalletId, WalletKind};

/// A held wallet: its kind, lock state and the ordered accounts it derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: WalletId,
    pub kind: WalletKind,
    pub locked: bool,
    pub accounts: Vec<Account>,
    pub selected_account: Option<Address>,
}

impl Wallet {
    pub fn new(id: impl Into<WalletId>, kind: WalletKind) -> Self {
        Self {
            id: id.into(),
            kind,
            locked: kind != WalletKind::Ledger,
            accounts: Vec::new(),
            selected_account: None,
        }
    }

    pub fn account(&self, address: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.address == address)
    }

    pub fn account_mut(&mut self, address: &str) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.address == address)
    }

    pub fn owns(&self, address: &str) -> bool {
        self.account(address).is_some()
    }

    /// Add an account, keeping the collection ordered by derivation index
    pub fn add_account(&mut self, mut account: Account) -> Result<(), WalletError> {
        if self.owns(&account.address) {
            return Err(WalletError::validation(format!(
                "Account {} already belongs to wallet {}",
                account.address, self.id
            )));
        }
        account.wallet_id = self.id.clone();
        account.locked = self.locked;
        let position = self
            .accounts
            .iter()
            .position(|a| a.index > account.index)
            .unwrap_or(self.accounts.len());
        if self.selected_account.is_none() {
            self.selected_account = Some(account.address.clone());
        }
        self.accounts.insert(position, account);
        Ok(())
    }

    pub fn remove_account(&mut self, address: &str) -> Option<Account> {
        let position = self.accounts.iter().position(|a| a.address == address)?;
        let removed = self.accounts.remove(position);
        if self.selected_account.as_deref() == Some(address) {
            self.selected_account = self.accounts.first().map(|a| a.address.clone());
        }
        Some(removed)
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        for account in &mut self.accounts {
            account.locked = locked;
        }
    }

    pub fn next_index(&self) -> u32 {
        self.accounts.iter().map(|a| a.index + 1).max().unwrap_or(0)
    }

    /// Persisted form. The secret is encrypted by the wallet manager.
    pub fn to_export(&self, secret: EncryptedData) -> WalletExport {
        WalletExport {
            id: self.id.clone(),
            kind: self.kind,
            secret,
            accounts: self
                .accounts
                .iter()
                .map(|a| ExportedAccount { id: a.address.clone(), index: a.index })
                .collect(),
            selected_account_address: self.selected_account.clone(),
            locked: self.locked,
        }
    }
}

/// Account reference inside a wallet export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedAccount {
    pub id: Address,
    pub index: u32,
}

/// `{id, type, iv, salt, encrypted, accounts, selectedAccountAddress, locked}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletExport {
    pub id: WalletId,
    #[serde(rename = "type")]
    pub kind: WalletKind,
    #[serde(flatten)]
    pub secret: EncryptedData,
    #[serde(default)]
    pub accounts: Vec<ExportedAccount>,
    #[serde(default)]
    pub selected_account_address: Option<Address>,
    #[serde(default)]
    pub locked: bool,
}

impl WalletExport {
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.id.is_empty() {
            return Err(WalletError::validation("Wallet export has no id"));
        }
        if self.kind != WalletKind::Ledger && self.secret.is_empty() {
            return Err(WalletError::validation("Wallet export is missing encrypted material"));
        }
        Ok(())
    }
}
