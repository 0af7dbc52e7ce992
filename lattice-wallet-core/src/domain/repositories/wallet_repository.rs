//! Wallet repository for persisted wallet exports

use async_trait::async_trait;

use crate::domain::entities::WalletExport;
use crate::shared::error::WalletError;

/// Persistence for encrypted wallet exports
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Store or replace a wallet export
    async fn save(&self, export: &WalletExport) -> Result<(), WalletError>;

    /// Load a wallet export by id
    async fn load(&self, wallet_id: &str) -> Result<Option<WalletExport>, WalletError>;

    /// Ids of every stored wallet
    async fn list(&self) -> Result<Vec<String>, WalletError>;

    /// Delete a stored wallet. Deleting a missing wallet is not an error.
    async fn delete(&self, wallet_id: &str) -> Result<(), WalletError>;
}
