//! Wallet management functionality for the wallet core
//!
//! This module handles wallet creation and import, account derivation,
//! password lock/unlock and persistence of the encrypted export form.

use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use crate::core::crypto::encryption::{EncryptedData, EncryptionManager};
use crate::core::crypto::keys::{decode_address, SecurePrivateKey, SecureSeed};
use crate::core::crypto::signer::{BlockSigner, SoftwareSigner};
use crate::domain::entities::{Account, Wallet, WalletExport};
use crate::domain::repositories::WalletRepository;
use crate::shared::error::WalletError;
use crate::shared::types::{WalletId, WalletKind};
use crate::shared::utils::{generate_id, validate_password};
use crate::shared::WalletResult;

struct StoredWallet {
    wallet: Wallet,
    secret: EncryptedData,
}

/// A freshly generated seed wallet and the phrase to back it up with
pub struct CreatedWallet {
    pub wallet: Wallet,
    pub mnemonic: Zeroizing<String>,
}

/// Wallet manager for handling multiple wallets
pub struct WalletManager {
    repository: Arc<dyn WalletRepository>,
    encryption: EncryptionManager,
    wallets: RwLock<HashMap<WalletId, StoredWallet>>,
}

impl WalletManager {
    pub fn new(repository: Arc<dyn WalletRepository>) -> Self {
        Self::with_encryption(repository, EncryptionManager::new_default())
    }

    pub fn with_encryption(repository: Arc<dyn WalletRepository>, encryption: EncryptionManager) -> Self {
        Self {
            repository,
            encryption,
            wallets: RwLock::new(HashMap::new()),
        }
    }

    /// Load every persisted wallet. Returns them locked.
    pub async fn load_all(&self) -> WalletResult<Vec<Wallet>> {
        let mut loaded = Vec::new();
        for id in self.repository.list().await? {
            if let Some(export) = self.repository.load(&id).await? {
                let wallet = Self::wallet_from_export(&export)?;
                self.wallets.write().await.insert(
                    wallet.id.clone(),
                    StoredWallet { wallet: wallet.clone(), secret: export.secret },
                );
                loaded.push(wallet);
            }
        }
        info!("Loaded {} wallets", loaded.len());
        Ok(loaded)
    }

    pub async fn get_wallet(&self, wallet_id: &str) -> WalletResult<Wallet> {
        self.wallets
            .read()
            .await
            .get(wallet_id)
            .map(|stored| stored.wallet.clone())
            .ok_or_else(|| WalletError::wallet_not_found(wallet_id))
    }

    pub async fn list_wallets(&self) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self.wallets.read().await.values().map(|s| s.wallet.clone()).collect();
        wallets.sort_by(|a, b| a.id.cmp(&b.id));
        wallets
    }

    async fn store(&self, wallet: Wallet, secret: EncryptedData) -> WalletResult<Wallet> {
        let export = wallet.to_export(secret.clone());
        let mut wallets = self.wallets.write().await;
        if wallets.contains_key(&wallet.id) {
            return Err(WalletError::wallet_already_exists(wallet.id));
        }
        self.repository.save(&export).await?;
        wallets.insert(wallet.id.clone(), StoredWallet { wallet: wallet.clone(), secret });
        Ok(wallet)
    }

    async fn persist(&self, wallet_id: &str) -> WalletResult<()> {
        let export = {
            let wallets = self.wallets.read().await;
            let stored = wallets
                .get(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            stored.wallet.to_export(stored.secret.clone())
        };
        self.repository.save(&export).await
    }

    /// New seed wallet with its first account derived
    pub async fn create_wallet(&self, password: &str) -> WalletResult<CreatedWallet> {
        validate_password(password)?;
        let seed = SecureSeed::generate();
        let mnemonic = Zeroizing::new(seed.to_mnemonic()?);
        let wallet = self.import_seed_bytes(&seed, password).await?;
        Ok(CreatedWallet { wallet, mnemonic })
    }

    pub async fn import_seed(&self, seed_hex: &str, password: &str) -> WalletResult<Wallet> {
        validate_password(password)?;
        let seed = SecureSeed::from_hex(seed_hex)?;
        self.import_seed_bytes(&seed, password).await
    }

    pub async fn import_mnemonic(&self, phrase: &str, password: &str) -> WalletResult<Wallet> {
        validate_password(password)?;
        let seed = SecureSeed::from_mnemonic(phrase)?;
        self.import_seed_bytes(&seed, password).await
    }

    async fn import_seed_bytes(&self, seed: &SecureSeed, password: &str) -> WalletResult<Wallet> {
        let secret = self.encryption.encrypt(seed.as_bytes(), password)?;
        let mut wallet = Wallet::new(generate_id(), WalletKind::Seed);
        wallet.add_account(Account::new(wallet.id.clone(), 0, seed.derive_key(0)?.public_key()))?;
        info!("Created seed wallet {}", wallet.id);
        self.store(wallet, secret).await
    }

    /// Single-key wallet; it holds exactly one account
    pub async fn import_private_key(&self, key_hex: &str, password: &str) -> WalletResult<Wallet> {
        validate_password(password)?;
        let bytes = Zeroizing::new(hex::decode(key_hex.trim())?);
        let key = SecurePrivateKey::from_bytes(&bytes)?;
        let secret = self.encryption.encrypt(&bytes, password)?;

        let mut wallet = Wallet::new(generate_id(), WalletKind::PrivateKey);
        wallet.add_account(Account::new(wallet.id.clone(), 0, key.public_key()))?;
        info!("Imported private key wallet {}", wallet.id);
        self.store(wallet, secret).await
    }

    /// Hardware wallet; accounts come from the device
    pub async fn register_hardware(&self, device: &dyn BlockSigner, accounts: u32) -> WalletResult<Wallet> {
        let mut wallet = Wallet::new(generate_id(), WalletKind::Ledger);
        for index in 0..accounts.max(1) {
            let public_key = device.public_key(index).await?;
            wallet.add_account(Account::new(wallet.id.clone(), index, public_key))?;
        }
        info!("Registered hardware wallet {} with {} accounts", wallet.id, wallet.accounts.len());
        self.store(wallet, EncryptedData::default()).await
    }

    /// Derive the next account of a wallet through its (unlocked) signer
    pub async fn derive_account(&self, wallet_id: &str, signer: &dyn BlockSigner) -> WalletResult<Account> {
        let index = self.get_wallet(wallet_id).await?.next_index();
        let public_key = signer.public_key(index).await?;
        let account = {
            let mut wallets = self.wallets.write().await;
            let stored = wallets
                .get_mut(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            let mut account = Account::new(wallet_id, index, public_key);
            account.locked = stored.wallet.locked;
            stored.wallet.add_account(account.clone())?;
            account
        };
        self.persist(wallet_id).await?;
        Ok(account)
    }

    pub async fn remove_account(&self, wallet_id: &str, address: &str) -> WalletResult<Account> {
        let account = {
            let mut wallets = self.wallets.write().await;
            let stored = wallets
                .get_mut(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            stored
                .wallet
                .remove_account(address)
                .ok_or_else(|| WalletError::account_not_found(address))?
        };
        self.persist(wallet_id).await?;
        Ok(account)
    }

    /// Decrypt the wallet secret and hand out a signer over it. The secret
    /// is checked against the wallet's first account.
    pub async fn unlock(&self, wallet_id: &str, password: &str) -> WalletResult<SoftwareSigner> {
        let (kind, secret, first_account) = {
            let wallets = self.wallets.read().await;
            let stored = wallets
                .get(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            (
                stored.wallet.kind,
                stored.secret.clone(),
                stored.wallet.accounts.first().map(|a| (a.index, a.public_key)),
            )
        };

        if kind == WalletKind::Ledger {
            return Err(WalletError::validation("Hardware wallets are unlocked on the device"));
        }
        let plaintext = self.encryption.decrypt(&secret, password)?;
        let signer = match kind {
            WalletKind::PrivateKey => SoftwareSigner::from_private_key(SecurePrivateKey::from_bytes(&plaintext)?),
            _ => SoftwareSigner::from_seed(SecureSeed::from_bytes(&plaintext)?),
        };

        if let Some((index, expected)) = first_account {
            if signer.public_key(index).await? != expected {
                return Err(WalletError::crypto("Decrypted secret does not match the wallet accounts"));
            }
        }

        self.set_locked(wallet_id, false).await?;
        info!("Wallet {} unlocked", wallet_id);
        Ok(signer)
    }

    /// Mark the wallet locked. Dropping the signer zeroizes the key material.
    pub async fn lock(&self, wallet_id: &str) -> WalletResult<()> {
        self.set_locked(wallet_id, true).await
    }

    async fn set_locked(&self, wallet_id: &str, locked: bool) -> WalletResult<()> {
        {
            let mut wallets = self.wallets.write().await;
            let stored = wallets
                .get_mut(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            if stored.wallet.kind == WalletKind::Ledger {
                return Ok(());
            }
            stored.wallet.set_locked(locked);
        }
        self.persist(wallet_id).await
    }

    pub async fn change_password(&self, wallet_id: &str, old: &str, new: &str) -> WalletResult<()> {
        validate_password(new)?;
        {
            let mut wallets = self.wallets.write().await;
            let stored = wallets
                .get_mut(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            if stored.secret.is_empty() {
                return Err(WalletError::validation("Wallet has no password-protected secret"));
            }
            let plaintext = self.encryption.decrypt(&stored.secret, old)?;
            stored.secret = self.encryption.encrypt(&plaintext, new)?;
        }
        self.persist(wallet_id).await
    }

    pub async fn export_wallet(&self, wallet_id: &str) -> WalletResult<WalletExport> {
        let wallets = self.wallets.read().await;
        let stored = wallets
            .get(wallet_id)
            .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
        Ok(stored.wallet.to_export(stored.secret.clone()))
    }

    /// Take over a wallet exported elsewhere; it stays locked until unlocked here
    pub async fn import_wallet(&self, export: WalletExport) -> WalletResult<Wallet> {
        let wallet = Self::wallet_from_export(&export)?;
        self.store(wallet, export.secret).await
    }

    pub async fn delete_wallet(&self, wallet_id: &str) -> WalletResult<Wallet> {
        let stored = self
            .wallets
            .write()
            .await
            .remove(wallet_id)
            .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
        self.repository.delete(wallet_id).await?;
        info!("Deleted wallet {}", wallet_id);
        Ok(stored.wallet)
    }

    fn wallet_from_export(export: &WalletExport) -> WalletResult<Wallet> {
        export.validate()?;
        let mut wallet = Wallet::new(export.id.clone(), export.kind);
        for exported in &export.accounts {
            let public_key = decode_address(&exported.id)?;
            wallet.add_account(Account::new(export.id.clone(), exported.index, public_key))?;
        }
        if let Some(selected) = &export.selected_account_address {
            if wallet.owns(selected) {
                wallet.selected_account = Some(selected.clone());
            }
        }
        // Secrets are never kept decrypted across a restart
        wallet.set_locked(export.kind != WalletKind::Ledger);
        Ok(wallet)
    }
}
