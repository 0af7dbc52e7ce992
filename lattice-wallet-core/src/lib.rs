//! Lattice Wallet Core
//!
//! Wallet synchronization and transaction-lifecycle engine for block-lattice
//! ledgers. Keeps a local view of wallet accounts consistent with a remote
//! node, builds, signs and submits state blocks, and claims incoming
//! transfers automatically.
//!
//! ## Architecture
//!
//! - **Core**: gateway, proof-of-work cache, realtime feed, block builder,
//!   receivable queue, ledger state, wallet management, crypto
//! - **Domain**: Entities and the wallet repository seam
//! - **Infrastructure**: Configuration, logging, file storage
//! - **Shared**: Common types, constants, errors and utilities
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), lattice_wallet_core::WalletError> {
//! let core = lattice_wallet_core::init_wallet_core().await?;
//! let created = core.create_wallet("a strong password").await?;
//! core.unlock_wallet(&created.wallet.id, "a strong password").await?;
//! core.refresh().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

pub mod core;
pub mod domain;
pub mod shared;
pub mod infrastructure;

use crate::core::blocks::{BlockBuilder, SubmittedBlock};
use crate::core::crypto::signer::BlockSigner;
use crate::core::feed::{FeedTransport, RealtimeFeed, WebSocketTransport};
use crate::core::gateway::{BackendGateway, HttpTransport, NodeTransport};
use crate::core::ledger::{AccountLedgerState, LedgerSnapshot, ReloadOutcome};
use crate::core::receivable::QueueRun;
use crate::core::work::{RemoteWorkSource, WorkCache};
use crate::domain::repositories::WalletRepository;
use crate::infrastructure::{init_logging, CoreConfig, FileStorage};
use crate::shared::types::{BlockHash, Raw, ReceivePolicy};

pub use crate::core::wallet::{CreatedWallet, WalletManager};
pub use crate::domain::entities::{Account, ReceivableBlock, StateBlock, Wallet, WalletExport};
pub use crate::shared::error::{WalletError, WalletResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Load configuration, set up logging and storage, and start the engine
/// against the configured HTTP node(s) and WebSocket feed. An empty
/// `feed_url` leaves the feed off.
pub async fn init_wallet_core() -> WalletResult<WalletCore> {
    let config = CoreConfig::load()?;
    init_logging(&config.log_level);

    let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
    let feed: Option<Arc<dyn FeedTransport>> = if config.feed_url.is_empty() {
        None
    } else {
        Some(Arc::new(WebSocketTransport::new(config.request_timeout())))
    };
    let storage = Arc::new(FileStorage::new(config.data_dir.clone()).await?);
    let core = WalletCore::new(config, transport, feed, storage)?;
    core.start().await?;
    Ok(core)
}

/// Main wallet core struct that wires the engine components together
pub struct WalletCore {
    config: CoreConfig,
    gateway: Arc<BackendGateway>,
    work: Arc<WorkCache>,
    feed: Option<Arc<RealtimeFeed>>,
    ledger: Arc<AccountLedgerState>,
    wallets: WalletManager,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WalletCore {
    pub fn new(
        config: CoreConfig,
        transport: Arc<dyn NodeTransport>,
        feed_transport: Option<Arc<dyn FeedTransport>>,
        repository: Arc<dyn WalletRepository>,
    ) -> WalletResult<Self> {
        config.validate()?;
        let gateway = Arc::new(BackendGateway::new(transport, config.gateway_settings()?)?);
        let remote: Arc<dyn RemoteWorkSource> = gateway.clone();
        let work = Arc::new(WorkCache::new(config.work_settings()?, Some(remote)));
        let feed = feed_transport.map(|t| Arc::new(RealtimeFeed::new(config.feed_settings(), t)));
        let builder = BlockBuilder::new(gateway.clone(), work.clone(), config.builder_settings()?)?;
        let ledger = Arc::new(AccountLedgerState::new(
            gateway.clone(),
            work.clone(),
            builder,
            feed.clone(),
            config.ledger_settings()?,
        ));

        Ok(Self {
            config,
            gateway,
            work,
            feed,
            ledger,
            wallets: WalletManager::new(repository),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Hold every persisted wallet (locked), start the feed and reconcile once
    pub async fn start(&self) -> WalletResult<ReloadOutcome> {
        for wallet in self.wallets.load_all().await? {
            self.ledger.add_wallet(wallet, None)?;
        }

        {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(feed) = &self.feed {
                tasks.extend(feed.start());
            }
            tasks.extend(self.ledger.spawn_feed_listener());
        }

        log::info!("{} {} started", NAME, VERSION);
        Ok(self.ledger.reload_balances().await)
    }

    pub async fn shutdown(&self) {
        if let Some(feed) = &self.feed {
            feed.stop();
        }
        let tasks: Vec<_> = self.tasks.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect();
        for task in tasks {
            task.abort();
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<BackendGateway> {
        &self.gateway
    }

    pub fn work(&self) -> &Arc<WorkCache> {
        &self.work
    }

    pub fn ledger(&self) -> &Arc<AccountLedgerState> {
        &self.ledger
    }

    pub fn wallets(&self) -> &WalletManager {
        &self.wallets
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub async fn refresh(&self) -> ReloadOutcome {
        self.ledger.reload_balances().await
    }

    pub async fn create_wallet(&self, password: &str) -> WalletResult<CreatedWallet> {
        let created = self.wallets.create_wallet(password).await?;
        self.ledger.add_wallet(created.wallet.clone(), None)?;
        Ok(created)
    }

    pub async fn import_seed(&self, seed_hex: &str, password: &str) -> WalletResult<Wallet> {
        let wallet = self.wallets.import_seed(seed_hex, password).await?;
        self.hold(wallet)
    }

    pub async fn import_mnemonic(&self, phrase: &str, password: &str) -> WalletResult<Wallet> {
        let wallet = self.wallets.import_mnemonic(phrase, password).await?;
        self.hold(wallet)
    }

    pub async fn import_private_key(&self, key_hex: &str, password: &str) -> WalletResult<Wallet> {
        let wallet = self.wallets.import_private_key(key_hex, password).await?;
        self.hold(wallet)
    }

    pub async fn import_wallet(&self, export: WalletExport) -> WalletResult<Wallet> {
        let wallet = self.wallets.import_wallet(export).await?;
        self.hold(wallet)
    }

    fn hold(&self, wallet: Wallet) -> WalletResult<Wallet> {
        self.ledger.add_wallet(wallet.clone(), None)?;
        Ok(wallet)
    }

    /// Hardware wallets are usable straight away; the device does the signing
    pub async fn register_hardware(&self, device: Arc<dyn BlockSigner>, accounts: u32) -> WalletResult<Wallet> {
        let wallet = self.wallets.register_hardware(device.as_ref(), accounts).await?;
        self.ledger.add_wallet(wallet.clone(), Some(device))?;
        Ok(wallet)
    }

    pub async fn unlock_wallet(&self, wallet_id: &str, password: &str) -> WalletResult<QueueRun> {
        let signer = self.wallets.unlock(wallet_id, password).await?;
        self.ledger.unlock_wallet(wallet_id, Arc::new(signer)).await
    }

    pub async fn lock_wallet(&self, wallet_id: &str) -> WalletResult<()> {
        self.wallets.lock(wallet_id).await?;
        self.ledger.lock_wallet(wallet_id)
    }

    pub async fn remove_wallet(&self, wallet_id: &str) -> WalletResult<Wallet> {
        self.ledger.remove_wallet(wallet_id)?;
        self.wallets.delete_wallet(wallet_id).await
    }

    /// Derive the next account of an unlocked wallet and start tracking it
    pub async fn derive_account(&self, wallet_id: &str) -> WalletResult<Account> {
        let signer = self.ledger.signer(wallet_id)?;
        let account = self.wallets.derive_account(wallet_id, signer.as_ref()).await?;
        self.ledger.add_account(wallet_id, account.clone())?;
        self.ledger.reload_balances().await;
        Ok(account)
    }

    pub async fn remove_account(&self, wallet_id: &str, address: &str) -> WalletResult<Account> {
        self.ledger.remove_account(wallet_id, address)?;
        self.wallets.remove_account(wallet_id, address).await
    }

    pub fn set_active_wallet(&self, wallet_id: &str) -> WalletResult<()> {
        self.ledger.set_active_wallet(wallet_id)
    }

    pub async fn set_receive_policy(&self, policy: ReceivePolicy) -> QueueRun {
        self.ledger.set_receive_policy(policy).await
    }

    pub async fn send(&self, from: &str, destination: &str, amount: Raw) -> WalletResult<SubmittedBlock> {
        self.ledger.send(from, destination, amount).await
    }

    pub async fn change_representative(&self, address: &str, representative: &str) -> WalletResult<SubmittedBlock> {
        self.ledger.change_representative(address, representative).await
    }

    pub async fn receive_block(&self, hash: &BlockHash) -> WalletResult<SubmittedBlock> {
        self.ledger.receive_block(hash).await
    }

    pub async fn resume_receiving(&self) -> QueueRun {
        self.ledger.resume_receiving().await
    }

    pub async fn export_wallet(&self, wallet_id: &str) -> WalletResult<WalletExport> {
        self.wallets.export_wallet(wallet_id).await
    }

    pub async fn change_password(&self, wallet_id: &str, old: &str, new: &str) -> WalletResult<()> {
        self.wallets.change_password(wallet_id, old, new).await
    }
}

impl Drop for WalletCore {
    fn drop(&mut self) {
        if let Some(feed) = &self.feed {
            feed.stop();
        }
        for task in self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner).drain(..) {
            task.abort();
        }
    }
}
